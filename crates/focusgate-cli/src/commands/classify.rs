use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use focusgate_core::platform::ScriptedPlatform;
use focusgate_core::{Classifier, SeedCatalog};

#[derive(Subcommand)]
pub enum ClassifyAction {
    /// Print the classification verdicts for an identifier
    Check {
        /// Application identifier to classify
        id: String,
        /// TOML seed catalog replacing the built-in one
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Identifier the classifier treats as the host itself
        #[arg(long, default_value = "app.focusgate")]
        self_id: String,
    },
    /// Print the seed catalog as TOML
    Seeds {
        /// TOML seed catalog replacing the built-in one
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

fn load_catalog(path: Option<&Path>) -> Result<SeedCatalog, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        }
        None => Ok(SeedCatalog::default()),
    }
}

pub fn run(action: ClassifyAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ClassifyAction::Check { id, catalog, self_id } => {
            let catalog = load_catalog(catalog.as_deref())?;
            // Seed-only classification: no live platform behind the CLI.
            let classifier = Classifier::new(self_id, catalog, Arc::new(ScriptedPlatform::new()));
            let verdict = serde_json::json!({
                "id": id,
                "self_or_system": classifier.is_self_or_system(&id),
                "home_surface": classifier.is_home_surface(&id),
            });
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
        ClassifyAction::Seeds { catalog } => {
            let catalog = load_catalog(catalog.as_deref())?;
            print!("{}", toml::to_string_pretty(&catalog)?);
        }
    }
    Ok(())
}
