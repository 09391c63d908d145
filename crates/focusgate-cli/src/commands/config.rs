use clap::Subcommand;
use focusgate_core::DetectorConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective detector config as TOML
    Show,
    /// Write the default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = DetectorConfig::load_or_default();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Init { force } => {
            let path = DetectorConfig::default_path()?;
            if path.exists() && !force {
                eprintln!("config already exists at {} (--force overwrites)", path.display());
                std::process::exit(1);
            }
            DetectorConfig::default().save_to(&path)?;
            println!("wrote {}", path.display());
        }
        ConfigAction::Path => {
            println!("{}", DetectorConfig::default_path()?.display());
        }
    }
    Ok(())
}
