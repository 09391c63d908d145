//! Trace replay: drive a fresh detector engine over a recorded step file.
//!
//! A trace is a JSON document of timed steps - inbound signals, scripted
//! platform state, session control. The replayer fires pending debounce
//! deadlines between steps, prints every emitted event, and ends with a
//! summary.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;
use serde::Deserialize;

use focusgate_core::{
    AppMetadata, BlockingSurface, DetectorConfig, DetectorEngine, Event, MemorySessionStore,
    NullSurface, Platform, ScriptedPlatform, SeedCatalog, SurfaceChange, SurfaceChangeKind,
    SurfaceInfo,
};

#[derive(Subcommand)]
pub enum ReplayAction {
    /// Run a trace file through a fresh detector engine
    Run {
        /// Path to the JSON trace
        trace: PathBuf,
    },
    /// Print a sample trace
    Sample,
}

/// A recorded detector scenario.
#[derive(Debug, Deserialize)]
struct Trace {
    /// Identifier the engine treats as the host application.
    #[serde(default = "default_self_id")]
    self_id: String,
    /// Persisted session flag the engine starts from.
    #[serde(default)]
    enabled: bool,
    /// Timing overrides; absent fields use the defaults.
    #[serde(default)]
    config: Option<DetectorConfig>,
    /// Seed catalog override.
    #[serde(default)]
    catalog: Option<SeedCatalog>,
    steps: Vec<TraceStep>,
}

fn default_self_id() -> String {
    "app.focusgate".to_string()
}

#[derive(Debug, Deserialize)]
struct TraceStep {
    at_ms: u64,
    #[serde(flatten)]
    action: TraceAction,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TraceAction {
    /// An inbound surface-change notification.
    Signal {
        #[serde(default)]
        source: Option<String>,
        kind: SurfaceChangeKind,
    },
    /// Scripted answer to the active-root query from this point on.
    ActiveRoot {
        #[serde(default)]
        owner: Option<String>,
    },
    /// Scripted surface stack from this point on.
    Surfaces { surfaces: Vec<TraceSurface> },
    /// Add or update an installed application on the scripted platform.
    Install {
        id: String,
        #[serde(default)]
        system: bool,
    },
    /// Remove an installed application from the scripted platform.
    Uninstall { id: String },
    /// Install-change broadcast reaching the engine.
    InstallChange,
    SetEnabled { enabled: bool },
    SetAllowlist { apps: Vec<String> },
}

#[derive(Debug, Deserialize)]
struct TraceSurface {
    owner: String,
    layer: i32,
}

pub fn run(action: ReplayAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ReplayAction::Run { trace } => {
            let content = std::fs::read_to_string(&trace)?;
            let trace: Trace = serde_json::from_str(&content)?;
            run_trace(&trace)
        }
        ReplayAction::Sample => {
            println!("{}", serde_json::to_string_pretty(&sample_trace())?);
            Ok(())
        }
    }
}

fn run_trace(trace: &Trace) -> Result<(), Box<dyn std::error::Error>> {
    let platform = Arc::new(ScriptedPlatform::new());
    let surface = Arc::new(NullSurface);
    let store = MemorySessionStore::new(Some(trace.enabled));
    let mut engine = DetectorEngine::new(
        trace.self_id.clone(),
        trace.config.clone().unwrap_or_default(),
        trace.catalog.clone().unwrap_or_default(),
        Arc::clone(&platform) as Arc<dyn Platform>,
        surface as Arc<dyn BlockingSurface>,
        Box::new(store),
    );

    let mut emitted = 0usize;
    emit(engine.start(), &mut emitted)?;

    let mut last_at_ms = 0u64;
    for step in &trace.steps {
        if step.at_ms < last_at_ms {
            return Err(format!(
                "trace steps must be ordered by at_ms ({} after {})",
                step.at_ms, last_at_ms
            )
            .into());
        }
        last_at_ms = step.at_ms;

        // Deadlines due at or before this step fire first, at their own
        // scheduled instant.
        while let Some(deadline) = engine.next_deadline_ms() {
            if deadline > step.at_ms {
                break;
            }
            emit(engine.tick(deadline), &mut emitted)?;
        }

        emit(apply(&mut engine, &platform, step), &mut emitted)?;
    }

    // Drain whatever is still scheduled past the last step.
    if let Some(deadline) = engine.next_deadline_ms() {
        emit(engine.tick(deadline), &mut emitted)?;
    }

    let final_state = engine.state();
    emit(engine.stop(), &mut emitted)?;

    let summary = serde_json::json!({
        "steps": trace.steps.len(),
        "events": emitted,
        "resolutions": platform.active_root_queries(),
        "final_state": final_state,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn apply(
    engine: &mut DetectorEngine,
    platform: &ScriptedPlatform,
    step: &TraceStep,
) -> Option<Event> {
    match &step.action {
        TraceAction::Signal { source, kind } => {
            let change = match source {
                Some(app) => SurfaceChange::new(app.clone(), *kind),
                None => SurfaceChange::anonymous(*kind),
            };
            engine.handle_signal(&change, step.at_ms)
        }
        TraceAction::ActiveRoot { owner } => {
            platform.set_active_root(owner.as_deref());
            None
        }
        TraceAction::Surfaces { surfaces } => {
            platform.set_surfaces(
                surfaces
                    .iter()
                    .map(|s| SurfaceInfo::new(s.owner.clone(), s.layer))
                    .collect(),
            );
            None
        }
        TraceAction::Install { id, system } => {
            let metadata = if *system {
                AppMetadata::system()
            } else {
                AppMetadata::user()
            };
            platform.install(id.clone(), metadata);
            None
        }
        TraceAction::Uninstall { id } => {
            platform.uninstall(id);
            None
        }
        TraceAction::InstallChange => engine.handle_install_change(),
        TraceAction::SetEnabled { enabled } => engine.set_enabled(*enabled),
        TraceAction::SetAllowlist { apps } => {
            engine.set_allowlist(apps.iter().cloned().collect::<HashSet<_>>())
        }
    }
}

fn emit(event: Option<Event>, emitted: &mut usize) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(event) = event {
        println!("{}", serde_json::to_string_pretty(&event)?);
        *emitted += 1;
    }
    Ok(())
}

/// A short scenario: a foreign app gets blocked, the user returns home,
/// the overlay clears on the debounced pass.
fn sample_trace() -> serde_json::Value {
    serde_json::json!({
        "self_id": "app.focusgate",
        "enabled": true,
        "steps": [
            { "at_ms": 0, "type": "active_root", "owner": "com.social.feed" },
            { "at_ms": 10, "type": "signal", "source": "com.social.feed", "kind": "surface_changed" },
            { "at_ms": 300, "type": "signal", "source": "com.social.feed", "kind": "content_changed" },
            { "at_ms": 1500, "type": "active_root", "owner": "com.android.launcher3" },
            { "at_ms": 1510, "type": "signal", "source": "com.android.launcher3", "kind": "surface_changed" }
        ]
    })
}
