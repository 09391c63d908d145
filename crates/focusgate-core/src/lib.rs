//! # Focusgate Core Library
//!
//! Foreground-application intrusion detection for focus sessions. The
//! detector watches the host platform's noisy "what is on screen" signals,
//! resolves them to one best-guess foreground application, classifies it
//! (self / system / home / allowlisted / foreign), and drives an externally
//! owned blocking overlay. It never blocks the host itself, OS chrome, or
//! home surfaces, and never flickers the overlay on transient signal noise.
//!
//! ## Architecture
//!
//! - **Engine**: a wall-clock state machine; callers pass explicit `now`
//!   values and honor `next_deadline_ms()` by calling `tick()`
//! - **Service**: a tokio task that gives the engine the single-writer
//!   context the host talks to through a cloneable handle
//! - **Classification**: curated seed catalogs unioned with best-effort
//!   platform enumeration, republished atomically on install changes
//! - **Stability and debounce**: a dwell gate suppresses app-switch
//!   flicker; a coalescing deadline turns signal bursts into one decision
//!
//! ## Key Components
//!
//! - [`DetectorEngine`]: session state machine and lifecycle entry points
//! - [`DetectorService`] / [`DetectorHandle`]: marshaled async front door
//! - [`Classifier`]: application classification against seed + discovered sets
//! - [`Platform`], [`BlockingSurface`], [`SessionStore`]: host boundaries

pub mod engine;
pub mod service;
pub mod classify;
pub mod signals;
pub mod resolve;
pub mod stability;
pub mod decision;
pub mod platform;
pub mod store;
pub mod config;
pub mod events;
pub mod error;

/// Opaque, comparable, hashable identifier of a runnable application.
pub type AppId = String;

pub use engine::{now_ms, DetectorEngine, DetectorState};
pub use service::{DetectorHandle, DetectorService};
pub use classify::{ClassificationSets, Classifier, SeedCatalog};
pub use signals::{ForegroundSnapshot, SignalTracker, SurfaceChange, SurfaceChangeKind};
pub use resolve::resolve;
pub use stability::StabilityGate;
pub use decision::{decide, AllowCause, BlockCause, Decision, Session};
pub use platform::{
    AppMetadata, BlockingSurface, NullSurface, Platform, RecordingSurface, ScriptedPlatform,
    SurfaceInfo,
};
pub use store::{config_dir, MemorySessionStore, SessionStore, TomlSessionStore};
pub use config::DetectorConfig;
pub use events::Event;
pub use error::{DetectorError, Result, StoreError, SurfaceError};
