//! Platform boundary traits.
//!
//! Everything the detector needs from the host OS sits behind two small
//! traits: `Platform` (synchronous queries about surfaces and installed
//! applications) and `BlockingSurface` (the externally owned overlay).
//! Absence is data on this boundary - a query returning nothing means
//! "signal absent", never an error.
//!
//! `ScriptedPlatform` and `RecordingSurface` are controllable in-memory
//! implementations used by the test suites and by trace replay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::SurfaceError;
use crate::AppId;

/// Metadata the platform reports for one installed application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppMetadata {
    /// Shipped as part of the OS image.
    pub system: bool,
    /// OS component updated through the application store.
    pub updated_system: bool,
}

impl AppMetadata {
    pub fn user() -> Self {
        Self::default()
    }

    pub fn system() -> Self {
        Self {
            system: true,
            updated_system: false,
        }
    }
}

/// One known surface and its position in the stacking order.
/// Higher `layer` values sit closer to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub owner: AppId,
    pub layer: i32,
}

impl SurfaceInfo {
    pub fn new(owner: impl Into<AppId>, layer: i32) -> Self {
        Self {
            owner: owner.into(),
            layer,
        }
    }
}

/// Synchronous queries into the host platform.
///
/// Every method is total: transient platform unavailability surfaces as
/// `None` or an empty collection, which callers treat as "signal absent".
pub trait Platform: Send + Sync {
    /// Application owning the currently active top-level surface.
    fn active_surface_owner(&self) -> Option<AppId>;

    /// All currently known surfaces with their stacking order.
    fn surface_stack(&self) -> Vec<SurfaceInfo>;

    /// Identifiers of all installed applications, or `None` when the
    /// platform restricts enumeration.
    fn installed_apps(&self) -> Option<Vec<AppId>>;

    /// Metadata for one application, or `None` when the identifier cannot
    /// be resolved (for example, uninstalled mid-lookup).
    fn app_metadata(&self, id: &str) -> Option<AppMetadata>;

    /// Applications able to handle the platform's "go home" action.
    fn home_handlers(&self) -> Vec<AppId>;
}

/// The externally owned blocking overlay.
///
/// The engine guarantees it never calls `show` while logically visible or
/// `hide` while hidden, but implementations must tolerate both anyway.
pub trait BlockingSurface: Send + Sync {
    /// Present the overlay. A creation failure keeps the detector hidden.
    fn show(&self) -> Result<(), SurfaceError>;

    /// Remove the overlay.
    fn hide(&self);
}

/// Surface that presents nothing. For headless hosts and dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl BlockingSurface for NullSurface {
    fn show(&self) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn hide(&self) {}
}

// ── Test and replay doubles ──────────────────────────────────────────

#[derive(Default)]
struct ScriptedState {
    active_root: Option<AppId>,
    surfaces: Vec<SurfaceInfo>,
    installed: Vec<(AppId, AppMetadata)>,
    home_handlers: Vec<AppId>,
    enumeration_restricted: bool,
    active_root_queries: u64,
}

/// Scriptable in-memory platform.
///
/// Mutators take `&self` so a shared `Arc<ScriptedPlatform>` can be
/// reconfigured while the engine holds its own reference. The active-root
/// query counter exists because one resolution pass performs exactly one
/// such query, which makes coalescing observable from outside.
#[derive(Default)]
pub struct ScriptedPlatform {
    state: Mutex<ScriptedState>,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_active_root(&self, owner: Option<&str>) {
        self.state().active_root = owner.map(AppId::from);
    }

    pub fn set_surfaces(&self, surfaces: Vec<SurfaceInfo>) {
        self.state().surfaces = surfaces;
    }

    pub fn install(&self, id: impl Into<AppId>, metadata: AppMetadata) {
        let id = id.into();
        let mut state = self.state();
        state.installed.retain(|(existing, _)| *existing != id);
        state.installed.push((id, metadata));
    }

    pub fn uninstall(&self, id: &str) {
        self.state().installed.retain(|(existing, _)| existing != id);
    }

    pub fn set_home_handlers(&self, ids: Vec<AppId>) {
        self.state().home_handlers = ids;
    }

    pub fn restrict_enumeration(&self, restricted: bool) {
        self.state().enumeration_restricted = restricted;
    }

    /// How many times `active_surface_owner` has been queried.
    pub fn active_root_queries(&self) -> u64 {
        self.state().active_root_queries
    }
}

impl Platform for ScriptedPlatform {
    fn active_surface_owner(&self) -> Option<AppId> {
        let mut state = self.state();
        state.active_root_queries += 1;
        state.active_root.clone()
    }

    fn surface_stack(&self) -> Vec<SurfaceInfo> {
        self.state().surfaces.clone()
    }

    fn installed_apps(&self) -> Option<Vec<AppId>> {
        let state = self.state();
        if state.enumeration_restricted {
            return None;
        }
        Some(state.installed.iter().map(|(id, _)| id.clone()).collect())
    }

    fn app_metadata(&self, id: &str) -> Option<AppMetadata> {
        self.state()
            .installed
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, metadata)| *metadata)
    }

    fn home_handlers(&self) -> Vec<AppId> {
        self.state().home_handlers.clone()
    }
}

/// Overlay call recorded by `RecordingSurface`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceCall {
    Show,
    Hide,
}

/// Blocking surface that records calls instead of presenting anything.
#[derive(Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
    fail_shows: AtomicBool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `show` calls fail with a creation error.
    pub fn fail_shows(&self, fail: bool) {
        self.fail_shows.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn shows(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == SurfaceCall::Show)
            .count()
    }

    pub fn hides(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == SurfaceCall::Hide)
            .count()
    }

    fn record(&self, call: SurfaceCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl BlockingSurface for RecordingSurface {
    fn show(&self) -> Result<(), SurfaceError> {
        if self.fail_shows.load(Ordering::SeqCst) {
            return Err(SurfaceError::CreationFailed(
                "scripted presentation failure".into(),
            ));
        }
        self.record(SurfaceCall::Show);
        Ok(())
    }

    fn hide(&self) {
        self.record(SurfaceCall::Hide);
    }
}
