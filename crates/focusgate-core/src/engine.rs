//! Detector engine.
//!
//! The engine is a wall-clock state machine combining the signal tracker,
//! resolver, classifier, and stability gate into the session state machine
//! that drives the blocking overlay. It does not use internal threads or
//! timers - every entry point takes `now` in epoch milliseconds, and the
//! pending debounced resolution is a stored deadline the driver reads via
//! `next_deadline_ms()` and honors by calling `tick()`.
//!
//! ## State transitions
//!
//! ```text
//! Disabled -> Enabled(hidden) <-> Enabled(visible)
//!     ^              |                   |
//!     +------ disable (always hides) ---+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = DetectorEngine::new(self_id, config, catalog, platform, surface, store);
//! engine.start();
//! // On each platform notification:
//! engine.handle_signal(&change, now_ms());
//! // Whenever next_deadline_ms() elapses:
//! engine.tick(now_ms());
//! ```
//!
//! Two call paths reach the same decision function: a fast path that
//! resolves synchronously while the overlay is hidden (showing late is the
//! only user-visible cost of delay), and the debounced path that coalesces
//! signal bursts while it is visible (hiding late is harmless).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::classify::{Classifier, SeedCatalog};
use crate::config::DetectorConfig;
use crate::decision::{decide, AllowCause, BlockCause, Decision, Session};
use crate::events::Event;
use crate::platform::{BlockingSurface, Platform};
use crate::resolve::resolve;
use crate::signals::{SignalTracker, SurfaceChange};
use crate::stability::StabilityGate;
use crate::store::SessionStore;
use crate::AppId;

/// Externally visible state of the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorState {
    Disabled,
    EnabledHidden,
    EnabledVisible,
}

/// Core detector engine.
///
/// Operates on explicit wall-clock values - no internal thread. The caller
/// is responsible for honoring `next_deadline_ms()` with a `tick()`.
pub struct DetectorEngine {
    config: DetectorConfig,
    session: Session,
    classifier: Classifier,
    signals: SignalTracker,
    gate: StabilityGate,
    overlay_visible: bool,
    /// Deadline of the pending debounced resolution, if one is scheduled.
    pending_resolve_at_ms: Option<u64>,
    platform: Arc<dyn Platform>,
    surface: Arc<dyn BlockingSurface>,
    store: Box<dyn SessionStore>,
}

impl DetectorEngine {
    /// Create a new engine. Starts in the `Disabled` state; `start` loads
    /// the persisted flag and builds the first classification epoch.
    pub fn new(
        self_id: impl Into<AppId>,
        config: DetectorConfig,
        catalog: SeedCatalog,
        platform: Arc<dyn Platform>,
        surface: Arc<dyn BlockingSurface>,
        store: Box<dyn SessionStore>,
    ) -> Self {
        let self_id = self_id.into();
        let gate = StabilityGate::new(config.stability_window_ms);
        let classifier = Classifier::new(self_id.clone(), catalog, Arc::clone(&platform));
        Self {
            config,
            session: Session::new(self_id),
            classifier,
            signals: SignalTracker::new(),
            gate,
            overlay_visible: false,
            pending_resolve_at_ms: None,
            platform,
            surface,
            store,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> DetectorState {
        match (self.session.enabled(), self.overlay_visible) {
            (false, _) => DetectorState::Disabled,
            (true, false) => DetectorState::EnabledHidden,
            (true, true) => DetectorState::EnabledVisible,
        }
    }

    pub fn enabled(&self) -> bool {
        self.session.enabled()
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn allowlist(&self) -> &HashSet<AppId> {
        self.session.allowlist()
    }

    /// Deadline of the pending debounced resolution, for the driver.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.pending_resolve_at_ms
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Load the persisted enabled flag and build the first classification
    /// epoch. Does not resolve; the first signal drives that.
    pub fn start(&mut self) -> Option<Event> {
        let enabled = match self.store.load_enabled() {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load session flag, starting disabled");
                false
            }
        };
        self.session.set_enabled(enabled);
        self.classifier.rebuild();
        tracing::info!(enabled, "detector started");
        Some(Event::Started {
            enabled,
            at: Utc::now(),
        })
    }

    /// Inbound surface-change notification.
    ///
    /// While the overlay is hidden the decision runs synchronously; while
    /// it is visible the signal coalesces into the pending deadline, which
    /// is never extended by later arrivals.
    pub fn handle_signal(&mut self, change: &SurfaceChange, now_ms: u64) -> Option<Event> {
        self.signals.record(change, now_ms);
        if !self.session.enabled() {
            return None;
        }
        if !self.overlay_visible {
            tracing::debug!(kind = ?change.kind, "resolving on the fast path");
            return self.run_resolution(now_ms);
        }
        if self.pending_resolve_at_ms.is_none() {
            self.pending_resolve_at_ms = Some(now_ms + self.config.debounce_window_ms);
        }
        None
    }

    /// Install/uninstall/update notification: rebuild classification sets.
    pub fn handle_install_change(&mut self) -> Option<Event> {
        let (system_apps, home_apps) = self.classifier.rebuild();
        tracing::info!(system_apps, home_apps, "classification sets rebuilt");
        Some(Event::ClassifierRebuilt {
            system_apps,
            home_apps,
            at: Utc::now(),
        })
    }

    /// Enable or disable blocking. The flag is persisted on every call.
    ///
    /// Disable is absolute: it synchronously cancels any pending resolution
    /// and forces the overlay down, regardless of stability state.
    pub fn set_enabled(&mut self, enabled: bool) -> Option<Event> {
        if let Err(e) = self.store.store_enabled(enabled) {
            tracing::warn!(error = %e, "failed to persist session flag");
        }
        if enabled == self.session.enabled() {
            return None;
        }
        self.session.set_enabled(enabled);
        if enabled {
            tracing::info!("session enabled");
            Some(Event::SessionEnabled { at: Utc::now() })
        } else {
            self.pending_resolve_at_ms = None;
            self.gate.reset();
            let overlay_was_visible = self.overlay_visible;
            self.force_hide();
            tracing::info!(overlay_was_visible, "session disabled");
            Some(Event::SessionDisabled {
                overlay_was_visible,
                at: Utc::now(),
            })
        }
    }

    /// Replace the allowlist wholesale. The host's own identifier is always
    /// included regardless of the incoming set. Takes effect on the next
    /// resolution cycle.
    pub fn set_allowlist(&mut self, apps: HashSet<AppId>) -> Option<Event> {
        self.session.set_allowlist(apps);
        let size = self.session.allowlist().len();
        tracing::info!(size, "allowlist replaced");
        Some(Event::AllowlistReplaced {
            size,
            at: Utc::now(),
        })
    }

    /// Run the debounced resolution once its deadline has passed.
    pub fn tick(&mut self, now_ms: u64) -> Option<Event> {
        match self.pending_resolve_at_ms {
            Some(deadline) if now_ms >= deadline => {
                self.pending_resolve_at_ms = None;
                self.run_resolution(now_ms)
            }
            _ => None,
        }
    }

    /// Host lifecycle stop: cancel pending work and drop the overlay.
    pub fn stop(&mut self) -> Option<Event> {
        self.pending_resolve_at_ms = None;
        self.gate.reset();
        let overlay_was_visible = self.overlay_visible;
        self.force_hide();
        tracing::info!(overlay_was_visible, "detector stopped");
        Some(Event::Stopped {
            overlay_was_visible,
            at: Utc::now(),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn run_resolution(&mut self, now_ms: u64) -> Option<Event> {
        let snapshot = self.signals.snapshot(self.platform.as_ref(), now_ms);
        let pick = resolve(&snapshot, &self.classifier, self.config.signal_freshness_ms);
        let decision = decide(
            pick.as_ref(),
            &snapshot,
            &self.session,
            &self.classifier,
            &mut self.gate,
            self.config.unknown_grace_ms,
            now_ms,
        );
        tracing::debug!(?pick, ?decision, "resolution cycle");
        match decision {
            Decision::Block(cause) => self.show_overlay(cause),
            Decision::Allow(cause) => self.clear_overlay(cause),
        }
    }

    fn show_overlay(&mut self, cause: BlockCause) -> Option<Event> {
        if self.overlay_visible {
            return None; // Self-transition.
        }
        if let Err(e) = self.surface.show() {
            // Stay logically hidden; the next cycle retries naturally.
            tracing::warn!(error = %e, "blocking surface failed to present");
            return None;
        }
        self.overlay_visible = true;
        tracing::info!(?cause, "overlay shown");
        Some(Event::OverlayShown {
            cause,
            at: Utc::now(),
        })
    }

    fn clear_overlay(&mut self, cause: AllowCause) -> Option<Event> {
        if !self.overlay_visible {
            return None; // Self-transition.
        }
        self.surface.hide();
        self.overlay_visible = false;
        tracing::info!(?cause, "overlay hidden");
        Some(Event::OverlayHidden {
            cause,
            at: Utc::now(),
        })
    }

    fn force_hide(&mut self) {
        if self.overlay_visible {
            self.surface.hide();
            self.overlay_visible = false;
        }
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{RecordingSurface, ScriptedPlatform};
    use crate::signals::SurfaceChangeKind;
    use crate::store::MemorySessionStore;

    const SELF_ID: &str = "com.example.focus";

    fn signal(source: &str) -> SurfaceChange {
        SurfaceChange::new(source, SurfaceChangeKind::SurfaceChanged)
    }

    fn setup_engine(
        enabled: bool,
    ) -> (
        DetectorEngine,
        Arc<ScriptedPlatform>,
        Arc<RecordingSurface>,
        MemorySessionStore,
    ) {
        let platform = Arc::new(ScriptedPlatform::new());
        let surface = Arc::new(RecordingSurface::new());
        let store = MemorySessionStore::new(Some(enabled));
        let mut engine = DetectorEngine::new(
            SELF_ID,
            DetectorConfig::default(),
            SeedCatalog::default(),
            Arc::clone(&platform) as Arc<dyn Platform>,
            Arc::clone(&surface) as Arc<dyn BlockingSurface>,
            Box::new(store.clone()),
        );
        engine.start();
        (engine, platform, surface, store)
    }

    fn show_foreign(engine: &mut DetectorEngine, platform: &ScriptedPlatform, from_ms: u64) -> u64 {
        platform.set_active_root(Some("com.example.game"));
        engine.handle_signal(&signal("com.example.game"), from_ms);
        let admit_at = from_ms + engine.config().stability_window_ms;
        engine.handle_signal(&signal("com.example.game"), admit_at);
        admit_at
    }

    #[test]
    fn test_start_loads_persisted_flag() {
        let (engine, _, _, _) = setup_engine(true);
        assert!(engine.enabled());
        assert_eq!(engine.state(), DetectorState::EnabledHidden);

        let (engine, _, _, _) = setup_engine(false);
        assert!(!engine.enabled());
        assert_eq!(engine.state(), DetectorState::Disabled);
    }

    #[test]
    fn test_fast_path_primes_then_shows() {
        let (mut engine, platform, surface, _) = setup_engine(true);
        platform.set_active_root(Some("com.example.game"));

        // First sighting primes, never shows.
        let event = engine.handle_signal(&signal("com.example.game"), 1_000);
        assert!(event.is_none());
        assert_eq!(engine.state(), DetectorState::EnabledHidden);

        // Same pick past the stability window shows.
        let event = engine.handle_signal(&signal("com.example.game"), 1_300);
        assert!(matches!(event, Some(Event::OverlayShown { .. })));
        assert_eq!(engine.state(), DetectorState::EnabledVisible);
        assert_eq!(surface.shows(), 1);
    }

    #[test]
    fn test_visible_path_coalesces_signals() {
        let (mut engine, platform, _, _) = setup_engine(true);
        let shown_at = show_foreign(&mut engine, &platform, 1_000);
        let resolutions_before = platform.active_root_queries();

        // Three signals in one window produce a single unchanged deadline.
        engine.handle_signal(&signal("com.example.game"), shown_at + 10);
        let deadline = engine.next_deadline_ms();
        assert_eq!(deadline, Some(shown_at + 10 + 250));
        engine.handle_signal(&signal("com.example.game"), shown_at + 60);
        engine.handle_signal(&signal("com.example.game"), shown_at + 120);
        assert_eq!(engine.next_deadline_ms(), deadline);

        // No resolution ran while coalescing.
        assert_eq!(platform.active_root_queries(), resolutions_before);

        // Early tick is a no-op; the due tick resolves exactly once.
        engine.tick(shown_at + 200);
        assert_eq!(platform.active_root_queries(), resolutions_before);
        engine.tick(shown_at + 10 + 250);
        assert_eq!(platform.active_root_queries(), resolutions_before + 1);
        assert_eq!(engine.next_deadline_ms(), None);
    }

    #[test]
    fn test_debounced_hide_when_returning_home() {
        let (mut engine, platform, surface, _) = setup_engine(true);
        let shown_at = show_foreign(&mut engine, &platform, 1_000);
        assert_eq!(engine.state(), DetectorState::EnabledVisible);

        // User goes home; the hide rides the debounced path.
        platform.set_active_root(Some("com.android.launcher3"));
        let event = engine.handle_signal(&signal("com.android.launcher3"), shown_at + 50);
        assert!(event.is_none());
        assert_eq!(engine.state(), DetectorState::EnabledVisible);

        let event = engine.tick(shown_at + 50 + 250);
        assert!(matches!(
            event,
            Some(Event::OverlayHidden {
                cause: AllowCause::HomeContext,
                ..
            })
        ));
        assert_eq!(engine.state(), DetectorState::EnabledHidden);
        assert_eq!(surface.hides(), 1);
    }

    #[test]
    fn test_disable_cancels_pending_and_hides() {
        let (mut engine, platform, surface, _) = setup_engine(true);
        let shown_at = show_foreign(&mut engine, &platform, 1_000);
        engine.handle_signal(&signal("com.example.game"), shown_at + 10);
        assert!(engine.next_deadline_ms().is_some());

        let event = engine.set_enabled(false);
        assert!(matches!(
            event,
            Some(Event::SessionDisabled {
                overlay_was_visible: true,
                ..
            })
        ));
        assert_eq!(engine.state(), DetectorState::Disabled);
        assert_eq!(engine.next_deadline_ms(), None);
        assert_eq!(surface.hides(), 1);

        // The canceled resolution never fires.
        assert!(engine.tick(shown_at + 10_000).is_none());
    }

    #[test]
    fn test_enable_does_not_resolve_immediately() {
        let (mut engine, platform, _, _) = setup_engine(false);
        platform.set_active_root(Some("com.example.game"));
        let event = engine.set_enabled(true);
        assert!(matches!(event, Some(Event::SessionEnabled { .. })));
        assert_eq!(platform.active_root_queries(), 0);
        assert_eq!(engine.next_deadline_ms(), None);
    }

    #[test]
    fn test_set_enabled_persists_on_every_call() {
        let (mut engine, _, _, store) = setup_engine(false);
        assert!(engine.set_enabled(false).is_none());
        // No transition, but the flag was still written.
        assert_eq!(store.stored(), Some(false));
        engine.set_enabled(true);
        assert_eq!(store.stored(), Some(true));
    }

    #[test]
    fn test_signals_while_disabled_only_update_tracker() {
        let (mut engine, platform, _, _) = setup_engine(false);
        platform.set_active_root(Some("com.example.game"));
        assert!(engine.handle_signal(&signal("com.example.game"), 1_000).is_none());
        assert_eq!(platform.active_root_queries(), 0);
        assert_eq!(engine.next_deadline_ms(), None);
    }

    #[test]
    fn test_presentation_failure_keeps_hidden_state() {
        let (mut engine, platform, surface, _) = setup_engine(true);
        surface.fail_shows(true);
        platform.set_active_root(Some("com.example.game"));

        engine.handle_signal(&signal("com.example.game"), 1_000);
        let event = engine.handle_signal(&signal("com.example.game"), 1_300);
        assert!(event.is_none());
        assert_eq!(engine.state(), DetectorState::EnabledHidden);

        // Once the surface recovers, the next cycle shows normally.
        surface.fail_shows(false);
        let event = engine.handle_signal(&signal("com.example.game"), 1_400);
        assert!(matches!(event, Some(Event::OverlayShown { .. })));
        assert_eq!(engine.state(), DetectorState::EnabledVisible);
    }

    #[test]
    fn test_allowlisted_app_never_shows() {
        let (mut engine, platform, surface, _) = setup_engine(true);
        engine.set_allowlist(["chat.app".to_string()].into_iter().collect());
        platform.set_active_root(Some("chat.app"));

        engine.handle_signal(&signal("chat.app"), 1_000);
        engine.handle_signal(&signal("chat.app"), 2_000);
        assert_eq!(engine.state(), DetectorState::EnabledHidden);
        assert_eq!(surface.shows(), 0);
    }

    #[test]
    fn test_install_change_rebuilds_classifier() {
        let (mut engine, platform, surface, _) = setup_engine(true);
        platform.set_active_root(Some("com.vendor.newapp"));

        // Unknown app would block once stable.
        engine.handle_signal(&signal("com.vendor.newapp"), 1_000);

        // It gets installed as a system component; rebuild picks it up.
        platform.install("com.vendor.newapp", crate::platform::AppMetadata::system());
        let event = engine.handle_install_change();
        assert!(matches!(event, Some(Event::ClassifierRebuilt { .. })));

        engine.handle_signal(&signal("com.vendor.newapp"), 1_300);
        assert_eq!(engine.state(), DetectorState::EnabledHidden);
        assert_eq!(surface.shows(), 0);
    }

    #[test]
    fn test_stop_hides_and_cancels() {
        let (mut engine, platform, surface, _) = setup_engine(true);
        show_foreign(&mut engine, &platform, 1_000);
        let event = engine.stop();
        assert!(matches!(
            event,
            Some(Event::Stopped {
                overlay_was_visible: true,
                ..
            })
        ));
        assert_eq!(surface.hides(), 1);
        assert_eq!(engine.next_deadline_ms(), None);
    }
}
