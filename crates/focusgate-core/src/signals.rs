//! Surface-change signals and their aggregation.
//!
//! Three independent observations describe "what is on screen": a direct
//! query for the active root surface, the top of the surface stacking
//! order, and the most recent asynchronous change notification. The tracker
//! stores the last named notification; `snapshot` combines it with the two
//! live queries. No interpretation happens here - ranking the signals is
//! the resolver's job.

use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::AppId;

/// Category of an inbound surface-change notification.
///
/// All categories trigger the same re-check; the kind survives only for
/// logging and traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceChangeKind {
    SurfaceChanged,
    SurfaceSetChanged,
    ContentChanged,
}

/// One asynchronous surface-change notification from the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceChange {
    /// Application owning the event's source. The platform does not always
    /// name one.
    pub source: Option<AppId>,
    pub kind: SurfaceChangeKind,
}

impl SurfaceChange {
    pub fn new(source: impl Into<AppId>, kind: SurfaceChangeKind) -> Self {
        Self {
            source: Some(source.into()),
            kind,
        }
    }

    /// A notification whose source the platform left unnamed.
    pub fn anonymous(kind: SurfaceChangeKind) -> Self {
        Self { source: None, kind }
    }
}

/// The three foreground observations, rebuilt on every resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForegroundSnapshot {
    /// Owner of the currently active top-level surface (most authoritative).
    pub by_active_root: Option<AppId>,
    /// Owner of the highest-stacking surface (least authoritative: picks up
    /// overlays and system surfaces).
    pub by_top_layer: Option<AppId>,
    /// Application named in the most recent change notification.
    pub by_last_signal: Option<AppId>,
    /// Age of `by_last_signal`; `None` when no named notification has
    /// arrived yet.
    pub last_signal_age_ms: Option<u64>,
}

#[derive(Debug, Clone)]
struct LastSignal {
    app: AppId,
    received_at_ms: u64,
}

/// Remembers the most recent named surface-change notification.
#[derive(Debug, Default)]
pub struct SignalTracker {
    last: Option<LastSignal>,
}

impl SignalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound notification. Unnamed sources leave the previous
    /// named signal in place.
    pub fn record(&mut self, change: &SurfaceChange, now_ms: u64) {
        if let Some(app) = &change.source {
            self.last = Some(LastSignal {
                app: app.clone(),
                received_at_ms: now_ms,
            });
        }
    }

    /// Milliseconds since the last named notification arrived.
    pub fn last_signal_age_ms(&self, now_ms: u64) -> Option<u64> {
        self.last
            .as_ref()
            .map(|l| now_ms.saturating_sub(l.received_at_ms))
    }

    /// Assemble the resolution snapshot from the live platform queries plus
    /// the remembered signal. Query failures become absent fields.
    pub fn snapshot(&self, platform: &dyn Platform, now_ms: u64) -> ForegroundSnapshot {
        let by_active_root = platform.active_surface_owner();
        let by_top_layer = platform
            .surface_stack()
            .into_iter()
            .max_by_key(|s| s.layer)
            .map(|s| s.owner);
        ForegroundSnapshot {
            by_active_root,
            by_top_layer,
            by_last_signal: self.last.as_ref().map(|l| l.app.clone()),
            last_signal_age_ms: self.last_signal_age_ms(now_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ScriptedPlatform, SurfaceInfo};

    #[test]
    fn test_record_and_age() {
        let mut tracker = SignalTracker::new();
        assert_eq!(tracker.last_signal_age_ms(1_000), None);

        tracker.record(
            &SurfaceChange::new("com.example.game", SurfaceChangeKind::SurfaceChanged),
            1_000,
        );
        assert_eq!(tracker.last_signal_age_ms(1_000), Some(0));
        assert_eq!(tracker.last_signal_age_ms(1_700), Some(700));
    }

    #[test]
    fn test_anonymous_notification_keeps_previous_signal() {
        let mut tracker = SignalTracker::new();
        tracker.record(
            &SurfaceChange::new("com.example.game", SurfaceChangeKind::SurfaceChanged),
            1_000,
        );
        tracker.record(
            &SurfaceChange::anonymous(SurfaceChangeKind::ContentChanged),
            1_500,
        );

        let platform = ScriptedPlatform::new();
        let snapshot = tracker.snapshot(&platform, 1_500);
        assert_eq!(snapshot.by_last_signal.as_deref(), Some("com.example.game"));
        assert_eq!(snapshot.last_signal_age_ms, Some(500));
    }

    #[test]
    fn test_snapshot_takes_highest_layer_owner() {
        let platform = ScriptedPlatform::new();
        platform.set_active_root(Some("com.example.editor"));
        platform.set_surfaces(vec![
            SurfaceInfo::new("com.example.editor", 2),
            SurfaceInfo::new("com.android.systemui", 7),
            SurfaceInfo::new("com.example.widget", 4),
        ]);

        let tracker = SignalTracker::new();
        let snapshot = tracker.snapshot(&platform, 0);
        assert_eq!(snapshot.by_active_root.as_deref(), Some("com.example.editor"));
        assert_eq!(snapshot.by_top_layer.as_deref(), Some("com.android.systemui"));
        assert_eq!(snapshot.by_last_signal, None);
    }

    #[test]
    fn test_snapshot_with_unavailable_platform_is_all_absent() {
        let platform = ScriptedPlatform::new();
        let tracker = SignalTracker::new();
        assert_eq!(tracker.snapshot(&platform, 0), ForegroundSnapshot::default());
    }
}
