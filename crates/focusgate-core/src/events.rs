use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::{AllowCause, BlockCause};

/// Every externally visible transition of the detector produces an Event.
/// The host UI polls or subscribes; the service forwards them over a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Detector started; `enabled` reflects the persisted flag just loaded.
    Started {
        enabled: bool,
        at: DateTime<Utc>,
    },
    SessionEnabled {
        at: DateTime<Utc>,
    },
    /// Disable always hides the overlay; the flag records whether it was up.
    SessionDisabled {
        overlay_was_visible: bool,
        at: DateTime<Utc>,
    },
    AllowlistReplaced {
        size: usize,
        at: DateTime<Utc>,
    },
    OverlayShown {
        cause: BlockCause,
        at: DateTime<Utc>,
    },
    OverlayHidden {
        cause: AllowCause,
        at: DateTime<Utc>,
    },
    /// Classification sets were rebuilt after an install/uninstall signal.
    ClassifierRebuilt {
        system_apps: usize,
        home_apps: usize,
        at: DateTime<Utc>,
    },
    Stopped {
        overlay_was_visible: bool,
        at: DateTime<Utc>,
    },
}
