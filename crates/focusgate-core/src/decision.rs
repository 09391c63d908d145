//! The block/unblock decision.
//!
//! One pure function turns (pick, snapshot, session, classification, gate
//! state, time) into a verdict. Both scheduling paths - the immediate path
//! taken while the overlay is hidden and the debounced path - call this
//! same function, so they cannot drift apart.
//!
//! Check order is significant and deliberate: a disabled session wins over
//! everything, home context wins over unknown-signal blocking, and trusted
//! or allowlisted classification wins over the stability gate.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::signals::ForegroundSnapshot;
use crate::stability::StabilityGate;
use crate::AppId;

/// Mutable session state owned by the arbitrator.
#[derive(Debug, Clone)]
pub struct Session {
    self_id: AppId,
    enabled: bool,
    allowlist: HashSet<AppId>,
}

impl Session {
    /// A disabled session whose allowlist contains only the host itself.
    pub fn new(self_id: AppId) -> Self {
        let mut allowlist = HashSet::new();
        allowlist.insert(self_id.clone());
        Self {
            self_id,
            enabled: false,
            allowlist,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn allowlist(&self) -> &HashSet<AppId> {
        &self.allowlist
    }

    /// Replace the allowlist wholesale. The host's own identifier is always
    /// merged back in, regardless of the incoming set.
    pub fn set_allowlist(&mut self, apps: HashSet<AppId>) {
        self.allowlist = apps;
        self.allowlist.insert(self.self_id.clone());
    }
}

/// Why the overlay should be up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum BlockCause {
    /// A foreign application held the foreground through the stability
    /// window.
    ForeignApp { app: AppId },
    /// Every signal has been gone for longer than the grace window.
    SignalLoss,
}

/// Why the overlay should be (or stay) down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum AllowCause {
    Disabled,
    /// The pick is a home/launcher surface or the system shell.
    HomeContext,
    SelfOrSystem,
    Allowlisted,
    /// Foreign pick observed but not yet stable.
    Priming { app: AppId },
    /// No pick, but the most recent signal is too fresh to assume foreign.
    SignalGap,
}

/// Final verdict of one resolution cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Block(BlockCause),
    Allow(AllowCause),
}

impl Decision {
    pub fn should_block(&self) -> bool {
        matches!(self, Decision::Block(_))
    }
}

/// Compute the verdict for one resolution cycle.
///
/// `pick` is the resolver's output for `snapshot`; the snapshot itself is
/// consulted only for signal freshness when the pick is absent.
pub fn decide(
    pick: Option<&AppId>,
    snapshot: &ForegroundSnapshot,
    session: &Session,
    classifier: &Classifier,
    gate: &mut StabilityGate,
    unknown_grace_ms: u64,
    now_ms: u64,
) -> Decision {
    if !session.enabled() {
        return Decision::Allow(AllowCause::Disabled);
    }

    let Some(pick) = pick else {
        // Total signal loss. Tolerate a short gap; a persistent one is
        // treated as a deliberate switch into something invisible to us.
        // With no signal ever received there is no loss to speak of.
        return match snapshot.last_signal_age_ms {
            Some(age) if age > unknown_grace_ms => Decision::Block(BlockCause::SignalLoss),
            _ => Decision::Allow(AllowCause::SignalGap),
        };
    };

    if classifier.is_home_surface(pick) || pick == classifier.system_shell() {
        return Decision::Allow(AllowCause::HomeContext);
    }
    if classifier.is_self_or_system(pick) {
        return Decision::Allow(AllowCause::SelfOrSystem);
    }
    if session.allowlist().contains(pick) {
        return Decision::Allow(AllowCause::Allowlisted);
    }

    if gate.admit(pick, now_ms) {
        Decision::Block(BlockCause::ForeignApp { app: pick.clone() })
    } else {
        Decision::Allow(AllowCause::Priming { app: pick.clone() })
    }
}
