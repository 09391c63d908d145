//! Foreground resolution.
//!
//! Collapses the three disagreeing observations in a `ForegroundSnapshot`
//! into one best-guess foreground application. Fixed preference order:
//! the active root surface is authoritative, the last change notification
//! is next (only while fresh), and the top of the stacking order is a last
//! resort because overlays and system surfaces frequently sit on top
//! without being the logical foreground.
//!
//! When every observation classifies as self/system/home the resolver still
//! returns the best available answer, so the caller can recognize home
//! context instead of mistaking it for signal loss. A last signal past the
//! freshness horizon is invisible to resolution entirely; once the live
//! queries also fail, the resolver reports none and the caller's
//! unknown-signal handling takes over.

use crate::classify::Classifier;
use crate::signals::ForegroundSnapshot;
use crate::AppId;

/// Resolve the snapshot to a single pick, or `None` on total signal loss.
pub fn resolve(
    snapshot: &ForegroundSnapshot,
    classifier: &Classifier,
    freshness_ms: u64,
) -> Option<AppId> {
    let last_signal_is_fresh = snapshot
        .last_signal_age_ms
        .map(|age| age <= freshness_ms)
        .unwrap_or(false);

    fn push_distinct<'a>(candidate: Option<&'a AppId>, candidates: &mut Vec<&'a AppId>) {
        if let Some(id) = candidate {
            if !candidates.iter().any(|c| *c == id) {
                candidates.push(id);
            }
        }
    }

    let mut candidates: Vec<&AppId> = Vec::with_capacity(3);
    push_distinct(snapshot.by_active_root.as_ref(), &mut candidates);
    if last_signal_is_fresh {
        push_distinct(snapshot.by_last_signal.as_ref(), &mut candidates);
    }
    push_distinct(snapshot.by_top_layer.as_ref(), &mut candidates);

    let foreign = candidates
        .iter()
        .find(|id| !classifier.is_self_or_system(id) && !classifier.is_home_surface(id));
    if let Some(id) = foreign {
        return Some((*id).clone());
    }

    // Everything observed is self/system/home: fall back to the best
    // available answer so home context is still recognizable downstream.
    // A stale last signal stays out here too; resolving to none is what
    // lets the caller notice persistent signal loss.
    let fresh_last_signal = if last_signal_is_fresh {
        snapshot.by_last_signal.clone()
    } else {
        None
    };
    snapshot
        .by_active_root
        .clone()
        .or(fresh_last_signal)
        .or_else(|| snapshot.by_top_layer.clone())
}
