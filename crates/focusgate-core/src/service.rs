//! Serialized execution context for the detector.
//!
//! The engine is synchronous; this wrapper gives it the single-writer
//! context the rest of the host talks to. One tokio task owns the engine,
//! a cloneable `DetectorHandle` marshals session control and platform
//! notifications into it over a channel, and the task arms a sleep from
//! `next_deadline_ms()` so the debounce deadline becomes the loop's only
//! suspension point. Emitted events are forwarded to an optional channel.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::{now_ms, DetectorEngine};
use crate::events::Event;
use crate::signals::SurfaceChange;
use crate::AppId;

#[derive(Debug)]
enum Command {
    Signal(SurfaceChange),
    InstallChanged,
    SetEnabled(bool),
    SetAllowlist(HashSet<AppId>),
    Stop,
}

/// Cloneable handle into the detector task.
///
/// Every method is safe to call from any task or thread; the operation is
/// marshaled into the detector's own context. Sends to a stopped detector
/// are silently dropped.
#[derive(Debug, Clone)]
pub struct DetectorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl DetectorHandle {
    pub fn set_enabled(&self, enabled: bool) {
        let _ = self.tx.send(Command::SetEnabled(enabled));
    }

    pub fn set_allowlist(&self, apps: HashSet<AppId>) {
        let _ = self.tx.send(Command::SetAllowlist(apps));
    }

    pub fn notify_surface_change(&self, change: SurfaceChange) {
        let _ = self.tx.send(Command::Signal(change));
    }

    pub fn notify_install_change(&self) {
        let _ = self.tx.send(Command::InstallChanged);
    }

    /// Ask the task to stop; it hides the overlay on the way out.
    pub fn stop(&self) {
        let _ = self.tx.send(Command::Stop);
    }
}

/// Runs a `DetectorEngine` on its own task.
pub struct DetectorService;

impl DetectorService {
    /// Spawn the detector task. The engine's `start` runs first; every
    /// emitted event is forwarded to `events` when one is provided.
    ///
    /// The task ends on `DetectorHandle::stop` or when the last handle is
    /// dropped, running the engine's `stop` on the way out.
    pub fn spawn(
        mut engine: DetectorEngine,
        events: Option<mpsc::UnboundedSender<Event>>,
    ) -> (DetectorHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            forward(&events, engine.start());
            loop {
                let deadline = engine.next_deadline_ms();
                tokio::select! {
                    cmd = rx.recv() => match cmd {
                        Some(Command::Signal(change)) => {
                            forward(&events, engine.handle_signal(&change, now_ms()));
                        }
                        Some(Command::InstallChanged) => {
                            forward(&events, engine.handle_install_change());
                        }
                        Some(Command::SetEnabled(enabled)) => {
                            forward(&events, engine.set_enabled(enabled));
                        }
                        Some(Command::SetAllowlist(apps)) => {
                            forward(&events, engine.set_allowlist(apps));
                        }
                        Some(Command::Stop) | None => break,
                    },
                    _ = sleep_until(deadline), if deadline.is_some() => {
                        forward(&events, engine.tick(now_ms()));
                    }
                }
            }
            forward(&events, engine.stop());
        });
        (DetectorHandle { tx }, task)
    }
}

/// Sleep until the absolute epoch-ms deadline. Re-created on every loop
/// iteration, which keeps the deadline absolute while commands interleave.
async fn sleep_until(deadline_ms: Option<u64>) {
    let Some(deadline) = deadline_ms else {
        // Unreachable: the select arm is guarded on `is_some`.
        return;
    };
    let remaining = deadline.saturating_sub(now_ms());
    tokio::time::sleep(Duration::from_millis(remaining)).await;
}

fn forward(events: &Option<mpsc::UnboundedSender<Event>>, event: Option<Event>) {
    if let (Some(tx), Some(event)) = (events, event) {
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::classify::SeedCatalog;
    use crate::config::DetectorConfig;
    use crate::platform::{BlockingSurface, Platform, RecordingSurface, ScriptedPlatform};
    use crate::signals::SurfaceChangeKind;
    use crate::store::MemorySessionStore;

    const RECV_TIMEOUT: Duration = Duration::from_secs(2);

    fn setup_service(
        enabled: bool,
    ) -> (
        DetectorHandle,
        JoinHandle<()>,
        mpsc::UnboundedReceiver<Event>,
        Arc<ScriptedPlatform>,
    ) {
        let platform = Arc::new(ScriptedPlatform::new());
        let surface = Arc::new(RecordingSurface::new());
        // Short windows so debounced transitions land quickly.
        let config = DetectorConfig {
            stability_window_ms: 20,
            debounce_window_ms: 30,
            ..DetectorConfig::default()
        };
        let engine = DetectorEngine::new(
            "com.example.focus",
            config,
            SeedCatalog::default(),
            Arc::clone(&platform) as Arc<dyn Platform>,
            surface as Arc<dyn BlockingSurface>,
            Box::new(MemorySessionStore::new(Some(enabled))),
        );
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (handle, task) = DetectorService::spawn(engine, Some(events_tx));
        (handle, task, events_rx, platform)
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
        tokio::time::timeout(RECV_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_session_control_marshals_into_task() {
        let (handle, task, mut events, _) = setup_service(false);
        assert!(matches!(
            recv(&mut events).await,
            Event::Started { enabled: false, .. }
        ));

        handle.set_enabled(true);
        assert!(matches!(recv(&mut events).await, Event::SessionEnabled { .. }));

        handle.stop();
        assert!(matches!(
            recv(&mut events).await,
            Event::Stopped {
                overlay_was_visible: false,
                ..
            }
        ));
        task.await.expect("detector task panicked");
    }

    #[tokio::test]
    async fn test_show_then_debounced_hide() {
        let (handle, task, mut events, platform) = setup_service(true);
        assert!(matches!(recv(&mut events).await, Event::Started { .. }));

        platform.set_active_root(Some("com.example.game"));
        let change = SurfaceChange::new("com.example.game", SurfaceChangeKind::SurfaceChanged);
        handle.notify_surface_change(change.clone());
        // Let the stability window pass, then confirm the same pick.
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.notify_surface_change(change);
        assert!(matches!(recv(&mut events).await, Event::OverlayShown { .. }));

        // Returning home hides through the debounce deadline, no extra
        // notification needed once it is armed.
        platform.set_active_root(Some("com.android.launcher3"));
        handle.notify_surface_change(SurfaceChange::new(
            "com.android.launcher3",
            SurfaceChangeKind::SurfaceChanged,
        ));
        assert!(matches!(recv(&mut events).await, Event::OverlayHidden { .. }));

        handle.stop();
        task.await.expect("detector task panicked");
    }

    #[tokio::test]
    async fn test_dropping_handles_stops_the_task() {
        let (handle, task, mut events, _) = setup_service(false);
        assert!(matches!(recv(&mut events).await, Event::Started { .. }));

        drop(handle);
        assert!(matches!(recv(&mut events).await, Event::Stopped { .. }));
        task.await.expect("detector task panicked");
    }
}
