//! Debounced re-enumeration of ports after device-change signals.
//!
//! The platform only tells us "something changed". A newly attached
//! composite device can take a moment to finish enumerating, so each
//! signal schedules a re-enumeration after a settle delay rather than
//! acting immediately. The delay is a debounce, not a cancellable timer:
//! overlapping signals each schedule their own re-enumeration, which is
//! harmless because re-enumeration is idempotent.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use crate::ports::{PortEnumerator, PortSnapshot};

/// Settle delay before re-enumerating after a device change.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Handle used to report that the set of attached devices may have
/// changed. Carries no further detail; the watcher re-enumerates to find
/// out what happened.
#[derive(Clone)]
pub struct DeviceChangeSignal(Sender<()>);

impl DeviceChangeSignal {
    pub fn notify(&self) {
        let _ = self.0.send(());
    }
}

/// Listens for device-change signals and delivers fresh snapshots.
pub struct PortWatcher {
    snapshots: Receiver<PortSnapshot>,
}

impl PortWatcher {
    /// Spawns the watcher threads.
    ///
    /// Every [`DeviceChangeSignal::notify`] schedules one re-enumeration
    /// `settle` later; the resulting snapshot arrives on
    /// [`PortWatcher::snapshots`].
    pub fn spawn(
        enumerator: Arc<dyn PortEnumerator>,
        settle: Duration,
    ) -> (Self, DeviceChangeSignal) {
        let (signal_tx, signal_rx) = channel::unbounded::<()>();
        let (snap_tx, snap_rx) = channel::unbounded();

        thread::spawn(move || {
            while signal_rx.recv().is_ok() {
                let enumerator = Arc::clone(&enumerator);
                let snap_tx = snap_tx.clone();
                thread::spawn(move || {
                    thread::sleep(settle);
                    match enumerator.enumerate() {
                        Ok(snapshot) => {
                            let _ = snap_tx.send(snapshot);
                        }
                        Err(e) => log::warn!("port enumeration failed: {e}"),
                    }
                });
            }
        });

        (Self { snapshots: snap_rx }, DeviceChangeSignal(signal_tx))
    }

    /// Channel on which re-enumerated snapshots arrive.
    pub fn snapshots(&self) -> &Receiver<PortSnapshot> {
        &self.snapshots
    }
}

/// Fires `signal` whenever a poll of the enumerator yields a different set
/// than the previous poll.
///
/// Portable stand-in for platforms without a usable native device-change
/// notification; the signal still goes through the watcher's settle delay
/// like any other.
pub fn spawn_poll_notifier(
    enumerator: Arc<dyn PortEnumerator>,
    signal: DeviceChangeSignal,
    interval: Duration,
) {
    thread::spawn(move || {
        let mut previous: Option<PortSnapshot> = None;
        loop {
            thread::sleep(interval);
            let current = match enumerator.enumerate() {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    log::warn!("port enumeration failed: {e}");
                    continue;
                }
            };
            if previous.as_ref().is_some_and(|p| *p != current) {
                signal.notify();
            }
            previous = Some(current);
        }
    });
}
