//! Keeps the selected port in sync with a changing set of attached devices.
//!
//! Devices can be plugged or unplugged at any time. The [`Reconciler`]
//! diffs each fresh enumeration against the last known one and decides how
//! the selection and connection indicator change, emitting events so the
//! operator can follow along. Manual selection bypasses the delta logic.

use crate::event::EventSink;
use crate::ports::{PortDelta, PortSnapshot};

const NO_SELECTION_STATUS: &str = "Select a port...";

/// Current port selection and connection indicator.
///
/// Invariant: `connected` implies `selected` is present and was a member of
/// the last known snapshot when the connection was established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    pub selected: Option<String>,
    pub connected: bool,
    pub status: String,
}

impl SelectionState {
    fn no_selection() -> Self {
        Self {
            selected: None,
            connected: false,
            status: NO_SELECTION_STATUS.to_string(),
        }
    }
}

/// Reconciles the selected port against device arrivals and removals.
///
/// Owns the last known snapshot and the selection state; callers feed it
/// fresh enumerations (typically from [`crate::watch::PortWatcher`]).
pub struct Reconciler {
    known: PortSnapshot,
    state: SelectionState,
}

impl Reconciler {
    pub fn new(initial: PortSnapshot) -> Self {
        Self {
            known: initial,
            state: SelectionState::no_selection(),
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn selected_port(&self) -> Option<&str> {
        self.state.selected.as_deref()
    }

    pub fn known_ports(&self) -> &PortSnapshot {
        &self.known
    }

    /// Applies a fresh enumeration.
    ///
    /// Re-running with an unchanged snapshot is a no-op, so redundant
    /// firings of the debounced watcher are harmless.
    pub fn reconcile(&mut self, current: PortSnapshot, sink: &dyn EventSink) {
        let delta = PortDelta::between(&self.known, &current);
        if delta.is_empty() {
            return;
        }

        if current.len() > self.known.len() {
            // A device was attached; switch to it regardless of any
            // previous selection.
            if let Some(port) = delta.first_arrived() {
                let port = port.to_string();
                sink.success(&format!("New device detected: {port}"));
                self.connect(port, sink);
            }
        } else if current.len() < self.known.len() {
            match &self.state.selected {
                Some(selected) if !current.contains(selected) => {
                    sink.warn("Active port was removed.");
                    self.clear("Device disconnected", sink);
                }
                _ => {}
            }
        } else if let Some(selected) = &self.state.selected {
            if !current.contains(selected) {
                // Same count, but the selected port was swapped out.
                sink.warn(&format!("Selected port {selected} is no longer present."));
                self.clear(NO_SELECTION_STATUS, sink);
            }
        }

        self.known = current;
    }

    /// Manual selection by the operator; bypasses delta logic entirely.
    pub fn select(&mut self, port: impl Into<String>, sink: &dyn EventSink) {
        let port = port.into();
        sink.info(&format!("Port selected manually: {port}"));
        self.connect(port, sink);
    }

    pub fn deselect(&mut self, sink: &dyn EventSink) {
        self.state = SelectionState::no_selection();
        sink.status(false, NO_SELECTION_STATUS);
    }

    fn connect(&mut self, port: String, sink: &dyn EventSink) {
        self.state.status = format!("Connected: {port}");
        self.state.selected = Some(port);
        self.state.connected = true;
        sink.status(true, &self.state.status);
    }

    fn clear(&mut self, status: &str, sink: &dyn EventSink) {
        self.state.selected = None;
        self.state.connected = false;
        self.state.status = status.to_string();
        sink.status(false, status);
    }
}
