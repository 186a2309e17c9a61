//! Communication-port snapshots and change deltas.
//!
//! A [`PortSnapshot`] is the set of port names available at one point in
//! time; a [`PortDelta`] is the difference between two snapshots, split
//! into arrivals and departures. The [`PortEnumerator`] trait is the seam
//! between the reconciliation logic and the operating system.

use std::collections::BTreeSet;

use crate::error::Result;

/// Set of available port names captured at one point in time.
///
/// Backed by an ordered set, so "first" is a deterministic choice when
/// several ports appear in a single delta and duplicates cannot occur.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSnapshot {
    ports: BTreeSet<String>,
}

impl PortSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, port: &str) -> bool {
        self.ports.contains(port)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Port names in set order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PortSnapshot {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            ports: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ports that appeared and disappeared between two snapshots.
///
/// `arrived` and `departed` partition the symmetric difference of the two
/// snapshots; in the common single-device-change case exactly one of them
/// is non-empty, but both may be.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortDelta {
    pub arrived: BTreeSet<String>,
    pub departed: BTreeSet<String>,
}

impl PortDelta {
    /// Computes the delta from `prev` to `curr`.
    pub fn between(prev: &PortSnapshot, curr: &PortSnapshot) -> Self {
        Self {
            arrived: curr.ports.difference(&prev.ports).cloned().collect(),
            departed: prev.ports.difference(&curr.ports).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.arrived.is_empty() && self.departed.is_empty()
    }

    /// First arrived port in set order.
    pub fn first_arrived(&self) -> Option<&str> {
        self.arrived.iter().next().map(String::as_str)
    }
}

/// Source of port snapshots.
///
/// Production code enumerates through the operating system; tests
/// substitute fixed sets.
pub trait PortEnumerator: Send + Sync {
    fn enumerate(&self) -> Result<PortSnapshot>;
}

/// Enumerates the serial ports currently known to the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialEnumerator;

impl PortEnumerator for SerialEnumerator {
    fn enumerate(&self) -> Result<PortSnapshot> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(ports: &[&str]) -> PortSnapshot {
        ports.iter().copied().collect()
    }

    fn apply(prev: &PortSnapshot, delta: &PortDelta) -> PortSnapshot {
        prev.iter()
            .filter(|p| !delta.departed.contains(*p))
            .map(str::to_string)
            .chain(delta.arrived.iter().cloned())
            .collect()
    }

    #[test]
    fn delta_partitions_symmetric_difference() {
        let prev = snapshot(&["COM1", "COM3", "COM7"]);
        let curr = snapshot(&["COM3", "COM5", "COM7"]);

        let delta = PortDelta::between(&prev, &curr);
        assert_eq!(delta.arrived, snapshot(&["COM5"]).ports);
        assert_eq!(delta.departed, snapshot(&["COM1"]).ports);
        assert!(delta.arrived.is_disjoint(&delta.departed));
    }

    #[test]
    fn applying_delta_reproduces_current_snapshot() {
        let cases = [
            (snapshot(&[]), snapshot(&["COM3"])),
            (snapshot(&["COM3"]), snapshot(&[])),
            (snapshot(&["COM1", "COM2"]), snapshot(&["COM2", "COM9"])),
            (snapshot(&["COM4"]), snapshot(&["COM4"])),
        ];

        for (prev, curr) in cases {
            let delta = PortDelta::between(&prev, &curr);
            assert_eq!(apply(&prev, &delta), curr);
        }
    }

    #[test]
    fn unchanged_snapshot_yields_empty_delta() {
        let snap = snapshot(&["COM3", "COM5"]);
        assert!(PortDelta::between(&snap, &snap).is_empty());
    }

    #[test]
    fn snapshot_deduplicates() {
        let snap: PortSnapshot = ["COM3", "COM3", "COM5"].into_iter().collect();
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn first_arrived_is_deterministic() {
        let prev = snapshot(&[]);
        let curr = snapshot(&["COM9", "COM2", "COM5"]);
        let delta = PortDelta::between(&prev, &curr);
        assert_eq!(delta.first_arrived(), Some("COM2"));
    }
}
