//! Orchestrates write, read, detect, and verified-backup operations.
//!
//! Every operation that touches hardware takes the single device lock for
//! its full duration; a second attempt while one is in flight fails with
//! [`FlashError::DeviceBusy`] rather than queueing. Failures are logged as
//! error events at this boundary and returned as typed errors.

use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::NamedTempFile;

use crate::compare::files_equal;
use crate::error::{FlashError, Result};
use crate::event::EventSink;
use crate::reconcile::SelectionState;
use crate::runner::Runner;

/// Default serial baud rate when the operator does not override it.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Identifies the port and baud rate the programmer should use.
///
/// Rendered as the programmer's `-p` argument:
/// `serprog:dev=<port>:<baud>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgrammerSpec {
    port: String,
    baud: u32,
}

impl ProgrammerSpec {
    pub fn new(port: impl Into<String>, baud: Option<u32>) -> Self {
        Self {
            port: port.into(),
            baud: baud.unwrap_or(DEFAULT_BAUD),
        }
    }

    /// Builds a spec from the reconciler's current selection.
    pub fn from_selection(state: &SelectionState, baud: Option<u32>) -> Result<Self> {
        match &state.selected {
            Some(port) => Ok(Self::new(port.clone(), baud)),
            None => Err(FlashError::NoPortSelected),
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }
}

impl fmt::Display for ProgrammerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "serprog:dev={}:{}", self.port, self.baud)
    }
}

/// How a smart backup finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// Both reads matched; the destination holds the verified dump.
    Verified,
    /// The two reads disagreed. The destination is untouched; both dumps
    /// are kept beside it for inspection.
    IntegrityMismatch {
        first_dump: PathBuf,
        second_dump: PathBuf,
    },
}

impl BackupOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, BackupOutcome::Verified)
    }
}

/// Drives the programmer through its hardware operations.
///
/// The hardware channel is exclusive: at most one of
/// [`write`](Flasher::write), [`read`](Flasher::read),
/// [`smart_backup`](Flasher::smart_backup), or
/// [`detect`](Flasher::detect) runs at a time.
pub struct Flasher<R> {
    runner: R,
    busy: AtomicBool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<R: Runner> Flasher<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            busy: AtomicBool::new(false),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Whether a hardware operation is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Result<BusyGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(FlashError::DeviceBusy);
        }
        Ok(BusyGuard(&self.busy))
    }

    /// Writes a firmware image to the chip.
    ///
    /// Destructive. `confirm` must return true before the hardware is
    /// touched; when it declines, the operation is dropped with an info
    /// event and `Ok(())`.
    pub fn write(
        &self,
        spec: &ProgrammerSpec,
        firmware: Option<&Path>,
        confirm: impl FnOnce() -> bool,
        sink: &dyn EventSink,
    ) -> Result<()> {
        logged("Write", sink, || {
            let firmware = firmware
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or(FlashError::NoFirmwareSelected)?;

            if !confirm() {
                sink.info("Write cancelled.");
                return Ok(());
            }

            let _guard = self.acquire()?;
            sink.warn("--- Starting write ---");
            let spec_arg = spec.to_string();
            self.runner.run(
                &[
                    OsStr::new("-p"),
                    spec_arg.as_ref(),
                    OsStr::new("-w"),
                    firmware.as_os_str(),
                ],
                sink,
            )?;
            sink.success("Write completed successfully.");
            Ok(())
        })
    }

    /// Reads the chip once into `dest`. No verification pass.
    pub fn read(&self, spec: &ProgrammerSpec, dest: &Path, sink: &dyn EventSink) -> Result<()> {
        logged("Read", sink, || {
            let _guard = self.acquire()?;
            sink.info(&format!("Reading chip to {}", dest.display()));
            self.run_read(spec, dest, sink)?;
            sink.success(&format!("Read complete: {}", dest.display()));
            Ok(())
        })
    }

    /// Reads the chip twice and keeps the result only if both reads agree.
    ///
    /// The reads are sequential; the hardware channel is exclusive. On a
    /// match the first dump is copied to `dest` (overwriting it). On a
    /// mismatch `dest` is left untouched and the dumps are kept as
    /// `<dest>.err1` / `<dest>.err2` for inspection. The temporary files
    /// are removed either way.
    pub fn smart_backup(
        &self,
        spec: &ProgrammerSpec,
        dest: &Path,
        sink: &dyn EventSink,
    ) -> Result<BackupOutcome> {
        logged("Backup", sink, || {
            let _guard = self.acquire()?;
            sink.info("--- Starting smart backup ---");

            let first = NamedTempFile::new()?;
            let second = NamedTempFile::new()?;

            sink.info("Reading (1/2)...");
            self.run_read(spec, first.path(), sink)?;
            sink.info("Verifying (2/2)...");
            self.run_read(spec, second.path(), sink)?;

            sink.warn("Validating integrity...");
            if files_equal(first.path(), second.path())? {
                fs::copy(first.path(), dest)?;
                sink.success(&format!("Backup saved: {}", dest.display()));
                Ok(BackupOutcome::Verified)
            } else {
                let first_dump = append_suffix(dest, ".err1");
                let second_dump = append_suffix(dest, ".err2");
                fs::copy(first.path(), &first_dump)?;
                fs::copy(second.path(), &second_dump)?;
                sink.error("Integrity check failed. Divergent dumps kept for inspection.");
                Ok(BackupOutcome::IntegrityMismatch {
                    first_dump,
                    second_dump,
                })
            }
            // Both temporaries are removed when their handles drop.
        })
    }

    /// Probes the programmer and chip without transferring data.
    pub fn detect(&self, spec: &ProgrammerSpec, sink: &dyn EventSink) -> Result<()> {
        logged("Detect", sink, || {
            let _guard = self.acquire()?;
            sink.info(&format!("Probing {spec}"));
            let spec_arg = spec.to_string();
            self.runner
                .run(&[OsStr::new("-p"), spec_arg.as_ref()], sink)?;
            sink.success("Probe finished.");
            Ok(())
        })
    }

    /// Compares two files byte for byte. Informational only; touches no
    /// hardware and does not take the device lock.
    pub fn compare_files(&self, a: &Path, b: &Path, sink: &dyn EventSink) -> Result<bool> {
        logged("Compare", sink, || {
            sink.info(&format!(
                "Comparing {} x {}",
                a.display(),
                b.display()
            ));
            let equal = files_equal(a, b)?;
            if equal {
                sink.success("Result: identical");
            } else {
                sink.error("Result: different");
            }
            Ok(equal)
        })
    }

    fn run_read(&self, spec: &ProgrammerSpec, dest: &Path, sink: &dyn EventSink) -> Result<()> {
        let spec_arg = spec.to_string();
        self.runner.run(
            &[
                OsStr::new("-p"),
                spec_arg.as_ref(),
                OsStr::new("-r"),
                dest.as_os_str(),
            ],
            sink,
        )
    }
}

/// Runs `op`, logging any failure as an error event before returning it.
fn logged<T>(what: &str, sink: &dyn EventSink, op: impl FnOnce() -> Result<T>) -> Result<T> {
    match op() {
        Ok(value) => Ok(value),
        Err(e) => {
            sink.error(&format!("{what} failed: {e}"));
            Err(e)
        }
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
