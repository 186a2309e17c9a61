//! The core, UI-agnostic library for the `serflash` flashing tool.
//!
//! `serflash-core` drives an external flashrom-compatible programmer
//! executable over the `serprog` protocol and keeps track of which serial
//! ports are attached while the operator works. It is designed to be used
//! as a library by any front-end, whether a command-line interface (like
//! `serflash`) or a graphical one.
//!
//! The library is structured into several key modules:
//! - [`ports`]: Port snapshots, change deltas, and the enumeration seam.
//! - [`reconcile`]: The selection state machine that follows hotplug.
//! - [`watch`]: Debounced re-enumeration after device-change signals.
//! - [`runner`]: Spawns the programmer and streams its output.
//! - [`flash`]: Write, read, detect, and verified-backup orchestration.
//! - [`event`]: The [`event::EventSink`] every operation reports through,
//!   allowing the calling application to render events in any way it
//!   chooses.
//!
//! ## Example: a verified backup
//!
//! ```rust,no_run
//! use serflash_core::event::NullSink;
//! use serflash_core::flash::{Flasher, ProgrammerSpec};
//! use serflash_core::runner::ProgrammerExe;
//! use std::path::Path;
//!
//! fn main() -> serflash_core::error::Result<()> {
//!     let flasher = Flasher::new(ProgrammerExe::new("flashrom"));
//!     let spec = ProgrammerSpec::new("/dev/ttyUSB0", None);
//!
//!     // Reads the chip twice; the backup is kept only if both reads
//!     // agree byte for byte.
//!     let outcome = flasher.smart_backup(&spec, Path::new("backup.bin"), &NullSink)?;
//!     println!("verified: {}", outcome.is_verified());
//!     Ok(())
//! }
//! ```

pub mod compare;
pub mod error;
pub mod event;
pub mod flash;
pub mod ports;
pub mod reconcile;
pub mod runner;
pub mod watch;
