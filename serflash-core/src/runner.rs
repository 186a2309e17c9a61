//! Spawns the external programmer executable and streams its output.
//!
//! The programmer is consumed purely through its command-line contract:
//! stdout and stderr are captured as independent line streams (ordered
//! within each stream, unordered across them), every non-blank line is
//! forwarded to the sink as a [`Command`](crate::event::Level::Command)
//! event, and the call blocks until the process exits. One invocation is
//! one attempt; the runner never retries.

use std::ffi::OsStr;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{FlashError, Result};
use crate::event::EventSink;

/// Executes one programmer invocation, forwarding output to the sink.
pub trait Runner: Send + Sync {
    fn run(&self, args: &[&OsStr], sink: &dyn EventSink) -> Result<()>;
}

/// The external programmer executable (flashrom or compatible).
#[derive(Debug, Clone)]
pub struct ProgrammerExe {
    path: PathBuf,
}

impl ProgrammerExe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Runner for ProgrammerExe {
    fn run(&self, args: &[&OsStr], sink: &dyn EventSink) -> Result<()> {
        // A bare command name is resolved through PATH by the OS; only an
        // explicit path can be checked up front.
        if self.path.components().count() > 1 && !self.path.exists() {
            return Err(FlashError::ExecutableNotFound(self.path.clone()));
        }

        log::debug!("spawning {} {:?}", self.path.display(), args);

        let mut child = Command::new(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    FlashError::ExecutableNotFound(self.path.clone())
                } else {
                    FlashError::FileSystem(e)
                }
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let joined = crossbeam::thread::scope(|s| {
            if let Some(out) = stdout {
                s.spawn(move |_| forward_lines(out, sink));
            }
            if let Some(err) = stderr {
                s.spawn(move |_| forward_lines(err, sink));
            }
        });
        if joined.is_err() {
            log::error!("programmer output reader thread panicked");
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(FlashError::ProcessFailed(status.code().unwrap_or(-1)));
        }
        Ok(())
    }
}

fn forward_lines(stream: impl Read, sink: &dyn EventSink) {
    for line in BufReader::new(stream).lines() {
        match line {
            Ok(line) if !line.trim().is_empty() => sink.command(&line),
            Ok(_) => {}
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Level, MemorySink};

    #[test]
    fn missing_explicit_path_fails_before_spawning() {
        let sink = MemorySink::new();
        let exe = ProgrammerExe::new("/definitely/not/here/flashrom");

        let err = exe.run(&[OsStr::new("-p")], &sink).unwrap_err();
        assert!(matches!(err, FlashError::ExecutableNotFound(_)));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn missing_bare_name_maps_to_executable_not_found() {
        let sink = MemorySink::new();
        let exe = ProgrammerExe::new("serflash-no-such-binary");

        let err = exe.run(&[], &sink).unwrap_err();
        assert!(matches!(err, FlashError::ExecutableNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn streams_both_pipes_and_reports_the_exit_code() {
        let sink = MemorySink::new();
        let exe = ProgrammerExe::new("/bin/sh");

        let err = exe
            .run(
                &[
                    OsStr::new("-c"),
                    OsStr::new("echo out-line; echo err-line >&2; exit 3"),
                ],
                &sink,
            )
            .unwrap_err();
        assert!(matches!(err, FlashError::ProcessFailed(3)));

        let lines: Vec<String> = sink
            .take()
            .into_iter()
            .filter(|e| e.level == Level::Command)
            .map(|e| e.message)
            .collect();
        assert!(lines.iter().any(|l| l == "out-line"));
        assert!(lines.iter().any(|l| l == "err-line"));
    }

    #[cfg(unix)]
    #[test]
    fn blank_lines_are_not_forwarded() {
        let sink = MemorySink::new();
        let exe = ProgrammerExe::new("/bin/sh");

        exe.run(
            &[OsStr::new("-c"), OsStr::new("echo; echo one; echo '   '")],
            &sink,
        )
        .unwrap();

        let lines: Vec<String> = sink.take().into_iter().map(|e| e.message).collect();
        assert_eq!(lines, vec!["one".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn zero_exit_is_success() {
        let sink = MemorySink::new();
        let exe = ProgrammerExe::new("/bin/sh");
        assert!(exe.run(&[OsStr::new("-c"), OsStr::new("true")], &sink).is_ok());
    }
}
