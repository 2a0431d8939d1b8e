//! Per-job progress sink.
//!
//! Batch jobs report progress to an explicit sink owned by the request
//! instead of mutating process-global I/O. Lines always reach the `log`
//! facade; when the sink is file-backed they are also appended to a
//! `runtime.log` the job owner can poll.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub struct JobSink {
	file: Option<Mutex<File>>,
}

impl JobSink {
	/// A sink that only forwards to the logger.
	pub fn discard() -> JobSink {
		JobSink { file: None }
	}

	/// A sink appending to the given log file, truncating a leftover file
	/// from an earlier run of the same job directory.
	pub fn to_file(path: &Path) -> Result<JobSink> {
		let file = OpenOptions::new()
			.create(true)
			.write(true)
			.truncate(true)
			.open(path)
			.with_context(|| format!("cannot open job log {path:?}"))?;
		Ok(JobSink {
			file: Some(Mutex::new(file)),
		})
	}

	pub fn line(&self, message: impl AsRef<str>) {
		let message = message.as_ref();
		log::info!("{message}");
		if let Some(file) = &self.file {
			let mut file = file.lock().unwrap();
			// a failing progress line must not fail the job
			let _ = writeln!(file, "{message}");
			let _ = file.flush();
		}
	}

	pub fn warn(&self, message: impl AsRef<str>) {
		let message = message.as_ref();
		log::warn!("{message}");
		if let Some(file) = &self.file {
			let mut file = file.lock().unwrap();
			let _ = writeln!(file, "WARNING: {message}");
			let _ = file.flush();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn writes_lines_to_the_log_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("runtime.log");
		let sink = JobSink::to_file(&path).unwrap();
		sink.line("Engine starting...");
		sink.line("Total scenes found: 12");
		sink.warn("no scene fully contains the requested area");

		let content = std::fs::read_to_string(&path).unwrap();
		assert_eq!(
			content,
			"Engine starting...\nTotal scenes found: 12\nWARNING: no scene fully contains the requested area\n"
		);
	}

	#[test]
	fn truncates_previous_runs() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("runtime.log");
		std::fs::write(&path, "stale\n").unwrap();
		let sink = JobSink::to_file(&path).unwrap();
		sink.line("fresh");
		assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh\n");
	}

	#[test]
	fn discard_sink_never_fails() {
		JobSink::discard().line("nothing to see");
	}
}
