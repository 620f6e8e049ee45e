// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable storage of crash reports.
//!
//! Everything here is blocking on purpose: `save` runs inside a panic hook
//! and must be on disk before the process is killed.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{CaptureError, Result};
use crate::format::{decode_report, encode_report};
use crate::report::{CrashReport, ReportId, REPORT_EXTENSION};

const TMP_SUFFIX: &str = ".tmp";

pub trait ReportStore: Send + Sync {
	/// Persists a report and returns its identifier. The data is flushed to
	/// disk before this returns.
	fn save(&self, report: &CrashReport) -> Result<ReportId>;

	/// Identifiers of every stored report, oldest first.
	fn list_pending(&self) -> Result<Vec<ReportId>>;

	/// Raw bytes of a stored report.
	fn load(&self, id: &ReportId) -> Result<Vec<u8>>;

	fn delete(&self, id: &ReportId) -> Result<()>;

	/// Parses a stored report.
	fn read_report(&self, id: &ReportId) -> Result<CrashReport> {
		let bytes = self.load(id)?;
		let text = String::from_utf8_lossy(&bytes);
		decode_report(&text, id.timestamp_millis())
	}
}

/// Report store backed by one directory of `crash-<millis>.trace` files.
pub struct FileReportStore {
	reports_dir: PathBuf,
}

impl FileReportStore {
	pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
		Self {
			reports_dir: reports_dir.into(),
		}
	}

	/// Store under `$XDG_DATA_HOME/loom/crash-reports`.
	pub fn from_xdg() -> Result<Self> {
		let reports_dir = default_reports_dir().ok_or_else(|| {
			CaptureError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				"could not determine XDG data directory",
			))
		})?;

		fs::create_dir_all(&reports_dir)?;

		info!(
			reports_dir = %reports_dir.display(),
			"initialized local crash report store"
		);

		Ok(Self::new(reports_dir))
	}

	pub fn reports_dir(&self) -> &Path {
		&self.reports_dir
	}

	fn report_path(&self, id: &ReportId) -> PathBuf {
		self.reports_dir.join(id.file_name())
	}

	/// First free id at or after `timestamp_millis`.
	fn free_id(&self, timestamp_millis: i64) -> ReportId {
		let mut id = ReportId::from_timestamp(timestamp_millis);
		while self.report_path(&id).exists() {
			id = ReportId::from_timestamp(id.timestamp_millis() + 1);
		}
		id
	}
}

/// Default report directory, if the platform has a data directory.
pub fn default_reports_dir() -> Option<PathBuf> {
	dirs::data_dir().map(|d| d.join("loom").join("crash-reports"))
}

impl ReportStore for FileReportStore {
	fn save(&self, report: &CrashReport) -> Result<ReportId> {
		fs::create_dir_all(&self.reports_dir)?;

		let id = self.free_id(report.timestamp_millis);
		if id.timestamp_millis() != report.timestamp_millis {
			debug!(
				requested = report.timestamp_millis,
				assigned = id.timestamp_millis(),
				"report timestamp already taken"
			);
		}

		let path = self.report_path(&id);
		let tmp_path = self
			.reports_dir
			.join(format!("{}{TMP_SUFFIX}", id.file_name()));

		let contents = encode_report(report);
		write_file_sync(&tmp_path, contents.as_bytes())?;
		if let Err(e) = fs::rename(&tmp_path, &path) {
			let _ = fs::remove_file(&tmp_path);
			return Err(e.into());
		}

		debug!(
			report_id = %id,
			path = %path.display(),
			bytes = contents.len(),
			"saved crash report to disk"
		);

		Ok(id)
	}

	fn list_pending(&self) -> Result<Vec<ReportId>> {
		if !self.reports_dir.exists() {
			return Ok(Vec::new());
		}

		let mut ids = Vec::new();
		for entry in fs::read_dir(&self.reports_dir)? {
			let entry = match entry {
				Ok(entry) => entry,
				Err(e) => {
					warn!(error = %e, "failed to read report directory entry");
					continue;
				}
			};

			let name = entry.file_name();
			let Some(name) = name.to_str() else {
				continue;
			};
			if !name.ends_with(REPORT_EXTENSION) {
				continue;
			}

			match name.parse::<ReportId>() {
				Ok(id) => ids.push(id),
				Err(_) => debug!(file = name, "ignoring foreign file in report directory"),
			}
		}

		ids.sort();

		debug!(count = ids.len(), "listed pending crash reports");

		Ok(ids)
	}

	fn load(&self, id: &ReportId) -> Result<Vec<u8>> {
		let path = self.report_path(id);
		match fs::read(&path) {
			Ok(bytes) => Ok(bytes),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				Err(CaptureError::NotFound(id.to_string()))
			}
			Err(e) => Err(e.into()),
		}
	}

	fn delete(&self, id: &ReportId) -> Result<()> {
		let path = self.report_path(id);

		match fs::remove_file(&path) {
			Ok(()) => {
				info!(report_id = %id, "deleted crash report");
				Ok(())
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				Err(CaptureError::NotFound(id.to_string()))
			}
			Err(e) => Err(e.into()),
		}
	}
}

fn write_file_sync(path: &Path, data: &[u8]) -> std::io::Result<()> {
	let mut f = fs::OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(true)
		.open(path)?;
	f.write_all(data)?;
	f.flush()?;
	f.sync_all()?;

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		let _ = f.set_permissions(fs::Permissions::from_mode(0o600));
	}

	Ok(())
}
