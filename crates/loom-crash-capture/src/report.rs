// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash report and report identifier types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::CaptureError;

/// Key under which the rendered fault chain is stored.
pub const STACK_TRACE_KEY: &str = "STACK_TRACE";

/// Prefix of every report file name.
pub const REPORT_PREFIX: &str = "crash-";

/// Extension marking a file as a crash report.
pub const REPORT_EXTENSION: &str = ".trace";

/// A captured fault, ready to be persisted.
///
/// Metadata keeps insertion order so stored files read top to bottom the way
/// they were collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
	pub timestamp_millis: i64,
	pub stack_trace: String,
	pub metadata: Vec<(String, String)>,
}

impl CrashReport {
	pub fn new(stack_trace: impl Into<String>) -> Self {
		Self {
			timestamp_millis: Utc::now().timestamp_millis(),
			stack_trace: stack_trace.into(),
			metadata: Vec::new(),
		}
	}

	/// Looks up a metadata value by key.
	pub fn metadata_value(&self, key: &str) -> Option<&str> {
		self
			.metadata
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v.as_str())
	}

	pub fn created_at(&self) -> Option<DateTime<Utc>> {
		DateTime::from_timestamp_millis(self.timestamp_millis)
	}
}

/// Identifier of a stored report: `crash-<millis>.trace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReportId(i64);

impl ReportId {
	pub fn from_timestamp(timestamp_millis: i64) -> Self {
		Self(timestamp_millis)
	}

	pub fn timestamp_millis(&self) -> i64 {
		self.0
	}

	/// The on-disk file name.
	pub fn file_name(&self) -> String {
		format!("{REPORT_PREFIX}{}{REPORT_EXTENSION}", self.0)
	}

	/// The file name in URL-safe form, used when handing the id to callers.
	pub fn encoded(&self) -> String {
		urlencoding::encode(&self.file_name()).into_owned()
	}
}

impl fmt::Display for ReportId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.encoded())
	}
}

impl FromStr for ReportId {
	type Err = CaptureError;

	/// Accepts a bare or URL-encoded file name. Anything else is rejected, so
	/// an id can never point outside the report directory.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let decoded =
			urlencoding::decode(s).map_err(|_| CaptureError::InvalidReportId(s.to_string()))?;

		let millis = decoded
			.strip_prefix(REPORT_PREFIX)
			.and_then(|rest| rest.strip_suffix(REPORT_EXTENSION))
			.filter(|digits| is_canonical_digits(digits))
			.and_then(|digits| digits.parse::<i64>().ok())
			.ok_or_else(|| CaptureError::InvalidReportId(s.to_string()))?;

		Ok(Self(millis))
	}
}

/// Digits as `file_name` writes them: no sign, no leading zeros.
fn is_canonical_digits(digits: &str) -> bool {
	!digits.is_empty()
		&& digits.bytes().all(|b| b.is_ascii_digit())
		&& (digits == "0" || !digits.starts_with('0'))
}
