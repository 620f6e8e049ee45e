// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for crash capture.

use thiserror::Error;

use crate::sink::SinkError;

/// Result type alias for crash capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Errors that can occur while capturing, storing or dispatching reports.
#[derive(Debug, Error)]
pub enum CaptureError {
	/// Filesystem access failed.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// No stored report exists for the identifier.
	#[error("crash report not found: {0}")]
	NotFound(String),

	/// A string did not have the `crash-<millis>.trace` shape.
	#[error("invalid crash report identifier: {0}")]
	InvalidReportId(String),

	/// Rendering the fault produced no text at all.
	#[error("fault rendered an empty trace")]
	EmptyTrace,

	/// A stored report could not be parsed.
	#[error("malformed report at line {line}: {message}")]
	Format {
		/// 1-based line number in the report file.
		line: usize,
		/// What was wrong with the line.
		message: String,
	},

	/// The sink rejected a report.
	#[error("sink error: {0}")]
	Sink(#[from] SinkError),

	/// The interceptor was built without a report store.
	#[error("a report store is required")]
	MissingStore,

	/// Capture was requested while this thread was already handling a fault.
	#[error("already handling a fault on this thread")]
	Reentrant,

	/// The interceptor was built without a report sink.
	#[error("a report sink is required")]
	MissingSink,
}
