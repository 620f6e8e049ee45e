// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Destinations that stored reports are handed to.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error};

/// Failure to hand a report to its destination.
#[derive(Debug, Error)]
pub enum SinkError {
	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Server returned a non-success status.
	#[error("server error (status {status}): {message}")]
	ServerError {
		/// HTTP status code.
		status: u16,
		/// Response body.
		message: String,
	},

	/// Writing to a local destination failed.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// The sink was configured with an invalid URL.
	#[error("invalid base URL")]
	InvalidBaseUrl,

	/// The destination refused the report for its own reasons.
	#[error("report rejected: {0}")]
	Rejected(String),
}

/// Accepts one serialized report at a time.
///
/// Only success or failure matters to the caller: a report is deleted after a
/// successful hand-off and kept for the next flush otherwise.
pub trait ReportSink: Send + Sync {
	fn send(&self, report: &[u8], suggested_filename: &str) -> Result<(), SinkError>;
}

/// Default timeout for report uploads.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Uploads reports with a blocking `POST <base_url>/api/crash/reports`.
///
/// Uses the blocking client, so it must not be called from inside an async
/// runtime worker. Panic hooks and `flush_all` at process start are fine.
pub struct HttpReportSink {
	endpoint: String,
	auth_token: Option<String>,
	client: reqwest::blocking::Client,
}

impl HttpReportSink {
	pub fn builder() -> HttpReportSinkBuilder {
		HttpReportSinkBuilder::new()
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}
}

impl ReportSink for HttpReportSink {
	fn send(&self, report: &[u8], suggested_filename: &str) -> Result<(), SinkError> {
		debug!(url = %self.endpoint, file = suggested_filename, "uploading crash report");

		let mut request = self
			.client
			.post(&self.endpoint)
			.header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
			.header("X-Report-Filename", suggested_filename)
			.body(report.to_vec());

		if let Some(token) = &self.auth_token {
			request = request.header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"));
		}

		let response = request.send()?;

		if response.status().is_success() {
			debug!(file = suggested_filename, "crash report uploaded");
			Ok(())
		} else {
			let status = response.status().as_u16();
			let message = response.text().unwrap_or_default();
			error!(status, message = %message, "failed to upload crash report");
			Err(SinkError::ServerError { status, message })
		}
	}
}

/// Builder for constructing an [`HttpReportSink`].
pub struct HttpReportSinkBuilder {
	base_url: Option<String>,
	auth_token: Option<String>,
	timeout: Duration,
}

impl HttpReportSinkBuilder {
	pub fn new() -> Self {
		Self {
			base_url: None,
			auth_token: None,
			timeout: DEFAULT_TIMEOUT,
		}
	}

	/// Sets the server base URL, e.g. `https://loom.example.com`.
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());
		self
	}

	/// Sets the bearer token sent with every upload.
	pub fn auth_token(mut self, token: impl Into<String>) -> Self {
		self.auth_token = Some(token.into());
		self
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn build(self) -> Result<HttpReportSink, SinkError> {
		let base_url = self
			.base_url
			.map(|u| u.trim_end_matches('/').to_string())
			.filter(|u| u.starts_with("http://") || u.starts_with("https://"))
			.ok_or(SinkError::InvalidBaseUrl)?;

		let client = reqwest::blocking::Client::builder()
			.timeout(self.timeout)
			.build()?;

		Ok(HttpReportSink {
			endpoint: format!("{base_url}/api/crash/reports"),
			auth_token: self.auth_token,
			client,
		})
	}
}

impl Default for HttpReportSinkBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Copies reports into an outbox directory for another process to pick up.
pub struct DirectorySink {
	outbox: PathBuf,
}

impl DirectorySink {
	pub fn new(outbox: impl Into<PathBuf>) -> Self {
		Self {
			outbox: outbox.into(),
		}
	}
}

impl ReportSink for DirectorySink {
	fn send(&self, report: &[u8], suggested_filename: &str) -> Result<(), SinkError> {
		let name = std::path::Path::new(suggested_filename)
			.file_name()
			.ok_or_else(|| SinkError::Rejected(format!("unusable file name: {suggested_filename}")))?;

		fs::create_dir_all(&self.outbox)?;
		let path = self.outbox.join(name);
		fs::write(&path, report)?;

		debug!(path = %path.display(), "copied crash report to outbox");
		Ok(())
	}
}
