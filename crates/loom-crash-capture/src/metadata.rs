// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment metadata attached to every report.

use thiserror::Error;

/// Key for the application version name.
pub const VERSION_NAME_KEY: &str = "versionName";
/// Key for the application version code.
pub const VERSION_CODE_KEY: &str = "versionCode";
/// Substituted when an identity value is unknown.
pub const NOT_SET: &str = "not set";

const SDK_NAME: &str = "loom-crash-capture";
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Failure to read a single metadata field.
#[derive(Debug, Error)]
pub enum MetadataError {
	#[error("field unavailable: {0}")]
	Unavailable(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

/// One collected field. A failed field is skipped, never fatal.
#[derive(Debug)]
pub struct MetadataField {
	pub key: String,
	pub value: Result<String, MetadataError>,
}

impl MetadataField {
	pub fn ok(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			value: Ok(value.into()),
		}
	}

	pub fn failed(key: impl Into<String>, error: MetadataError) -> Self {
		Self {
			key: key.into(),
			value: Err(error),
		}
	}
}

/// Source of platform and environment key/value pairs.
pub trait MetadataProvider: Send + Sync {
	fn collect(&self) -> Vec<MetadataField>;
}

/// Provider that contributes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetadata;

impl MetadataProvider for NoMetadata {
	fn collect(&self) -> Vec<MetadataField> {
		Vec::new()
	}
}

/// The fixed set of platform fields collected by default.
///
/// | key | value |
/// |---|---|
/// | `os.name` | `std::env::consts::OS` |
/// | `os.family` | `std::env::consts::FAMILY` |
/// | `os.arch` | `std::env::consts::ARCH` |
/// | `host.name` | system hostname |
/// | `process.id` | current pid |
/// | `process.exe` | path of the running executable |
/// | `process.user` | `$USER` or `$USERNAME` |
/// | `sdk.name` | `loom-crash-capture` |
/// | `sdk.version` | this crate's version |
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformMetadata;

impl MetadataProvider for PlatformMetadata {
	fn collect(&self) -> Vec<MetadataField> {
		vec![
			MetadataField::ok("os.name", std::env::consts::OS),
			MetadataField::ok("os.family", std::env::consts::FAMILY),
			MetadataField::ok("os.arch", std::env::consts::ARCH),
			match hostname::get() {
				Ok(h) => MetadataField::ok("host.name", h.to_string_lossy()),
				Err(e) => MetadataField::failed("host.name", e.into()),
			},
			MetadataField::ok("process.id", std::process::id().to_string()),
			match std::env::current_exe() {
				Ok(path) => MetadataField::ok("process.exe", path.display().to_string()),
				Err(e) => MetadataField::failed("process.exe", e.into()),
			},
			match std::env::var("USER").or_else(|_| std::env::var("USERNAME")) {
				Ok(user) => MetadataField::ok("process.user", user),
				Err(_) => MetadataField::failed(
					"process.user",
					MetadataError::Unavailable("neither USER nor USERNAME is set".to_string()),
				),
			},
			MetadataField::ok("sdk.name", SDK_NAME),
			MetadataField::ok("sdk.version", SDK_VERSION),
		]
	}
}

/// Version identity of the host application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppIdentity {
	pub version_name: Option<String>,
	pub version_code: Option<String>,
}

impl AppIdentity {
	pub fn new(version_name: impl Into<String>, version_code: impl Into<String>) -> Self {
		Self {
			version_name: Some(version_name.into()),
			version_code: Some(version_code.into()),
		}
	}

	/// Identity fields in stored order, with [`NOT_SET`] for unknown values.
	pub fn fields(&self) -> [(String, String); 2] {
		let or_not_set = |v: &Option<String>| {
			v.as_deref()
				.filter(|s| !s.trim().is_empty())
				.unwrap_or(NOT_SET)
				.to_string()
		};
		[
			(VERSION_NAME_KEY.to_string(), or_not_set(&self.version_name)),
			(VERSION_CODE_KEY.to_string(), or_not_set(&self.version_code)),
		]
	}
}

/// Builds an [`AppIdentity`] from the calling crate's Cargo metadata.
///
/// `versionName` is the package version. `versionCode` is read from the
/// `LOOM_BUILD_CODE` variable at compile time and is left unset without it.
#[macro_export]
macro_rules! app_identity {
	() => {
		$crate::AppIdentity {
			version_name: Some(env!("CARGO_PKG_VERSION").to_string()),
			version_code: option_env!("LOOM_BUILD_CODE").map(|code| code.to_string()),
		}
	};
}
