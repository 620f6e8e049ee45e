// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration: defaults, TOML file, environment.
//!
//! Environment convention: `LOOM_CRASH_<FIELD>`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::builder::{DEFAULT_MAX_CAUSE_DEPTH, DEFAULT_MAX_TRACE_BYTES};
use crate::interceptor::DEFAULT_NOTICE_PREFIX;
use crate::store::default_reports_dir;
use crate::terminator::{DEFAULT_EXIT_CODE, DEFAULT_GRACE_PERIOD};

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("could not determine a report directory; set LOOM_CRASH_REPORT_DIR")]
	NoReportDir,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CrashConfigLayer {
	pub report_dir: Option<PathBuf>,
	pub grace_period_ms: Option<u64>,
	pub exit_code: Option<i32>,
	pub flush_on_fault: Option<bool>,
	pub max_cause_depth: Option<usize>,
	pub max_trace_bytes: Option<usize>,
	pub notice_prefix: Option<String>,
}

impl CrashConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.report_dir.is_some() {
			self.report_dir = other.report_dir;
		}
		if other.grace_period_ms.is_some() {
			self.grace_period_ms = other.grace_period_ms;
		}
		if other.exit_code.is_some() {
			self.exit_code = other.exit_code;
		}
		if other.flush_on_fault.is_some() {
			self.flush_on_fault = other.flush_on_fault;
		}
		if other.max_cause_depth.is_some() {
			self.max_cause_depth = other.max_cause_depth;
		}
		if other.max_trace_bytes.is_some() {
			self.max_trace_bytes = other.max_trace_bytes;
		}
		if other.notice_prefix.is_some() {
			self.notice_prefix = other.notice_prefix;
		}
	}

	pub fn finalize(self) -> Result<CrashConfig, ConfigError> {
		let report_dir = self
			.report_dir
			.or_else(default_reports_dir)
			.ok_or(ConfigError::NoReportDir)?;

		let exit_code = self.exit_code.unwrap_or(DEFAULT_EXIT_CODE);
		if exit_code == 0 {
			return Err(ConfigError::InvalidValue {
				key: "exit_code".to_string(),
				message: "must be non-zero".to_string(),
			});
		}

		Ok(CrashConfig {
			report_dir,
			grace_period_ms: self
				.grace_period_ms
				.unwrap_or(DEFAULT_GRACE_PERIOD.as_millis() as u64),
			exit_code,
			flush_on_fault: self.flush_on_fault.unwrap_or(true),
			max_cause_depth: self.max_cause_depth.unwrap_or(DEFAULT_MAX_CAUSE_DEPTH),
			max_trace_bytes: self.max_trace_bytes.unwrap_or(DEFAULT_MAX_TRACE_BYTES),
			notice_prefix: self
				.notice_prefix
				.unwrap_or_else(|| DEFAULT_NOTICE_PREFIX.to_string()),
		})
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrashConfig {
	pub report_dir: PathBuf,
	pub grace_period_ms: u64,
	pub exit_code: i32,
	pub flush_on_fault: bool,
	pub max_cause_depth: usize,
	pub max_trace_bytes: usize,
	pub notice_prefix: String,
}

impl CrashConfig {
	pub fn grace_period(&self) -> Duration {
		Duration::from_millis(self.grace_period_ms)
	}
}

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<CrashConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<CrashConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(CrashConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `$XDG_CONFIG_HOME/loom/crash.toml`, when a config directory exists.
	pub fn user() -> Option<Self> {
		dirs::config_dir().map(|d| Self::new(d.join("loom").join("crash.toml")))
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<CrashConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(CrashConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: CrashConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<CrashConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(CrashConfigLayer {
			report_dir: env_var("LOOM_CRASH_REPORT_DIR").map(PathBuf::from),
			grace_period_ms: env_parse("LOOM_CRASH_GRACE_PERIOD_MS")?,
			exit_code: env_parse("LOOM_CRASH_EXIT_CODE")?,
			flush_on_fault: env_bool("LOOM_CRASH_FLUSH_ON_FAULT")?,
			max_cause_depth: env_parse("LOOM_CRASH_MAX_CAUSE_DEPTH")?,
			max_trace_bytes: env_parse("LOOM_CRASH_MAX_TRACE_BYTES")?,
			notice_prefix: std::env::var("LOOM_CRASH_NOTICE_PREFIX").ok(),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Result<Option<bool>, ConfigError> {
	match env_var(name) {
		Some(v) => parse_bool(&v).map(Some).ok_or_else(|| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid boolean '{v}'"),
		}),
		None => Ok(None),
	}
}

fn parse_bool(value: &str) -> Option<bool> {
	match value.trim().to_ascii_lowercase().as_str() {
		"true" | "1" | "yes" | "on" => Some(true),
		"false" | "0" | "no" | "off" => Some(false),
		_ => None,
	}
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid value '{v}'"),
		}),
		None => Ok(None),
	}
}

/// Merges sources in precedence order and finalizes the result.
pub fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<CrashConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut layer = CrashConfigLayer::default();
	for source in &sources {
		debug!(source = source.name(), "applying config source");
		layer.merge(source.load()?);
	}

	layer.finalize()
}

/// Loads configuration from defaults, a TOML file and the environment.
///
/// `path` overrides the default `$XDG_CONFIG_HOME/loom/crash.toml`.
pub fn load_config(path: Option<&Path>) -> Result<CrashConfig, ConfigError> {
	let mut sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(DefaultsSource)];
	match path {
		Some(path) => sources.push(Box::new(TomlSource::new(path))),
		None => {
			if let Some(user) = TomlSource::user() {
				sources.push(Box::new(user));
			}
		}
	}
	sources.push(Box::new(EnvSource));

	load_from_sources(sources)
}
