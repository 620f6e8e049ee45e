// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Faults and their rendering into trace text.

use std::backtrace::Backtrace;
use std::error::Error;
use std::panic::PanicHookInfo;

/// Introduces every cause segment in a rendered trace.
pub const CAUSE_PREFIX: &str = "Caused by: ";

/// Error type boxed into a panic payload by `std::panic::panic_any`.
pub type BoxedError = Box<dyn Error + Send + Sync + 'static>;

/// A fault as seen by the pipeline.
///
/// Borrowing the cause keeps `Fault` constructible inside a panic hook without
/// taking ownership of the payload.
#[derive(Debug, Default)]
pub struct Fault<'a> {
	pub kind: String,
	pub message: String,
	pub location: Option<String>,
	pub thread_name: Option<String>,
	pub backtrace: Option<String>,
	pub source: Option<&'a (dyn Error + 'static)>,
}

impl<'a> Fault<'a> {
	pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			message: message.into(),
			..Default::default()
		}
	}

	/// Builds a fault from panic hook information, forcing a backtrace capture.
	///
	/// Payloads of `&str` and `String` become the message. A payload that is
	/// itself a boxed error contributes its `source()` chain as causes.
	pub fn from_panic(info: &'a PanicHookInfo<'_>) -> Self {
		let payload = info.payload();
		let (message, source) = if let Some(s) = payload.downcast_ref::<&str>() {
			((*s).to_string(), None)
		} else if let Some(s) = payload.downcast_ref::<String>() {
			(s.clone(), None)
		} else if let Some(err) = payload.downcast_ref::<BoxedError>() {
			let source: Option<&'a (dyn Error + 'static)> = err.source();
			(err.to_string(), source)
		} else {
			("unknown panic payload".to_string(), None)
		};

		Self {
			kind: "panic".to_string(),
			message,
			location: info
				.location()
				.map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column())),
			thread_name: Some(current_thread_label()),
			backtrace: Some(Backtrace::force_capture().to_string()),
			source,
		}
	}

	/// Builds a fault from an error value; its `source()` chain becomes the
	/// cause chain.
	pub fn from_error<E: Error + ?Sized + 'static>(error: &'a E) -> Self {
		Self {
			kind: short_type_name(std::any::type_name::<E>()),
			message: error.to_string(),
			location: None,
			thread_name: Some(current_thread_label()),
			backtrace: None,
			source: error.source(),
		}
	}

	pub fn with_backtrace(mut self, backtrace: impl Into<String>) -> Self {
		self.backtrace = Some(backtrace.into());
		self
	}

	pub fn with_location(mut self, location: impl Into<String>) -> Self {
		self.location = Some(location.into());
		self
	}

	pub fn with_source(mut self, source: &'a (dyn Error + 'static)) -> Self {
		self.source = Some(source);
		self
	}

	/// Text shown to the user by the notifier.
	pub fn summary(&self) -> &str {
		&self.message
	}

	/// Renders this fault's own segment, without causes.
	pub fn render_head(&self) -> String {
		let mut out = String::new();
		match (self.kind.is_empty(), self.message.is_empty()) {
			(false, false) => out.push_str(&format!("{}: {}", self.kind, self.message)),
			(false, true) => out.push_str(&self.kind),
			(true, false) => out.push_str(&self.message),
			(true, true) => {}
		}
		if let Some(location) = &self.location {
			push_line(&mut out, &format!("  at {location}"));
		}
		if let Some(thread) = &self.thread_name {
			push_line(&mut out, &format!("  on thread '{thread}'"));
		}
		if let Some(backtrace) = self.backtrace.as_deref().filter(|b| !b.trim().is_empty()) {
			push_line(&mut out, "stack backtrace:");
			push_line(&mut out, backtrace.trim_end());
		}
		out
	}
}

fn push_line(out: &mut String, line: &str) {
	if !out.is_empty() {
		out.push('\n');
	}
	out.push_str(line);
}

/// Renders one cause segment.
pub fn render_cause(cause: &(dyn Error + 'static)) -> String {
	format!("{CAUSE_PREFIX}{cause}")
}

fn current_thread_label() -> String {
	let thread = std::thread::current();
	match thread.name() {
		Some(name) => name.to_string(),
		None => format!("{:?}", thread.id()),
	}
}

/// `std::io::error::Error` -> `Error`; generic arguments are kept.
fn short_type_name(full: &str) -> String {
	let base = full.split('<').next().unwrap_or(full);
	let short = base.rsplit("::").next().unwrap_or(base);
	format!("{short}{}", &full[base.len()..])
}
