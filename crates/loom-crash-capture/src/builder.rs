// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Turns a fault into a [`CrashReport`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{CaptureError, Result};
use crate::fault::{render_cause, Fault};
use crate::metadata::{AppIdentity, MetadataProvider};
use crate::report::{CrashReport, STACK_TRACE_KEY};

/// Default bound on the number of causes rendered.
pub const DEFAULT_MAX_CAUSE_DEPTH: usize = 32;

/// Default cap on the rendered trace size.
pub const DEFAULT_MAX_TRACE_BYTES: usize = 200_000;

const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Assembles reports from faults and collected metadata.
#[derive(Clone)]
pub struct ReportBuilder {
	metadata: Arc<dyn MetadataProvider>,
	identity: AppIdentity,
	max_cause_depth: usize,
	max_trace_bytes: usize,
}

impl ReportBuilder {
	pub fn new(metadata: Arc<dyn MetadataProvider>, identity: AppIdentity) -> Self {
		Self {
			metadata,
			identity,
			max_cause_depth: DEFAULT_MAX_CAUSE_DEPTH,
			max_trace_bytes: DEFAULT_MAX_TRACE_BYTES,
		}
	}

	pub fn max_cause_depth(mut self, depth: usize) -> Self {
		self.max_cause_depth = depth;
		self
	}

	pub fn max_trace_bytes(mut self, bytes: usize) -> Self {
		self.max_trace_bytes = bytes;
		self
	}

	/// Builds a report. Fails only when the fault renders to no text.
	pub fn build(&self, fault: &Fault<'_>) -> Result<CrashReport> {
		let stack_trace = self.render_trace(fault)?;

		let mut report = CrashReport::new(stack_trace);
		report.metadata.extend(self.identity.fields());

		for field in self.metadata.collect() {
			if field.key == STACK_TRACE_KEY {
				warn!(key = %field.key, "skipping metadata field with reserved key");
				continue;
			}
			match field.value {
				Ok(value) => report.metadata.push((field.key, value)),
				Err(e) => {
					warn!(key = %field.key, error = %e, "skipping metadata field");
				}
			}
		}

		debug!(
			timestamp_millis = report.timestamp_millis,
			metadata_fields = report.metadata.len(),
			trace_bytes = report.stack_trace.len(),
			"built crash report"
		);

		Ok(report)
	}

	/// Renders the fault followed by each cause, outermost first.
	///
	/// Iteration stops after `max_cause_depth` causes, so a cyclic `source()`
	/// chain cannot loop forever.
	pub fn render_trace(&self, fault: &Fault<'_>) -> Result<String> {
		let mut segments = vec![fault.render_head()];

		let mut cause = fault.source;
		let mut depth = 0;
		while let Some(current) = cause {
			if depth == self.max_cause_depth {
				warn!(max_cause_depth = self.max_cause_depth, "cause chain truncated");
				break;
			}
			segments.push(render_cause(current));
			cause = current.source();
			depth += 1;
		}

		let trace = segments.join("\n");
		if trace.trim().is_empty() {
			return Err(CaptureError::EmptyTrace);
		}

		Ok(truncate(trace, self.max_trace_bytes))
	}
}

fn truncate(mut trace: String, max_bytes: usize) -> String {
	if trace.len() <= max_bytes {
		return trace;
	}
	let mut cut = max_bytes;
	while !trace.is_char_boundary(cut) {
		cut -= 1;
	}
	trace.truncate(cut);
	trace.push_str(TRUNCATION_MARKER);
	trace
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fault::CAUSE_PREFIX;
	use crate::metadata::{MetadataError, MetadataField, NoMetadata, NOT_SET};
	use std::error::Error;
	use std::fmt;

	/// Error with an optional boxed cause, for building chains of any depth.
	#[derive(Debug)]
	struct Chain {
		name: String,
		cause: Option<Box<Chain>>,
	}

	impl Chain {
		fn of_depth(depth: usize) -> Chain {
			let mut chain = Chain {
				name: format!("cause-{depth}"),
				cause: None,
			};
			for level in (0..depth).rev() {
				chain = Chain {
					name: format!("cause-{level}"),
					cause: Some(Box::new(chain)),
				};
			}
			chain
		}
	}

	impl fmt::Display for Chain {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			f.write_str(&self.name)
		}
	}

	impl Error for Chain {
		fn source(&self) -> Option<&(dyn Error + 'static)> {
			self.cause.as_deref().map(|c| c as &(dyn Error + 'static))
		}
	}

	/// An error whose source is itself.
	#[derive(Debug)]
	struct Cyclic;

	impl fmt::Display for Cyclic {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			f.write_str("cyclic")
		}
	}

	impl Error for Cyclic {
		fn source(&self) -> Option<&(dyn Error + 'static)> {
			static SELF: Cyclic = Cyclic;
			Some(&SELF)
		}
	}

	struct Flaky;

	impl MetadataProvider for Flaky {
		fn collect(&self) -> Vec<MetadataField> {
			vec![
				MetadataField::ok("a", "1"),
				MetadataField::failed("b", MetadataError::Unavailable("nope".into())),
				MetadataField::ok("c", "3"),
			]
		}
	}

	fn builder() -> ReportBuilder {
		ReportBuilder::new(Arc::new(NoMetadata), AppIdentity::new("1.0.0", "42"))
	}

	fn segments(trace: &str) -> usize {
		trace.matches(CAUSE_PREFIX).count() + 1
	}

	#[test]
	fn test_fault_without_cause_has_one_segment() {
		let trace = builder().render_trace(&Fault::new("panic", "boom")).unwrap();
		assert_eq!(trace, "panic: boom");
		assert_eq!(segments(&trace), 1);
	}

	#[test]
	fn test_cause_chain_outermost_first() {
		let chain = Chain::of_depth(3);
		let fault = Fault::from_error(&chain);
		let trace = builder().render_trace(&fault).unwrap();

		assert_eq!(segments(&trace), 4);
		let lines: Vec<&str> = trace.lines().filter(|l| l.starts_with(CAUSE_PREFIX)).collect();
		assert_eq!(
			lines,
			vec!["Caused by: cause-1", "Caused by: cause-2", "Caused by: cause-3"]
		);
	}

	#[test]
	fn test_cyclic_chain_is_bounded() {
		let trace = builder()
			.max_cause_depth(5)
			.render_trace(&Fault::from_error(&Cyclic))
			.unwrap();
		assert_eq!(segments(&trace), 6);
	}

	#[test]
	fn test_empty_fault_is_rejected() {
		let result = builder().build(&Fault::default());
		assert!(matches!(result, Err(CaptureError::EmptyTrace)));
	}

	#[test]
	fn test_failed_metadata_fields_are_skipped() {
		let report = ReportBuilder::new(Arc::new(Flaky), AppIdentity::default())
			.build(&Fault::new("panic", "boom"))
			.unwrap();
		let keys: Vec<&str> = report.metadata.iter().map(|(k, _)| k.as_str()).collect();
		assert_eq!(keys, vec!["versionName", "versionCode", "a", "c"]);
		assert_eq!(report.metadata_value("versionName"), Some(NOT_SET));
	}

	#[test]
	fn test_reserved_trace_key_is_not_metadata() {
		struct Clashing;

		impl MetadataProvider for Clashing {
			fn collect(&self) -> Vec<MetadataField> {
				vec![
					MetadataField::ok("STACK_TRACE", "impostor"),
					MetadataField::ok("os.name", "linux"),
				]
			}
		}

		let report = ReportBuilder::new(Arc::new(Clashing), AppIdentity::default())
			.build(&Fault::new("panic", "boom"))
			.unwrap();
		let keys: Vec<&str> = report.metadata.iter().map(|(k, _)| k.as_str()).collect();
		assert_eq!(keys, vec!["versionName", "versionCode", "os.name"]);

		let decoded =
			crate::format::decode_report(&crate::format::encode_report(&report), 1).unwrap();
		assert_eq!(decoded.stack_trace, "panic: boom");
		assert_eq!(decoded.metadata, report.metadata);
	}

	#[test]
	fn test_empty_provider_keeps_identity_only() {
		let report = builder().build(&Fault::new("panic", "boom")).unwrap();
		assert_eq!(
			report.metadata,
			vec![
				("versionName".to_string(), "1.0.0".to_string()),
				("versionCode".to_string(), "42".to_string()),
			]
		);
	}

	#[test]
	fn test_trace_is_truncated_on_char_boundary() {
		let fault = Fault::new("panic", "é".repeat(10));
		let trace = builder().max_trace_bytes(12).render_trace(&fault).unwrap();
		assert!(trace.ends_with(TRUNCATION_MARKER));
		assert!(trace.len() <= 12 + TRUNCATION_MARKER.len());
	}
}
