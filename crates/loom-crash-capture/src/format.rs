// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Text format of stored reports.
//!
//! One `key=value` record per line, `#` lines are comments. Line breaks,
//! tabs, backslashes and the separators are escaped, so every record stays on
//! a single line whatever the trace contains.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{CaptureError, Result};
use crate::report::{CrashReport, STACK_TRACE_KEY};

const HEADER: &str = "#loom crash report";

/// Serializes a report: metadata in insertion order, then the trace.
pub fn encode_report(report: &CrashReport) -> String {
	let mut out = String::with_capacity(report.stack_trace.len() + 256);
	out.push_str(HEADER);
	out.push('\n');
	if let Some(created) = DateTime::<Utc>::from_timestamp_millis(report.timestamp_millis) {
		let _ = writeln!(out, "#{}", created.to_rfc3339_opts(SecondsFormat::Millis, true));
	}

	for (key, value) in &report.metadata {
		write_record(&mut out, key, value);
	}
	write_record(&mut out, STACK_TRACE_KEY, &report.stack_trace);

	out
}

/// Parses a stored report. The creation time comes from the file name, not
/// the body.
pub fn decode_report(text: &str, timestamp_millis: i64) -> Result<CrashReport> {
	let mut stack_trace = None;
	let mut metadata = Vec::new();

	for (idx, raw) in text.lines().enumerate() {
		// Only plain spaces are insignificant; other leading whitespace is data.
		let line = raw.trim_start_matches(' ');
		if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
			continue;
		}

		let (key, value) = split_record(line).map_err(|message| CaptureError::Format {
			line: idx + 1,
			message,
		})?;

		if key == STACK_TRACE_KEY {
			stack_trace = Some(value);
		} else {
			metadata.push((key, value));
		}
	}

	let stack_trace = stack_trace.ok_or_else(|| CaptureError::Format {
		line: 0,
		message: format!("missing {STACK_TRACE_KEY} record"),
	})?;

	Ok(CrashReport {
		timestamp_millis,
		stack_trace,
		metadata,
	})
}

fn write_record(out: &mut String, key: &str, value: &str) {
	escape_into(out, key, true);
	out.push('=');
	escape_into(out, value, false);
	out.push('\n');
}

fn escape_into(out: &mut String, s: &str, is_key: bool) {
	for (i, c) in s.chars().enumerate() {
		match c {
			'\\' => out.push_str("\\\\"),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			'\t' => out.push_str("\\t"),
			'=' | ':' => {
				out.push('\\');
				out.push(c);
			}
			'#' | '!' if i == 0 => {
				out.push('\\');
				out.push(c);
			}
			' ' if is_key || i == 0 => out.push_str("\\ "),
			_ => out.push(c),
		}
	}
}

/// Splits at the first unescaped separator and unescapes both halves.
fn split_record(line: &str) -> std::result::Result<(String, String), String> {
	let mut escaped = false;
	let mut split_at = None;
	for (i, c) in line.char_indices() {
		if escaped {
			escaped = false;
			continue;
		}
		match c {
			'\\' => escaped = true,
			'=' | ':' => {
				split_at = Some(i);
				break;
			}
			_ => {}
		}
	}

	let idx = split_at.ok_or_else(|| "record has no separator".to_string())?;
	let key = unescape(&line[..idx])?;
	let value = unescape(&line[idx + 1..])?;
	if key.is_empty() {
		return Err("record has an empty key".to_string());
	}
	Ok((key, value))
}

fn unescape(s: &str) -> std::result::Result<String, String> {
	let mut out = String::with_capacity(s.len());
	let mut chars = s.chars();
	while let Some(c) = chars.next() {
		if c != '\\' {
			out.push(c);
			continue;
		}
		match chars.next() {
			Some('n') => out.push('\n'),
			Some('r') => out.push('\r'),
			Some('t') => out.push('\t'),
			Some(other) => out.push(other),
			None => return Err("dangling escape at end of line".to_string()),
		}
	}
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn sample() -> CrashReport {
		CrashReport {
			timestamp_millis: 1_700_000_000_000,
			stack_trace: "panic: boom\n  at src/main.rs:3:5\nCaused by: io: denied".to_string(),
			metadata: vec![
				("versionName".to_string(), "1.2.3".to_string()),
				("versionCode".to_string(), "not set".to_string()),
				("os.name".to_string(), "linux".to_string()),
			],
		}
	}

	#[test]
	fn test_every_record_is_one_line() {
		let text = encode_report(&sample());
		let records: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
		assert_eq!(records.len(), 4);
		assert!(records[3].starts_with("STACK_TRACE="));
		assert!(records[3].contains("boom\\n  at src/main.rs\\:3\\:5"));
	}

	#[test]
	fn test_header_carries_creation_time() {
		let text = encode_report(&sample());
		let mut lines = text.lines();
		assert_eq!(lines.next(), Some(HEADER));
		assert_eq!(lines.next(), Some("#2023-11-14T22:13:20.000Z"));
	}

	#[test]
	fn test_metadata_order_is_preserved() {
		let decoded = decode_report(&encode_report(&sample()), 1).unwrap();
		let keys: Vec<&str> = decoded.metadata.iter().map(|(k, _)| k.as_str()).collect();
		assert_eq!(keys, vec!["versionName", "versionCode", "os.name"]);
	}

	#[test]
	fn test_decode_requires_trace() {
		let err = decode_report("#loom crash report\nversionName=1\n", 1).unwrap_err();
		assert!(matches!(err, CaptureError::Format { line: 0, .. }));
	}

	#[test]
	fn test_decode_reports_bad_line() {
		let err = decode_report("#c\nno separator here\n", 1).unwrap_err();
		assert!(matches!(err, CaptureError::Format { line: 2, .. }));
	}

	#[test]
	fn test_special_leading_characters_survive() {
		let report = CrashReport {
			timestamp_millis: 5,
			stack_trace: "# not a comment".to_string(),
			metadata: vec![(" key with spaces".to_string(), "!value".to_string())],
		};
		let decoded = decode_report(&encode_report(&report), 5).unwrap();
		assert_eq!(decoded, report);
	}

	#[test]
	fn test_leading_unicode_whitespace_in_keys_survives() {
		for key in ["\u{a0}k", "\u{0b}k", "\u{0c}k", "\u{3000}k", "\tk"] {
			let report = CrashReport {
				timestamp_millis: 9,
				stack_trace: "panic: boom".to_string(),
				metadata: vec![(key.to_string(), "v".to_string())],
			};
			let decoded = decode_report(&encode_report(&report), 9).unwrap();
			assert_eq!(decoded.metadata[0].0, key);
		}
	}

	proptest! {
		#[test]
		fn arbitrary_text_survives_storage(
			trace in "\\PC*",
			key in "[a-zA-Z.=: #!\\\\\t\u{a0}\u{0b}\u{0c}\u{3000}]{1,16}",
			value in "\\PC*",
		) {
			let report = CrashReport {
				timestamp_millis: 7,
				stack_trace: trace,
				metadata: vec![(key, value)],
			};
			let decoded = decode_report(&encode_report(&report), 7).unwrap();
			prop_assert_eq!(decoded, report);
		}
	}
}
