// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use colored::Colorize;
use loom_crash_capture::{FileReportStore, ReportId, ReportStore};

#[derive(Debug, Clone, clap::Args)]
pub struct ListArgs {
	/// Only print report ids
	#[arg(short, long)]
	pub quiet: bool,
}

pub fn run(store: &FileReportStore, args: ListArgs) -> anyhow::Result<()> {
	let ids = store.list_pending()?;

	if args.quiet {
		for id in &ids {
			println!("{id}");
		}
		return Ok(());
	}

	if ids.is_empty() {
		println!(
			"{} in {}",
			"No pending crash reports".dimmed(),
			store.reports_dir().display()
		);
		return Ok(());
	}

	for id in &ids {
		let size = store.load(id).map(|bytes| bytes.len()).unwrap_or(0);
		println!(
			"{}  {}  {}",
			id.to_string().yellow(),
			format_timestamp(id),
			format_size(size).dimmed()
		);
	}

	println!();
	println!("{} pending", ids.len().to_string().bold());

	Ok(())
}

pub fn format_timestamp(id: &ReportId) -> String {
	DateTime::<Utc>::from_timestamp_millis(id.timestamp_millis())
		.map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string())
		.unwrap_or_else(|| "(invalid time)".to_string())
}

fn format_size(bytes: usize) -> String {
	if bytes < 1024 {
		format!("{bytes} B")
	} else {
		format!("{:.1} KiB", bytes as f64 / 1024.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_format_timestamp() {
		let id = ReportId::from_timestamp(1_700_000_000_123);
		assert_eq!(format_timestamp(&id), "2023-11-14 22:13:20.123 UTC");
	}

	#[test]
	fn test_format_size() {
		assert_eq!(format_size(512), "512 B");
		assert_eq!(format_size(2048), "2.0 KiB");
	}
}
