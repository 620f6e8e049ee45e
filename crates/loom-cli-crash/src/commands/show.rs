// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use colored::Colorize;
use loom_crash_capture::{FileReportStore, ReportId, ReportStore};

use super::list::format_timestamp;

#[derive(Debug, Clone, clap::Args)]
pub struct ShowArgs {
	/// Report id, as printed by `list` (e.g. crash-1700000000123.trace)
	pub id: String,

	/// Print the raw stored file instead of the parsed report
	#[arg(long)]
	pub raw: bool,
}

pub fn run(store: &FileReportStore, args: ShowArgs) -> anyhow::Result<()> {
	let id: ReportId = args.id.parse()?;

	if args.raw {
		let bytes = store.load(&id)?;
		print!("{}", String::from_utf8_lossy(&bytes));
		return Ok(());
	}

	let report = store.read_report(&id)?;

	println!("{}: {}", "Report".bold(), id.to_string().yellow());
	println!("{}: {}", "Time".bold(), format_timestamp(&id));

	if !report.metadata.is_empty() {
		println!();
		for (key, value) in &report.metadata {
			println!("{}: {}", key.bold(), value);
		}
	}

	println!();
	println!("{}", report.stack_trace);

	Ok(())
}
