// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use loom_crash_capture::{
	DirectorySink, FileReportStore, HttpReportSink, ReportDispatcher, ReportSink,
};

#[derive(Debug, Clone, clap::Args)]
pub struct FlushArgs {
	/// Base URL of the crash collector
	#[arg(long, conflicts_with = "outbox", required_unless_present = "outbox")]
	pub url: Option<String>,

	/// Bearer token for the collector
	#[arg(long, env = "LOOM_CRASH_TOKEN")]
	pub token: Option<String>,

	/// Copy reports into this directory instead of uploading them
	#[arg(long)]
	pub outbox: Option<PathBuf>,
}

pub fn run(store: FileReportStore, args: FlushArgs) -> anyhow::Result<()> {
	let sink = build_sink(&args)?;
	let dispatcher = ReportDispatcher::new(Arc::new(store), sink);

	let summary = dispatcher.flush_all();

	if summary.attempted == 0 {
		println!("{}", "Nothing to flush".dimmed());
		return Ok(());
	}

	println!(
		"{} Sent {} of {} report(s)",
		"✓".green(),
		summary.sent.to_string().bold(),
		summary.attempted
	);

	if summary.failed > 0 {
		anyhow::bail!("{} report(s) could not be sent and remain pending", summary.failed);
	}

	Ok(())
}

fn build_sink(args: &FlushArgs) -> anyhow::Result<Arc<dyn ReportSink>> {
	if let Some(outbox) = &args.outbox {
		return Ok(Arc::new(DirectorySink::new(outbox)));
	}

	let Some(url) = &args.url else {
		anyhow::bail!("either --url or --outbox is required");
	};

	let mut builder = HttpReportSink::builder().base_url(url);
	if let Some(token) = &args.token {
		builder = builder.auth_token(token);
	}
	Ok(Arc::new(builder.build()?))
}
