// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: install the crash capture hook and crash on purpose.
//!
//! Run with:
//!   cargo run --example capture -p loom-crash-capture
//!
//! Reports land in `$LOOM_CRASH_REPORT_DIR` (or the XDG data directory) and
//! are copied to `./crash-outbox` on the next run.

use std::sync::Arc;

use loom_crash_capture::{load_config, DirectorySink, FaultInterceptor};

fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.init();

	let config = load_config(None)?;
	println!("Reports directory: {}", config.report_dir.display());

	let interceptor = FaultInterceptor::builder()
		.config(&config)
		.sink(Arc::new(DirectorySink::new("crash-outbox")))
		.identity(loom_crash_capture::app_identity!())
		.build()?;

	let summary = interceptor.flush_pending();
	println!(
		"Flushed reports from earlier runs: {} sent, {} failed",
		summary.sent, summary.failed
	);

	interceptor.install();

	let settings: Vec<u32> = Vec::new();
	println!("First setting: {}", settings[0]);

	Ok(())
}
