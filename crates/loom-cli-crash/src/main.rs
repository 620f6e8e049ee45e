// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use loom_crash_capture::{load_config, FileReportStore};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::{flush::FlushArgs, list::ListArgs, show::ShowArgs};

/// Inspect and drain crash reports left by earlier runs
#[derive(Parser, Debug)]
#[command(name = "loom-crash", version)]
struct Cli {
	/// Report directory (overrides config and LOOM_CRASH_REPORT_DIR)
	#[arg(long, global = true)]
	dir: Option<PathBuf>,

	/// Config file (defaults to $XDG_CONFIG_HOME/loom/crash.toml)
	#[arg(long, global = true, env = "LOOM_CRASH_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// List pending reports, oldest first
	List(ListArgs),
	/// Print one stored report
	Show(ShowArgs),
	/// Send every pending report and delete the ones accepted
	Flush(FlushArgs),
}

fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();

	let reports_dir = match cli.dir {
		Some(dir) => dir,
		None => load_config(cli.config.as_deref())?.report_dir,
	};
	debug!(reports_dir = %reports_dir.display(), "using report directory");

	let store = FileReportStore::new(reports_dir);

	match cli.command {
		Command::List(args) => commands::list::run(&store, args),
		Command::Show(args) => commands::show::run(&store, args),
		Command::Flush(args) => commands::flush::run(store, args),
	}
}
