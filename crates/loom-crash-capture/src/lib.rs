// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local crash capture for Rust applications.
//!
//! A [`FaultInterceptor`] installs itself as the process panic hook. When a
//! panic reaches it, it:
//! - notifies the user on a detached thread
//! - renders the panic and its cause chain into a [`CrashReport`]
//! - persists the report atomically through a [`ReportStore`]
//! - optionally flushes every pending report to a [`ReportSink`]
//! - terminates the process after a grace period
//!
//! Reports that could not be delivered stay on disk and are sent by the next
//! [`FaultInterceptor::flush_pending`] call, typically at startup.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use loom_crash_capture::{load_config, DirectorySink, FaultInterceptor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(None)?;
//! let interceptor = FaultInterceptor::builder()
//!     .config(&config)
//!     .sink(Arc::new(DirectorySink::new("/var/spool/crash-outbox")))
//!     .identity(loom_crash_capture::app_identity!())
//!     .build()?;
//!
//! interceptor.flush_pending();
//! interceptor.install();
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fault;
pub mod format;
pub mod interceptor;
pub mod metadata;
pub mod notifier;
pub mod report;
pub mod sink;
pub mod store;
pub mod terminator;

pub use builder::ReportBuilder;
pub use config::{load_config, ConfigError, CrashConfig, CrashConfigLayer};
pub use dispatcher::{FlushSummary, ReportDispatcher};
pub use error::{CaptureError, Result};
pub use fault::{BoxedError, Fault};
pub use format::{decode_report, encode_report};
pub use interceptor::{FaultInterceptor, FaultInterceptorBuilder};
pub use metadata::{
	AppIdentity, MetadataError, MetadataField, MetadataProvider, NoMetadata, PlatformMetadata,
};
pub use notifier::{Notifier, SilentNotifier, TracingNotifier};
pub use report::{CrashReport, ReportId};
pub use sink::{DirectorySink, HttpReportSink, HttpReportSinkBuilder, ReportSink, SinkError};
pub use store::{FileReportStore, ReportStore};
pub use terminator::{ProcessTerminator, Termination};
