// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flushes stored reports to a sink.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::sink::ReportSink;
use crate::store::ReportStore;

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
	/// Reports found pending when the flush started.
	pub attempted: usize,
	/// Reports handed off successfully.
	pub sent: usize,
	/// Reports left pending because loading or sending failed.
	pub failed: usize,
}

/// Sends every pending report, oldest first, deleting each one the sink
/// accepted.
#[derive(Clone)]
pub struct ReportDispatcher {
	store: Arc<dyn ReportStore>,
	sink: Arc<dyn ReportSink>,
}

impl ReportDispatcher {
	pub fn new(store: Arc<dyn ReportStore>, sink: Arc<dyn ReportSink>) -> Self {
		Self { store, sink }
	}

	/// Drains the backlog once. A failed report stays pending for the next
	/// flush and does not stop the rest of the batch.
	pub fn flush_all(&self) -> FlushSummary {
		let pending = match self.store.list_pending() {
			Ok(ids) => ids,
			Err(e) => {
				error!(error = %e, "failed to list pending crash reports");
				return FlushSummary::default();
			}
		};

		let mut summary = FlushSummary {
			attempted: pending.len(),
			..Default::default()
		};

		if pending.is_empty() {
			debug!("no pending crash reports");
			return summary;
		}

		for id in pending {
			let bytes = match self.store.load(&id) {
				Ok(bytes) => bytes,
				Err(e) => {
					warn!(report_id = %id, error = %e, "failed to load crash report");
					summary.failed += 1;
					continue;
				}
			};

			if let Err(e) = self.sink.send(&bytes, &id.file_name()) {
				warn!(report_id = %id, error = %e, "failed to send crash report, keeping it");
				summary.failed += 1;
				continue;
			}

			summary.sent += 1;

			if let Err(e) = self.store.delete(&id) {
				warn!(
					report_id = %id,
					error = %e,
					"failed to delete sent crash report, it will be sent again"
				);
			}
		}

		info!(
			attempted = summary.attempted,
			sent = summary.sent,
			failed = summary.failed,
			"flushed crash reports"
		);

		summary
	}
}
