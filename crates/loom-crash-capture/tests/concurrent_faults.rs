// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Faults raised on several threads at once are handled one at a time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use loom_crash_capture::{
	DirectorySink, FaultInterceptor, FileReportStore, MetadataField, MetadataProvider,
	ProcessTerminator, ReportStore, SilentNotifier,
};
use tempfile::TempDir;

/// Tracks how many collections run at the same time.
#[derive(Default)]
struct Overlap {
	active: AtomicUsize,
	max_active: AtomicUsize,
}

impl MetadataProvider for Overlap {
	fn collect(&self) -> Vec<MetadataField> {
		let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
		self.max_active.fetch_max(now, Ordering::SeqCst);
		std::thread::sleep(Duration::from_millis(50));
		self.active.fetch_sub(1, Ordering::SeqCst);
		Vec::new()
	}
}

#[test]
fn simultaneous_panics_are_serialized() {
	const THREADS: usize = 4;

	let tmp = TempDir::new().unwrap();
	let overlap = Arc::new(Overlap::default());
	let exits = Arc::new(AtomicUsize::new(0));
	let counted = exits.clone();

	let interceptor = FaultInterceptor::builder()
		.store(Arc::new(FileReportStore::new(tmp.path().join("reports"))))
		.sink(Arc::new(DirectorySink::new(tmp.path().join("outbox"))))
		.metadata(overlap.clone())
		.notifier(Arc::new(SilentNotifier))
		.flush_on_fault(false)
		.terminator(
			ProcessTerminator::new(Duration::from_millis(10), 10).with_exit(move |code| {
				assert_eq!(code, 10);
				counted.fetch_add(1, Ordering::SeqCst);
			}),
		)
		.build()
		.unwrap();
	interceptor.install();

	let barrier = Arc::new(Barrier::new(THREADS));
	let handles: Vec<_> = (0..THREADS)
		.map(|i| {
			let barrier = barrier.clone();
			std::thread::spawn(move || {
				barrier.wait();
				panic!("worker {i} failed");
			})
		})
		.collect();
	for handle in handles {
		assert!(handle.join().is_err());
	}

	assert!(interceptor.uninstall());

	assert_eq!(overlap.max_active.load(Ordering::SeqCst), 1);
	assert_eq!(exits.load(Ordering::SeqCst), THREADS);

	let pending = interceptor.store().list_pending().unwrap();
	assert_eq!(pending.len(), THREADS);
	let mut messages: Vec<String> = pending
		.iter()
		.map(|id| interceptor.store().read_report(id).unwrap().stack_trace)
		.map(|trace| trace.lines().next().unwrap_or_default().to_string())
		.collect();
	messages.sort();
	let expected: Vec<String> = (0..THREADS).map(|i| format!("panic: worker {i} failed")).collect();
	assert_eq!(messages, expected);
}
