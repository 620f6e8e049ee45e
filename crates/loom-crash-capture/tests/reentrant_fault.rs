// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A capability that panics while its thread holds the fault lock must not
//! wedge the hook. Single test: the panic hook is process-global.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use loom_crash_capture::{
	DirectorySink, Fault, FaultInterceptor, FileReportStore, MetadataField, MetadataProvider,
	ProcessTerminator, ReportStore, SilentNotifier,
};
use tempfile::TempDir;

/// Panics on its first collection only.
#[derive(Default)]
struct PanicsOnce(AtomicBool);

impl MetadataProvider for PanicsOnce {
	fn collect(&self) -> Vec<MetadataField> {
		if !self.0.swap(true, Ordering::SeqCst) {
			panic!("metadata provider blew up");
		}
		vec![MetadataField::ok("os.name", "testos")]
	}
}

#[test]
fn panic_inside_capture_terminates_instead_of_hanging() {
	let tmp = TempDir::new().unwrap();
	let exit_code = Arc::new(AtomicI32::new(-1));
	let recorded = exit_code.clone();

	let interceptor = FaultInterceptor::builder()
		.store(Arc::new(FileReportStore::new(tmp.path().join("reports"))))
		.sink(Arc::new(DirectorySink::new(tmp.path().join("outbox"))))
		.metadata(Arc::new(PanicsOnce::default()))
		.notifier(Arc::new(SilentNotifier))
		.flush_on_fault(false)
		.terminator(
			ProcessTerminator::new(Duration::ZERO, 10)
				.with_exit(move |code| recorded.store(code, Ordering::SeqCst)),
		)
		.build()
		.unwrap();
	interceptor.install();

	let (done_tx, done_rx) = mpsc::channel();
	let worker = interceptor.clone();
	let handle = std::thread::spawn(move || {
		let _ = worker.capture(&Fault::new("error", "recoverable"));
		let _ = done_tx.send(());
	});

	// The worker unwinds out of `capture`; it never reports completion.
	assert_eq!(
		done_rx.recv_timeout(Duration::from_secs(10)),
		Err(mpsc::RecvTimeoutError::Disconnected)
	);
	assert!(handle.join().is_err());

	// Unhandled with a fallback: delegated, not force-exited.
	assert_eq!(exit_code.load(Ordering::SeqCst), -1);
	assert!(interceptor.store().list_pending().unwrap().is_empty());

	// The lock is usable again for a later panic on another thread.
	let (done_tx, done_rx) = mpsc::channel::<()>();
	let handle = std::thread::spawn(move || {
		let _keep = done_tx;
		panic!("second fault");
	});
	assert_eq!(
		done_rx.recv_timeout(Duration::from_secs(10)),
		Err(mpsc::RecvTimeoutError::Disconnected)
	);
	assert!(handle.join().is_err());

	assert_eq!(exit_code.load(Ordering::SeqCst), 10);
	let pending = interceptor.store().list_pending().unwrap();
	assert_eq!(pending.len(), 1);
	let report = interceptor.store().read_report(&pending[0]).unwrap();
	assert!(report.stack_trace.starts_with("panic: second fault"));
	assert_eq!(report.metadata_value("os.name"), Some("testos"));

	assert!(interceptor.uninstall());
}
