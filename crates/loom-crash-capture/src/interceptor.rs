// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide fault interception.

use std::cell::Cell;
use std::panic::PanicHookInfo;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

use crate::builder::ReportBuilder;
use crate::config::CrashConfig;
use crate::dispatcher::{FlushSummary, ReportDispatcher};
use crate::error::{CaptureError, Result};
use crate::fault::Fault;
use crate::metadata::{AppIdentity, MetadataProvider, PlatformMetadata};
use crate::notifier::{spawn_notification, Notifier, TracingNotifier};
use crate::report::ReportId;
use crate::sink::ReportSink;
use crate::store::{FileReportStore, ReportStore};
use crate::terminator::ProcessTerminator;

/// Default prefix of the message passed to the notifier.
pub const DEFAULT_NOTICE_PREFIX: &str = "The application crashed: ";

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

thread_local! {
	static HANDLING_FAULT: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside fault handling until dropped.
///
/// A panic raised by a capability while its thread holds the fault lock
/// reaches the hook on that same thread; the marker lets the hook see this
/// instead of locking again.
struct HandlingMarker;

impl HandlingMarker {
	/// `None` when this thread is already handling a fault.
	fn enter() -> Option<Self> {
		match HANDLING_FAULT.try_with(|flag| flag.replace(true)) {
			Ok(true) => None,
			Ok(false) | Err(_) => Some(HandlingMarker),
		}
	}
}

impl Drop for HandlingMarker {
	fn drop(&mut self) {
		let _ = HANDLING_FAULT.try_with(|flag| flag.set(false));
	}
}

fn hook_addr(hook: &PanicHook) -> usize {
	let ptr: *const _ = &**hook;
	ptr.cast::<()>() as usize
}

/// Builder for constructing a [`FaultInterceptor`].
pub struct FaultInterceptorBuilder {
	store: Option<Arc<dyn ReportStore>>,
	sink: Option<Arc<dyn ReportSink>>,
	metadata: Arc<dyn MetadataProvider>,
	notifier: Arc<dyn Notifier>,
	identity: AppIdentity,
	terminator: ProcessTerminator,
	flush_on_fault: bool,
	notice_prefix: String,
	max_cause_depth: Option<usize>,
	max_trace_bytes: Option<usize>,
}

impl FaultInterceptorBuilder {
	pub fn new() -> Self {
		Self {
			store: None,
			sink: None,
			metadata: Arc::new(PlatformMetadata),
			notifier: Arc::new(TracingNotifier),
			identity: AppIdentity::default(),
			terminator: ProcessTerminator::default(),
			flush_on_fault: true,
			notice_prefix: DEFAULT_NOTICE_PREFIX.to_string(),
			max_cause_depth: None,
			max_trace_bytes: None,
		}
	}

	/// Applies a loaded configuration: report directory, terminator policy,
	/// flush behaviour and trace limits.
	pub fn config(mut self, config: &CrashConfig) -> Self {
		self.store = Some(Arc::new(FileReportStore::new(config.report_dir.clone())));
		self.terminator = ProcessTerminator::new(config.grace_period(), config.exit_code);
		self.flush_on_fault = config.flush_on_fault;
		self.notice_prefix = config.notice_prefix.clone();
		self.max_cause_depth = Some(config.max_cause_depth);
		self.max_trace_bytes = Some(config.max_trace_bytes);
		self
	}

	pub fn store(mut self, store: Arc<dyn ReportStore>) -> Self {
		self.store = Some(store);
		self
	}

	pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
		self.sink = Some(sink);
		self
	}

	pub fn metadata(mut self, metadata: Arc<dyn MetadataProvider>) -> Self {
		self.metadata = metadata;
		self
	}

	pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
		self.notifier = notifier;
		self
	}

	/// Sets the `versionName`/`versionCode` written into every report.
	///
	/// ```ignore
	/// let interceptor = FaultInterceptor::builder()
	///     .identity(loom_crash_capture::app_identity!())
	///     ...
	/// ```
	pub fn identity(mut self, identity: AppIdentity) -> Self {
		self.identity = identity;
		self
	}

	pub fn terminator(mut self, terminator: ProcessTerminator) -> Self {
		self.terminator = terminator;
		self
	}

	/// Whether the backlog is flushed right after a fault is persisted.
	pub fn flush_on_fault(mut self, enabled: bool) -> Self {
		self.flush_on_fault = enabled;
		self
	}

	pub fn notice_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.notice_prefix = prefix.into();
		self
	}

	pub fn max_cause_depth(mut self, depth: usize) -> Self {
		self.max_cause_depth = Some(depth);
		self
	}

	pub fn build(self) -> Result<FaultInterceptor> {
		let store = self.store.ok_or(CaptureError::MissingStore)?;
		let sink = self.sink.ok_or(CaptureError::MissingSink)?;

		let mut builder = ReportBuilder::new(self.metadata, self.identity);
		if let Some(depth) = self.max_cause_depth {
			builder = builder.max_cause_depth(depth);
		}
		if let Some(bytes) = self.max_trace_bytes {
			builder = builder.max_trace_bytes(bytes);
		}

		let inner = Arc::new(InterceptorInner {
			builder,
			dispatcher: ReportDispatcher::new(Arc::clone(&store), sink),
			store,
			notifier: self.notifier,
			terminator: self.terminator,
			flush_on_fault: self.flush_on_fault,
			notice_prefix: self.notice_prefix,
			fault_lock: Mutex::new(()),
			previous_hook: Mutex::new(None),
			installed_hook: Mutex::new(None),
		});

		Ok(FaultInterceptor { inner })
	}
}

impl Default for FaultInterceptorBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct InterceptorInner {
	builder: ReportBuilder,
	store: Arc<dyn ReportStore>,
	dispatcher: ReportDispatcher,
	notifier: Arc<dyn Notifier>,
	terminator: ProcessTerminator,
	flush_on_fault: bool,
	notice_prefix: String,
	/// Serializes fault handling when several threads fault at once.
	fault_lock: Mutex<()>,
	previous_hook: Mutex<Option<Arc<PanicHook>>>,
	/// Address of the hook registered by `install`.
	installed_hook: Mutex<Option<usize>>,
}

impl InterceptorInner {
	fn on_fault(&self, fault: &Fault<'_>) -> bool {
		spawn_notification(
			Arc::clone(&self.notifier),
			format!("{}{}", self.notice_prefix, fault.summary()),
		);

		let report = match self.builder.build(fault) {
			Ok(report) => report,
			Err(e) => {
				error!(error = %e, "failed to build crash report");
				return false;
			}
		};

		match self.store.save(&report) {
			Ok(id) => info!(report_id = %id, "crash report saved"),
			Err(e) => error!(error = %e, "failed to save crash report, it is lost"),
		}

		if self.flush_on_fault {
			self.dispatcher.flush_all();
		}

		true
	}

	/// Enters fault handling on this thread and takes the fault lock.
	/// `None` when this thread is already handling a fault.
	fn begin(&self) -> Option<(HandlingMarker, MutexGuard<'_, ()>)> {
		let marker = HandlingMarker::enter()?;
		let guard = self.fault_lock.lock().unwrap_or_else(PoisonError::into_inner);
		Some((marker, guard))
	}

	fn on_panic(&self, info: &PanicHookInfo<'_>) {
		let fallback = self
			.previous_hook
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone();

		let Some(_handling) = self.begin() else {
			error!("panic raised while handling a crash, skipping capture");
			self
				.terminator
				.terminate(false, fallback.map(|hook| move || (*hook)(info)));
			return;
		};

		let fault = Fault::from_panic(info);
		let handled = self.on_fault(&fault);

		self
			.terminator
			.terminate(handled, fallback.map(|hook| move || (*hook)(info)));
	}
}

/// Last-resort handler that turns panics into stored crash reports.
///
/// Construct one at startup, [`install`](Self::install) it once, and call
/// [`flush_pending`](Self::flush_pending) on healthy starts to drain reports
/// left by earlier crashes.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use loom_crash_capture::{load_config, FaultInterceptor, HttpReportSink};
///
/// let config = load_config(None)?;
/// let sink = HttpReportSink::builder()
///     .base_url("https://loom.example.com")
///     .auth_token(token)
///     .build()?;
///
/// let interceptor = FaultInterceptor::builder()
///     .config(&config)
///     .sink(Arc::new(sink))
///     .identity(loom_crash_capture::app_identity!())
///     .build()?;
///
/// interceptor.flush_pending();
/// interceptor.install();
/// ```
#[derive(Clone)]
pub struct FaultInterceptor {
	inner: Arc<InterceptorInner>,
}

impl FaultInterceptor {
	pub fn builder() -> FaultInterceptorBuilder {
		FaultInterceptorBuilder::new()
	}

	/// Registers this interceptor as the process panic hook, keeping the
	/// current hook as the fallback.
	///
	/// Calling this twice chains the interceptor onto itself; install once.
	pub fn install(&self) {
		let previous = std::panic::take_hook();
		*self
			.inner
			.previous_hook
			.lock()
			.unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(previous));

		let inner = Arc::clone(&self.inner);
		let hook: PanicHook = Box::new(move |info| inner.on_panic(info));
		*self
			.inner
			.installed_hook
			.lock()
			.unwrap_or_else(PoisonError::into_inner) = Some(hook_addr(&hook));
		std::panic::set_hook(hook);

		info!("crash capture panic hook installed");
	}

	/// Removes the hook and restores the one that was active at `install`.
	///
	/// Only acts while this interceptor is still the active hook. A hook
	/// registered later is left in place and `false` is returned.
	pub fn uninstall(&self) -> bool {
		let mut installed = self
			.inner
			.installed_hook
			.lock()
			.unwrap_or_else(PoisonError::into_inner);
		let Some(ours) = *installed else {
			return false;
		};

		let current = std::panic::take_hook();
		if hook_addr(&current) != ours {
			std::panic::set_hook(current);
			warn!("panic hook was replaced after install, leaving it in place");
			return false;
		}
		drop(current);
		*installed = None;

		let previous = self
			.inner
			.previous_hook
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take();
		if let Some(previous) = previous {
			std::panic::set_hook(Box::new(move |info| (*previous)(info)));
		}

		info!("crash capture panic hook removed");
		true
	}

	/// Handles a fault without terminating: notifies, builds and saves the
	/// report, then flushes if configured. Returns whether a report was built.
	///
	/// A call made from inside fault handling on the same thread (for example
	/// by a metadata provider) is refused and returns `false`.
	pub fn on_fault(&self, fault: &Fault<'_>) -> bool {
		let Some(_handling) = self.inner.begin() else {
			warn!("fault raised while handling a crash, ignoring it");
			return false;
		};
		self.inner.on_fault(fault)
	}

	/// Stores a report for a non-fatal fault. No notification, no flush.
	pub fn capture(&self, fault: &Fault<'_>) -> Result<ReportId> {
		let _handling = self.inner.begin().ok_or(CaptureError::Reentrant)?;
		let report = self.inner.builder.build(fault)?;
		let id = self.inner.store.save(&report)?;
		info!(report_id = %id, "crash report captured");
		Ok(id)
	}

	/// Sends every report left by earlier runs.
	pub fn flush_pending(&self) -> FlushSummary {
		self.inner.dispatcher.flush_all()
	}

	pub fn store(&self) -> &Arc<dyn ReportStore> {
		&self.inner.store
	}
}
