// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Best-effort user notification at fault time.

use std::sync::Arc;

use tracing::{debug, error};

/// Shows a short message to whoever is watching the application.
///
/// Implementations may block (for example to run their own UI loop); the
/// pipeline always calls them on a detached thread.
pub trait Notifier: Send + Sync + 'static {
	fn notify(&self, message: &str);
}

/// Notifier that only emits a log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
	fn notify(&self, message: &str) {
		error!(notice = %message, "application crashed");
	}
}

/// Notifier that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
	fn notify(&self, _message: &str) {}
}

/// Runs the notifier on its own thread and returns immediately.
///
/// The thread is never joined and a failure to spawn it is only logged.
pub fn spawn_notification(notifier: Arc<dyn Notifier>, message: String) {
	let spawned = std::thread::Builder::new()
		.name("crash-notifier".to_string())
		.spawn(move || notifier.notify(&message));

	match spawned {
		Ok(_) => debug!("crash notification dispatched"),
		Err(e) => error!(error = %e, "failed to spawn crash notifier thread"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::mpsc;
	use std::sync::Mutex;
	use std::time::Duration;

	struct ChannelNotifier(Mutex<mpsc::Sender<(String, Option<String>)>>);

	impl Notifier for ChannelNotifier {
		fn notify(&self, message: &str) {
			let thread = std::thread::current().name().map(str::to_string);
			let _ = self.0.lock().unwrap().send((message.to_string(), thread));
		}
	}

	#[test]
	fn test_notification_runs_on_named_thread() {
		let (tx, rx) = mpsc::channel();
		spawn_notification(Arc::new(ChannelNotifier(Mutex::new(tx))), "boom".to_string());

		let (message, thread) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
		assert_eq!(message, "boom");
		assert_eq!(thread.as_deref(), Some("crash-notifier"));
	}

	#[test]
	fn test_blocking_notifier_does_not_block_caller() {
		struct Stuck;
		impl Notifier for Stuck {
			fn notify(&self, _message: &str) {
				std::thread::sleep(Duration::from_secs(60));
			}
		}

		let started = std::time::Instant::now();
		spawn_notification(Arc::new(Stuck), "ignored".to_string());
		assert!(started.elapsed() < Duration::from_secs(5));
	}
}
