// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ends the process after a fault has been handled.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

/// Default delay before the forced exit.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Default exit status for "fault handled, process terminated".
pub const DEFAULT_EXIT_CODE: i32 = 10;

/// What [`ProcessTerminator::terminate`] will do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
	/// Hand the fault to the previous handler and let it decide.
	Delegate,
	/// Wait out the grace period, then exit with the configured code.
	ForceExit,
}

type ExitFn = Arc<dyn Fn(i32) + Send + Sync>;

/// Post-fault shutdown policy.
#[derive(Clone)]
pub struct ProcessTerminator {
	grace_period: Duration,
	exit_code: i32,
	exit: ExitFn,
}

impl ProcessTerminator {
	pub fn new(grace_period: Duration, exit_code: i32) -> Self {
		Self {
			grace_period,
			exit_code,
			exit: Arc::new(|code| std::process::exit(code)),
		}
	}

	/// Replaces `std::process::exit`. Intended for tests and for hosts that
	/// need to run their own teardown before exiting.
	pub fn with_exit(mut self, exit: impl Fn(i32) + Send + Sync + 'static) -> Self {
		self.exit = Arc::new(exit);
		self
	}

	pub fn grace_period(&self) -> Duration {
		self.grace_period
	}

	pub fn exit_code(&self) -> i32 {
		self.exit_code
	}

	/// Unhandled faults go to the fallback when there is one; everything
	/// else is force-exited.
	pub fn decide(handled: bool, has_fallback: bool) -> Termination {
		if !handled && has_fallback {
			Termination::Delegate
		} else {
			Termination::ForceExit
		}
	}

	pub fn terminate<F: FnOnce()>(&self, handled: bool, fallback: Option<F>) {
		match (Self::decide(handled, fallback.is_some()), fallback) {
			(Termination::Delegate, Some(fallback)) => {
				warn!("crash report not written, delegating to previous panic handler");
				fallback();
			}
			_ => {
				info!(
					grace_period_ms = self.grace_period.as_millis() as u64,
					exit_code = self.exit_code,
					"terminating after handled crash"
				);
				std::thread::sleep(self.grace_period);
				(self.exit)(self.exit_code);
			}
		}
	}
}

impl Default for ProcessTerminator {
	fn default() -> Self {
		Self::new(DEFAULT_GRACE_PERIOD, DEFAULT_EXIT_CODE)
	}
}

impl fmt::Debug for ProcessTerminator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProcessTerminator")
			.field("grace_period", &self.grace_period)
			.field("exit_code", &self.exit_code)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
	use std::time::Instant;

	fn recording(grace: Duration) -> (ProcessTerminator, Arc<AtomicI32>) {
		let code = Arc::new(AtomicI32::new(-1));
		let seen = code.clone();
		let terminator =
			ProcessTerminator::new(grace, 10).with_exit(move |c| seen.store(c, Ordering::SeqCst));
		(terminator, code)
	}

	#[test]
	fn test_decide_policy() {
		assert_eq!(ProcessTerminator::decide(false, true), Termination::Delegate);
		assert_eq!(ProcessTerminator::decide(false, false), Termination::ForceExit);
		assert_eq!(ProcessTerminator::decide(true, true), Termination::ForceExit);
		assert_eq!(ProcessTerminator::decide(true, false), Termination::ForceExit);
	}

	#[test]
	fn test_defaults() {
		let terminator = ProcessTerminator::default();
		assert_eq!(terminator.grace_period(), Duration::from_secs(3));
		assert_eq!(terminator.exit_code(), 10);
	}

	#[test]
	fn test_unhandled_with_fallback_delegates() {
		let (terminator, code) = recording(Duration::ZERO);
		let called = AtomicBool::new(false);

		terminator.terminate(false, Some(|| called.store(true, Ordering::SeqCst)));

		assert!(called.load(Ordering::SeqCst));
		assert_eq!(code.load(Ordering::SeqCst), -1);
	}

	#[test]
	fn test_handled_exits_after_grace_period() {
		let (terminator, code) = recording(Duration::from_millis(50));
		let called = AtomicBool::new(false);

		let started = Instant::now();
		terminator.terminate(true, Some(|| called.store(true, Ordering::SeqCst)));

		assert!(started.elapsed() >= Duration::from_millis(50));
		assert!(!called.load(Ordering::SeqCst));
		assert_eq!(code.load(Ordering::SeqCst), 10);
	}

	#[test]
	fn test_unhandled_without_fallback_exits() {
		let (terminator, code) = recording(Duration::ZERO);
		terminator.terminate(false, None::<fn()>);
		assert_eq!(code.load(Ordering::SeqCst), 10);
	}
}
