// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::source::{CountKind, CountSource, FetchError};
use crate::state::DisplayStateManager;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// What to do with the verified count when the validation service can't be reached.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FallbackPolicy {
	/// Leave the counts alone and report the outage.
	#[default]
	Surface,
	/// Add zero or one to the verified count, never beyond the claimed count. This makes an outage look like organic
	/// progress and only exists for compatibility with older deployments.
	SyntheticProgress,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldOutcome {
	Adopted(u64),
	/// The service answered, but not with a usable count. The previous value is kept.
	Malformed,
	/// The request failed or the service returned an error status.
	Unavailable,
}

impl fmt::Display for FieldOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Adopted(count) => write!(f, "updated to {}", count),
			Self::Malformed => f.write_str("malformed response"),
			Self::Unavailable => f.write_str("service unavailable"),
		}
	}
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PollReport {
	pub checked_at: DateTime<Utc>,
	pub sold: FieldOutcome,
	pub clicked: FieldOutcome,
	/// How much the verified count was bumped by the synthetic fallback, if it ran.
	pub synthetic_increment: Option<u64>,
}

impl PollReport {
	pub fn is_clean(&self) -> bool {
		matches!(self.sold, FieldOutcome::Adopted(_)) && matches!(self.clicked, FieldOutcome::Adopted(_))
	}
}

impl fmt::Display for PollReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "verified: {}; claimed: {}", self.sold, self.clicked)?;
		if let Some(increment) = self.synthetic_increment {
			write!(f, "; synthetic progress +{}", increment)?;
		}
		Ok(())
	}
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollOutcome {
	/// Another poll was already in flight.
	Skipped,
	/// The poller shut down while the requests were outstanding, so their results were dropped.
	Discarded,
	Completed(PollReport),
}

/// Periodically merges the validation service's counts into the display state.
#[derive(Debug)]
pub struct ValidationPoller {
	display_state: Arc<DisplayStateManager>,
	source: Arc<dyn CountSource>,
	fallback: FallbackPolicy,
	live: watch::Receiver<bool>,
	last_report: Mutex<Option<PollReport>>,
}

impl ValidationPoller {
	/// Creates a poller. It stops once `live` holds `false` or its sender is dropped.
	pub fn new(
		display_state: Arc<DisplayStateManager>,
		source: Arc<dyn CountSource>,
		fallback: FallbackPolicy,
		live: watch::Receiver<bool>,
	) -> Self {
		Self {
			display_state,
			source,
			fallback,
			live,
			last_report: Mutex::new(None),
		}
	}

	pub fn last_report(&self) -> Option<PollReport> {
		self.last_report.lock().unwrap_or_else(PoisonError::into_inner).clone()
	}

	fn is_live(&self) -> bool {
		*self.live.borrow()
	}

	/// Runs one poll: both counts are requested concurrently and merged in a single update. Does nothing if a poll is
	/// already running.
	pub async fn poll_once(&self) -> PollOutcome {
		let Some(_guard) = self.display_state.try_begin_poll() else {
			tracing::debug!("Validation poll already in flight; skipping");
			return PollOutcome::Skipped;
		};

		let (sold, clicked) = tokio::join!(
			self.source.fetch_count(CountKind::Sold),
			self.source.fetch_count(CountKind::Clicked)
		);
		if !self.is_live() {
			tracing::debug!("Validation poller stopped during a poll; discarding results");
			return PollOutcome::Discarded;
		}

		let sold = classify(CountKind::Sold, sold);
		let clicked = classify(CountKind::Clicked, clicked);
		let checked_at = Utc::now();
		let fallback = self.fallback;
		let mut synthetic_increment = None;

		self.display_state.record_validation(checked_at, |state| {
			if let FieldOutcome::Adopted(count) = sold {
				state.tickets_verified = count;
			}
			if let FieldOutcome::Adopted(count) = clicked {
				state.tickets_claimed = count;
			}
			if sold == FieldOutcome::Unavailable && fallback == FallbackPolicy::SyntheticProgress {
				let step = rand::thread_rng().gen_range(0..=1);
				let previous = state.tickets_verified;
				state.tickets_verified = synthetic_verified(previous, state.tickets_claimed, step);
				synthetic_increment = Some(state.tickets_verified - previous);
			}
		});
		if let Some(increment) = synthetic_increment {
			tracing::warn!(increment, "Validation service unavailable; applied synthetic progress");
		}

		let report = PollReport {
			checked_at,
			sold,
			clicked,
			synthetic_increment,
		};
		*self.last_report.lock().unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
		PollOutcome::Completed(report)
	}

	/// Polls immediately and then every `interval` until shut down. Each tick runs on its own task, so a tick that
	/// arrives while a slow poll is outstanding is skipped rather than queued.
	pub async fn run(self: Arc<Self>, interval: Duration) {
		let mut ticker = tokio::time::interval(interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
		let mut live = self.live.clone();

		loop {
			tokio::select! {
				_ = ticker.tick() => {
					if !*live.borrow() {
						break;
					}
					let poller = Arc::clone(&self);
					tokio::spawn(async move {
						poller.poll_once().await;
					});
				}
				changed = live.changed() => {
					if changed.is_err() || !*live.borrow() {
						break;
					}
				}
			}
		}
		tracing::info!("Validation poller stopped");
	}
}

fn classify(kind: CountKind, fetched: Result<u64, FetchError>) -> FieldOutcome {
	match fetched {
		Ok(count) => FieldOutcome::Adopted(count),
		Err(error) if error.is_outage() => {
			tracing::warn!(%kind, source = ?error, "Validation check failed");
			FieldOutcome::Unavailable
		}
		Err(error) => {
			tracing::warn!(%kind, source = ?error, "Invalid validation response; keeping previous value");
			FieldOutcome::Malformed
		}
	}
}

/// Bumps the verified count by `step` without passing the claimed count. Never lowers it.
fn synthetic_verified(verified: u64, claimed: u64, step: u64) -> u64 {
	verified.max(verified.saturating_add(step).min(claimed))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::DisplayState;
	use crate::state::MemoryStore;
	use async_trait::async_trait;
	use reqwest::StatusCode;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tokio::sync::{Notify, Semaphore};

	#[derive(Clone, Copy, Debug)]
	enum Scripted {
		Count(u64),
		Malformed,
		Outage,
	}

	#[derive(Debug)]
	struct ScriptedSource {
		sold: Scripted,
		clicked: Scripted,
		calls: AtomicUsize,
	}

	impl ScriptedSource {
		fn new(sold: Scripted, clicked: Scripted) -> Arc<Self> {
			Arc::new(Self {
				sold,
				clicked,
				calls: AtomicUsize::new(0),
			})
		}
	}

	#[async_trait]
	impl CountSource for ScriptedSource {
		async fn fetch_count(&self, kind: CountKind) -> Result<u64, FetchError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			let scripted = match kind {
				CountKind::Sold => self.sold,
				CountKind::Clicked => self.clicked,
			};
			match scripted {
				Scripted::Count(count) => Ok(count),
				Scripted::Malformed => Err(FetchError::Malformed(String::from("expected property"))),
				Scripted::Outage => Err(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE)),
			}
		}
	}

	/// Holds every fetch until the test releases it.
	#[derive(Debug)]
	struct GatedSource {
		entered: Notify,
		gate: Semaphore,
	}

	#[async_trait]
	impl CountSource for GatedSource {
		async fn fetch_count(&self, _kind: CountKind) -> Result<u64, FetchError> {
			self.entered.notify_one();
			let permit = self.gate.acquire().await.map_err(|error| FetchError::Malformed(error.to_string()))?;
			permit.forget();
			Ok(3000)
		}
	}

	fn manager_with(state: DisplayState) -> Arc<DisplayStateManager> {
		let record = serde_json::to_string(&state).unwrap();
		Arc::new(DisplayStateManager::load(Box::new(MemoryStore::with_contents(record))))
	}

	fn starting_state() -> DisplayState {
		DisplayState {
			tickets_claimed: 1000,
			tickets_verified: 800,
			..DisplayState::default()
		}
	}

	fn poller(
		manager: &Arc<DisplayStateManager>,
		source: Arc<dyn CountSource>,
		fallback: FallbackPolicy,
	) -> (ValidationPoller, watch::Sender<bool>) {
		let (live_sender, live) = watch::channel(true);
		let poller = ValidationPoller::new(Arc::clone(manager), source, fallback, live);
		(poller, live_sender)
	}

	#[tokio::test]
	async fn malformed_clicked_response_only_updates_verified() {
		let manager = manager_with(starting_state());
		let before = manager.snapshot();
		let (poller, _live) = poller(
			&manager,
			ScriptedSource::new(Scripted::Count(900), Scripted::Malformed),
			FallbackPolicy::Surface,
		);

		let outcome = poller.poll_once().await;
		let PollOutcome::Completed(report) = outcome else {
			panic!("poll didn't complete: {:?}", outcome);
		};
		assert_eq!(report.sold, FieldOutcome::Adopted(900));
		assert_eq!(report.clicked, FieldOutcome::Malformed);

		let after = manager.snapshot();
		assert_eq!(after.tickets_verified, 900);
		assert_eq!(after.tickets_claimed, before.tickets_claimed);
		assert!(after.last_validation_check >= before.last_validation_check);
		assert!(!after.validation_in_progress);
		assert_eq!(poller.last_report(), Some(report));
	}

	#[tokio::test]
	async fn both_counts_are_adopted() {
		let manager = manager_with(starting_state());
		let (poller, _live) = poller(
			&manager,
			ScriptedSource::new(Scripted::Count(5000), Scripted::Count(6100)),
			FallbackPolicy::Surface,
		);
		let PollOutcome::Completed(report) = poller.poll_once().await else {
			panic!("poll didn't complete");
		};
		assert!(report.is_clean());
		let state = manager.snapshot();
		assert_eq!(state.tickets_verified, 5000);
		assert_eq!(state.tickets_claimed, 6100);
		assert!(state.is_unlocked);
	}

	#[tokio::test]
	async fn outage_is_surfaced_without_touching_counts() {
		let manager = manager_with(starting_state());
		let (poller, _live) = poller(
			&manager,
			ScriptedSource::new(Scripted::Outage, Scripted::Outage),
			FallbackPolicy::Surface,
		);
		let PollOutcome::Completed(report) = poller.poll_once().await else {
			panic!("poll didn't complete");
		};
		assert_eq!(report.sold, FieldOutcome::Unavailable);
		assert_eq!(report.synthetic_increment, None);
		assert!(!report.is_clean());
		assert_eq!(
			report.to_string(),
			"verified: service unavailable; claimed: service unavailable"
		);

		let state = manager.snapshot();
		assert_eq!(state.tickets_verified, 800);
		assert_eq!(state.tickets_claimed, 1000);
	}

	#[tokio::test]
	async fn synthetic_progress_stays_within_claimed() {
		let manager = manager_with(starting_state());
		let (poller, _live) = poller(
			&manager,
			ScriptedSource::new(Scripted::Outage, Scripted::Outage),
			FallbackPolicy::SyntheticProgress,
		);
		for _ in 0..50 {
			let before = manager.snapshot().tickets_verified;
			let PollOutcome::Completed(report) = poller.poll_once().await else {
				panic!("poll didn't complete");
			};
			let after = manager.snapshot().tickets_verified;
			assert!(after == before || after == before + 1);
			assert_eq!(report.synthetic_increment, Some(after - before));
		}
		assert!(manager.snapshot().tickets_verified <= 1000);
	}

	#[test]
	fn synthetic_step_is_bounded_and_monotonic() {
		assert_eq!(synthetic_verified(10, 20, 1), 11);
		assert_eq!(synthetic_verified(10, 20, 0), 10);
		assert_eq!(synthetic_verified(20, 20, 1), 20);
		assert_eq!(synthetic_verified(25, 20, 1), 25);
	}

	#[tokio::test]
	async fn overlapping_polls_are_skipped() {
		let manager = manager_with(starting_state());
		let source = Arc::new(GatedSource {
			entered: Notify::new(),
			gate: Semaphore::new(0),
		});
		let (poller, _live) = poller(&manager, source.clone(), FallbackPolicy::Surface);
		let poller = Arc::new(poller);

		let first = tokio::spawn({
			let poller = Arc::clone(&poller);
			async move { poller.poll_once().await }
		});
		source.entered.notified().await;
		assert!(manager.snapshot().validation_in_progress);

		assert_eq!(poller.poll_once().await, PollOutcome::Skipped);

		source.gate.add_permits(2);
		let first = first.await.unwrap();
		assert!(matches!(first, PollOutcome::Completed(_)));
		assert!(!manager.snapshot().validation_in_progress);

		source.gate.add_permits(2);
		assert!(matches!(poller.poll_once().await, PollOutcome::Completed(_)));
	}

	#[tokio::test]
	async fn results_arriving_after_shutdown_are_discarded() {
		let manager = manager_with(starting_state());
		let (poller, live) = poller(
			&manager,
			ScriptedSource::new(Scripted::Count(4000), Scripted::Count(4000)),
			FallbackPolicy::Surface,
		);
		live.send(false).unwrap();

		assert_eq!(poller.poll_once().await, PollOutcome::Discarded);
		assert_eq!(manager.snapshot().tickets_verified, 800);
		assert!(!manager.poll_in_flight());
		assert_eq!(poller.last_report(), None);
	}

	#[tokio::test(start_paused = true)]
	async fn run_polls_at_startup_and_on_each_interval() {
		let manager = manager_with(starting_state());
		let source = ScriptedSource::new(Scripted::Count(801), Scripted::Count(1001));
		let (poller, live) = poller(&manager, source.clone(), FallbackPolicy::Surface);
		let task = tokio::spawn(Arc::new(poller).run(Duration::from_secs(30)));

		tokio::time::sleep(Duration::from_secs(1)).await;
		assert_eq!(source.calls.load(Ordering::SeqCst), 2);

		tokio::time::sleep(Duration::from_secs(30)).await;
		assert_eq!(source.calls.load(Ordering::SeqCst), 4);

		live.send(false).unwrap();
		task.await.unwrap();
		tokio::time::sleep(Duration::from_secs(60)).await;
		assert_eq!(source.calls.load(Ordering::SeqCst), 4);
	}
}
