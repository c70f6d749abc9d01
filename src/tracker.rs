// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client-side progress of a generated future while its status is polled.

use crate::model::{GenerationResult, GenerationStatus};
use chrono::{DateTime, Utc};
use std::time::Duration;

pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const LOADING_MESSAGE_INTERVAL: Duration = Duration::from_millis(2500);

pub const LOADING_MESSAGES: [&str; 5] = [
	"Dreaming up your future…",
	"Consulting the time oracles…",
	"Stitching together tomorrow's possibilities…",
	"Gathering inspiration from the stars…",
	"Rendering your vision into reality…",
];

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load this future vision";
pub const TIMED_OUT_MESSAGE: &str = "This future is taking too long to arrive";

#[derive(Clone, Debug, PartialEq)]
pub enum GenerationView {
	Loading,
	Ready(GenerationResult),
	Failed(String),
	TimedOut,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationTracker {
	view: GenerationView,
	polls: u32,
	started_at: DateTime<Utc>,
	max_wait: Option<Duration>,
	message_index: usize,
}

impl GenerationTracker {
	/// Creates a tracker for polling that began at `started_at`. Without a wait limit it stays in
	/// [GenerationView::Loading] for as long as the job reports a pending status.
	pub fn new(max_wait: Option<Duration>, started_at: DateTime<Utc>) -> Self {
		Self {
			view: GenerationView::Loading,
			polls: 0,
			started_at,
			max_wait,
			message_index: 0,
		}
	}

	pub fn set_max_wait(&mut self, max_wait: Option<Duration>) {
		self.max_wait = max_wait;
	}

	pub fn view(&self) -> &GenerationView {
		&self.view
	}

	pub fn is_terminal(&self) -> bool {
		!matches!(self.view, GenerationView::Loading)
	}

	pub fn polls(&self) -> u32 {
		self.polls
	}

	fn waited_too_long(&self, now: DateTime<Utc>) -> bool {
		let Some(max_wait) = self.max_wait else {
			return false;
		};
		// A clock that went backwards counts as no time elapsed.
		let elapsed = (now - self.started_at).to_std().unwrap_or_default();
		elapsed >= max_wait
	}

	/// Times out a still-loading tracker once the wait limit has passed, even while a fetch is outstanding.
	pub fn check_deadline(&mut self, now: DateTime<Utc>) -> &GenerationView {
		if !self.is_terminal() && self.waited_too_long(now) {
			self.view = GenerationView::TimedOut;
		}
		&self.view
	}

	/// Records the result of one status fetch completed at `now`. Fetch failures are terminal, as is an error status.
	/// Observations after the tracker reaches a terminal state are ignored.
	pub fn observe(&mut self, fetched: Result<GenerationResult, String>, now: DateTime<Utc>) -> &GenerationView {
		if self.is_terminal() {
			return &self.view;
		}
		self.polls = self.polls.saturating_add(1);

		self.view = match fetched {
			Ok(result) => match result.status {
				GenerationStatus::Success => GenerationView::Ready(result),
				GenerationStatus::Error => GenerationView::Failed(String::from(LOAD_FAILED_MESSAGE)),
				GenerationStatus::Pending if self.waited_too_long(now) => GenerationView::TimedOut,
				GenerationStatus::Pending => GenerationView::Loading,
			},
			Err(error) => GenerationView::Failed(error),
		};
		&self.view
	}

	pub fn advance_message(&mut self) {
		self.message_index = (self.message_index + 1) % LOADING_MESSAGES.len();
	}

	pub fn loading_message(&self) -> &'static str {
		LOADING_MESSAGES[self.message_index]
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeDelta, TimeZone};

	fn start() -> DateTime<Utc> {
		Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
	}

	fn after_secs(secs: i64) -> DateTime<Utc> {
		start() + TimeDelta::seconds(secs)
	}

	fn pending() -> GenerationResult {
		GenerationResult {
			status: GenerationStatus::Pending,
			image_reference: String::new(),
			story: String::new(),
		}
	}

	#[test]
	fn never_terminal_job_keeps_loading_without_limit() {
		let mut tracker = GenerationTracker::new(None, start());
		for poll in 0..10_000 {
			assert_eq!(tracker.observe(Ok(pending()), after_secs(poll * 2)), &GenerationView::Loading);
		}
		assert_eq!(tracker.check_deadline(after_secs(1_000_000)), &GenerationView::Loading);
		assert!(!tracker.is_terminal());
		assert_eq!(tracker.polls(), 10_000);
	}

	#[test]
	fn wait_limit_ends_in_timeout() {
		let mut tracker = GenerationTracker::new(Some(Duration::from_secs(5)), start());
		assert_eq!(tracker.observe(Ok(pending()), after_secs(2)), &GenerationView::Loading);
		assert_eq!(tracker.observe(Ok(pending()), after_secs(4)), &GenerationView::Loading);
		assert_eq!(tracker.observe(Ok(pending()), after_secs(6)), &GenerationView::TimedOut);
		assert!(tracker.is_terminal());
	}

	#[test]
	fn slow_fetches_still_time_out_on_elapsed_time() {
		let mut tracker = GenerationTracker::new(Some(Duration::from_secs(4)), start());
		assert_eq!(tracker.observe(Ok(pending()), after_secs(10)), &GenerationView::TimedOut);
		assert_eq!(tracker.polls(), 1);
	}

	#[test]
	fn deadline_passes_while_a_fetch_is_outstanding() {
		let mut tracker = GenerationTracker::new(Some(Duration::from_secs(4)), start());
		assert_eq!(tracker.check_deadline(after_secs(3)), &GenerationView::Loading);
		assert_eq!(tracker.check_deadline(after_secs(4)), &GenerationView::TimedOut);
		assert_eq!(tracker.polls(), 0);

		let ready = GenerationResult {
			status: GenerationStatus::Success,
			..pending()
		};
		assert_eq!(tracker.observe(Ok(ready), after_secs(5)), &GenerationView::TimedOut);
	}

	#[test]
	fn limit_learned_late_counts_from_the_start() {
		let mut tracker = GenerationTracker::new(None, start());
		assert_eq!(tracker.observe(Ok(pending()), after_secs(2)), &GenerationView::Loading);
		tracker.set_max_wait(Some(Duration::from_secs(3)));
		assert_eq!(tracker.check_deadline(after_secs(3)), &GenerationView::TimedOut);
	}

	#[test]
	fn success_is_terminal_and_sticky() {
		let mut tracker = GenerationTracker::new(None, start());
		let ready = GenerationResult {
			status: GenerationStatus::Success,
			image_reference: String::from("https://images.example/future.png"),
			story: String::from("Bright."),
		};
		tracker.observe(Ok(pending()), after_secs(2));
		assert_eq!(tracker.observe(Ok(ready.clone()), after_secs(4)), &GenerationView::Ready(ready.clone()));
		tracker.observe(Err(String::from("late failure")), after_secs(6));
		assert_eq!(tracker.view(), &GenerationView::Ready(ready));
		assert_eq!(tracker.polls(), 2);
	}

	#[test]
	fn error_status_and_fetch_failure_are_terminal() {
		let mut tracker = GenerationTracker::new(None, start());
		let errored = GenerationResult {
			status: GenerationStatus::Error,
			..pending()
		};
		assert_eq!(
			tracker.observe(Ok(errored), after_secs(2)),
			&GenerationView::Failed(String::from(LOAD_FAILED_MESSAGE))
		);

		let mut tracker = GenerationTracker::new(None, start());
		assert_eq!(
			tracker.observe(Err(String::from("unreachable")), after_secs(2)),
			&GenerationView::Failed(String::from("unreachable"))
		);
	}

	#[test]
	fn loading_messages_rotate() {
		let mut tracker = GenerationTracker::new(None, start());
		let first = tracker.loading_message();
		for _ in 0..LOADING_MESSAGES.len() {
			tracker.advance_message();
		}
		assert_eq!(tracker.loading_message(), first);
		tracker.advance_message();
		assert_eq!(tracker.loading_message(), LOADING_MESSAGES[1]);
	}
}
