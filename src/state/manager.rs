// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::store::StateStore;
use crate::model::DisplayState;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Debug, Diagnostic, Error, Eq, PartialEq)]
pub enum StateError {
	#[error("the goal must be greater than zero")]
	ZeroGoal,
}

/// All of the operator-editable fields, applied together from the admin panel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DisplaySettings {
	pub tickets_claimed: u64,
	pub tickets_verified: u64,
	pub goal: u64,
	pub status_message: String,
}

/// Owns the display state. Every mutation recomputes whether the goal is unlocked and writes the record back to the
/// store before the lock is released, so the store always holds the latest state.
#[derive(Debug)]
pub struct DisplayStateManager {
	state: Mutex<DisplayState>,
	store: Box<dyn StateStore>,
	poll_in_flight: AtomicBool,
}

impl DisplayStateManager {
	pub fn load(store: Box<dyn StateStore>) -> Self {
		Self::load_at(store, Utc::now())
	}

	/// Loads the state from the store, using `now` as the last check time wherever a default is needed.
	pub fn load_at(store: Box<dyn StateStore>, now: DateTime<Utc>) -> Self {
		let state = match store.read() {
			Ok(Some(contents)) => parse_persisted_state(&contents, now),
			Ok(None) => DisplayState::default_at(now),
			Err(error) => {
				tracing::warn!(source = ?error, "Failed to read persisted display state; using defaults");
				DisplayState::default_at(now)
			}
		};

		Self {
			state: Mutex::new(state),
			store,
			poll_in_flight: AtomicBool::new(false),
		}
	}

	pub fn snapshot(&self) -> DisplayState {
		let mut state = self.lock().clone();
		state.validation_in_progress = self.poll_in_flight.load(Ordering::Acquire);
		state
	}

	pub fn set_tickets_claimed(&self, count: u64) -> DisplayState {
		self.mutate(|state| state.tickets_claimed = count)
	}

	pub fn set_tickets_verified(&self, count: u64) -> DisplayState {
		self.mutate(|state| state.tickets_verified = count)
	}

	pub fn set_goal(&self, goal: u64) -> Result<DisplayState, StateError> {
		if goal == 0 {
			return Err(StateError::ZeroGoal);
		}
		Ok(self.mutate(|state| state.goal = goal))
	}

	pub fn set_status_message(&self, message: impl Into<String>) -> DisplayState {
		let message = message.into();
		self.mutate(|state| state.status_message = message)
	}

	/// Records one more claimed ticket, returning the new claimed count.
	pub fn increment_tickets_claimed(&self) -> u64 {
		self.mutate(|state| state.tickets_claimed = state.tickets_claimed.saturating_add(1))
			.tickets_claimed
	}

	pub fn apply_settings(&self, settings: DisplaySettings) -> Result<DisplayState, StateError> {
		if settings.goal == 0 {
			return Err(StateError::ZeroGoal);
		}
		Ok(self.mutate(|state| {
			state.tickets_claimed = settings.tickets_claimed;
			state.tickets_verified = settings.tickets_verified;
			state.goal = settings.goal;
			state.status_message = settings.status_message;
		}))
	}

	/// Applies the outcome of a validation poll completed at `checked_at`.
	pub fn record_validation(&self, checked_at: DateTime<Utc>, change: impl FnOnce(&mut DisplayState)) -> DisplayState {
		self.mutate(|state| {
			change(state);
			state.last_validation_check = checked_at;
		})
	}

	/// Marks a validation poll as in flight. Returns `None` if one already is. The flag is cleared when the guard is
	/// dropped, including during unwinding.
	pub fn try_begin_poll(&self) -> Option<PollGuard<'_>> {
		self.poll_in_flight
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| PollGuard {
				flag: &self.poll_in_flight,
			})
	}

	pub fn poll_in_flight(&self) -> bool {
		self.poll_in_flight.load(Ordering::Acquire)
	}

	fn lock(&self) -> MutexGuard<'_, DisplayState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn mutate(&self, change: impl FnOnce(&mut DisplayState)) -> DisplayState {
		let mut state = self.lock();
		change(&mut state);
		state.recompute_unlocked();
		self.save(&state);
		let mut snapshot = state.clone();
		snapshot.validation_in_progress = self.poll_in_flight();
		snapshot
	}

	fn save(&self, state: &DisplayState) {
		let record = match serde_json::to_string(state) {
			Ok(record) => record,
			Err(error) => {
				tracing::warn!(source = ?error, "Failed to serialize display state");
				return;
			}
		};
		if let Err(error) = self.store.write(&record) {
			tracing::warn!(source = ?error, "Failed to persist display state");
		}
	}
}

#[derive(Debug)]
pub struct PollGuard<'a> {
	flag: &'a AtomicBool,
}

impl Drop for PollGuard<'_> {
	fn drop(&mut self) {
		self.flag.store(false, Ordering::Release);
	}
}

/// Rebuilds the display state from a persisted record. Each field that is missing or fails its type check falls back
/// to its default on its own; a record that isn't a JSON object falls back entirely.
pub fn parse_persisted_state(contents: &str, now: DateTime<Utc>) -> DisplayState {
	let defaults = DisplayState::default_at(now);

	let record: Value = match serde_json::from_str(contents) {
		Ok(record) => record,
		Err(error) => {
			tracing::warn!(source = ?error, "Persisted display state is not valid JSON; using defaults");
			return defaults;
		}
	};
	let Some(record) = record.as_object() else {
		tracing::warn!("Persisted display state is not an object; using defaults");
		return defaults;
	};

	let goal = match count_field(record, "goal") {
		Some(0) => {
			tracing::warn!(field = "goal", "Persisted display state field is malformed; using default");
			None
		}
		goal => goal,
	};
	let status_message = match record.get("statusMessage") {
		None => None,
		Some(Value::String(message)) => Some(message.clone()),
		Some(_) => {
			tracing::warn!(field = "statusMessage", "Persisted display state field is malformed; using default");
			None
		}
	};

	let mut state = DisplayState {
		tickets_claimed: count_field(record, "ticketsClaimed").unwrap_or(defaults.tickets_claimed),
		tickets_verified: count_field(record, "ticketsVerified").unwrap_or(defaults.tickets_verified),
		goal: goal.unwrap_or(defaults.goal),
		status_message: status_message.unwrap_or(defaults.status_message),
		is_unlocked: false,
		last_validation_check: timestamp_field(record, "lastValidationCheck").unwrap_or(now),
		validation_in_progress: false,
	};
	state.recompute_unlocked();
	state
}

/// Reads a non-negative numeric field, truncating fractions.
fn count_field(record: &Map<String, Value>, name: &str) -> Option<u64> {
	let value = record.get(name)?;
	let count = value.as_u64().or_else(|| {
		value
			.as_f64()
			.filter(|number| number.is_finite() && *number >= 0.0 && *number < u64::MAX as f64)
			.map(|number| number.trunc() as u64)
	});
	if count.is_none() {
		tracing::warn!(field = name, "Persisted display state field is malformed; using default");
	}
	count
}

fn timestamp_field(record: &Map<String, Value>, name: &str) -> Option<DateTime<Utc>> {
	let value = record.get(name)?;
	let timestamp = value
		.as_i64()
		.or_else(|| value.as_f64().filter(|number| number.is_finite()).map(|number| number.trunc() as i64))
		.and_then(DateTime::from_timestamp_millis);
	if timestamp.is_none() {
		tracing::warn!(field = name, "Persisted display state field is malformed; using default");
	}
	timestamp
}
