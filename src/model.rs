// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use pulldown_cmark::{Event, Options, Parser, html};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TICKETS_CLAIMED: u64 = 1247;
pub const DEFAULT_TICKETS_VERIFIED: u64 = 892;
pub const DEFAULT_GOAL: u64 = 5000;
pub const DEFAULT_STATUS_MESSAGE: &str = "The future awaits your contribution. Every verified ticket brings us closer to unlocking tomorrow's possibilities.";

/// The counters and message shown on the landing page.
///
/// The serialized form doubles as the persisted record, so field names follow the record's camelCase keys and the
/// last check time is stored as milliseconds since the epoch.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayState {
	pub tickets_claimed: u64,
	/// Tickets confirmed by the validation service. Expected not to exceed [Self::tickets_claimed], but nothing
	/// enforces that.
	pub tickets_verified: u64,
	/// Always greater than zero.
	pub goal: u64,
	pub status_message: String,
	/// Derived; see [Self::recompute_unlocked].
	pub is_unlocked: bool,
	#[serde(with = "chrono::serde::ts_milliseconds")]
	pub last_validation_check: DateTime<Utc>,
	pub validation_in_progress: bool,
}

impl DisplayState {
	/// Gets the default state, using the given time as the last validation check.
	pub fn default_at(now: DateTime<Utc>) -> Self {
		let mut state = Self {
			tickets_claimed: DEFAULT_TICKETS_CLAIMED,
			tickets_verified: DEFAULT_TICKETS_VERIFIED,
			goal: DEFAULT_GOAL,
			status_message: String::from(DEFAULT_STATUS_MESSAGE),
			is_unlocked: false,
			last_validation_check: now,
			validation_in_progress: false,
		};
		state.recompute_unlocked();
		state
	}

	pub fn recompute_unlocked(&mut self) {
		self.is_unlocked = is_unlocked(self.tickets_verified, self.goal);
	}

	pub fn claimed_percentage(&self) -> f64 {
		goal_percentage(self.tickets_claimed, self.goal)
	}

	pub fn verified_percentage(&self) -> f64 {
		goal_percentage(self.tickets_verified, self.goal)
	}

	/// Number of verified tickets still needed to reach the goal.
	pub fn verified_remaining(&self) -> u64 {
		self.goal.saturating_sub(self.tickets_verified)
	}
}

impl Default for DisplayState {
	fn default() -> Self {
		Self::default_at(Utc::now())
	}
}

pub fn is_unlocked(tickets_verified: u64, goal: u64) -> bool {
	tickets_verified >= goal
}

/// Percentage of the goal reached by `count`, capped at 100.
pub fn goal_percentage(count: u64, goal: u64) -> f64 {
	if goal == 0 {
		return 100.0;
	}
	let percentage = (count as f64 / goal as f64) * 100.0;
	percentage.min(100.0)
}

/// Formats a percentage with one decimal place, e.g. `17.8%`.
pub fn format_percentage(percentage: f64) -> String {
	format!("{:.1}%", percentage)
}

/// Formats a count with comma thousands separators.
pub fn format_count(count: u64) -> String {
	let digits = count.to_string();
	let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
	for (index, digit) in digits.chars().enumerate() {
		if index > 0 && (digits.len() - index) % 3 == 0 {
			formatted.push(',');
		}
		formatted.push(digit);
	}
	formatted
}

/// Describes how long ago the last validation check happened, in seconds under a minute and whole minutes after.
pub fn describe_time_since(last_check: DateTime<Utc>, now: DateTime<Utc>) -> String {
	let seconds = (now - last_check).num_seconds().max(0);
	if seconds < 60 {
		format!("{}s ago", seconds)
	} else {
		format!("{}m ago", seconds / 60)
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
	Pending,
	Success,
	Error,
}

impl GenerationStatus {
	/// Maps the status string reported by the generation service. Anything other than a terminal status means the job
	/// is still running.
	pub fn from_reported(status: &str) -> Self {
		match status {
			"success" => Self::Success,
			"error" => Self::Error,
			_ => Self::Pending,
		}
	}

	pub fn is_terminal(&self) -> bool {
		!matches!(self, Self::Pending)
	}
}

/// The outcome of a future vision generation job.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GenerationResult {
	pub status: GenerationStatus,
	/// Fully resolved image URL.
	pub image_reference: String,
	/// Markdown narrative.
	pub story: String,
}

impl GenerationResult {
	/// Renders the markdown story to HTML. Raw HTML in the story is shown as text rather than passed through.
	pub fn story_html(&self) -> String {
		let parser = Parser::new_ext(&self.story, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
			Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
			event => event,
		});
		let mut rendered = String::new();
		html::push_html(&mut rendered, parser);
		rendered
	}
}

/// Builds the public URL at which a generated future can be viewed.
pub fn share_url(base_url: &str, generation_id: &str) -> String {
	format!("{}/future/{}", base_url.trim_end_matches('/'), generation_id)
}

/// Builds a Twitter intent link sharing the given URL.
pub fn twitter_intent_url(text: &str, url: &str) -> String {
	let tweet = format!("{} {} #TicketsToTheFuture", text, url);
	format!("https://twitter.com/intent/tweet?text={}", urlencoding::encode(&tweet))
}
