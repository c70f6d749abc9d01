// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![cfg(feature = "ssr")]

use async_trait::async_trait;
use future_portal::state::{DisplaySettings, DisplayStateManager, FileStore};
use future_portal::validation::{CountKind, CountSource, FallbackPolicy, FetchError, PollOutcome, ValidationPoller};
use reqwest::StatusCode;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
struct FixedCounts {
	sold: Option<u64>,
	clicked: Option<u64>,
}

#[async_trait]
impl CountSource for FixedCounts {
	async fn fetch_count(&self, kind: CountKind) -> Result<u64, FetchError> {
		let count = match kind {
			CountKind::Sold => self.sold,
			CountKind::Clicked => self.clicked,
		};
		count.ok_or(FetchError::Status(StatusCode::BAD_GATEWAY))
	}
}

fn open(path: &Path) -> Arc<DisplayStateManager> {
	Arc::new(DisplayStateManager::load(Box::new(FileStore::new(path))))
}

fn poller(manager: &Arc<DisplayStateManager>, source: FixedCounts) -> (ValidationPoller, watch::Sender<bool>) {
	let (live_sender, live) = watch::channel(true);
	let poller = ValidationPoller::new(Arc::clone(manager), Arc::new(source), FallbackPolicy::Surface, live);
	(poller, live_sender)
}

#[tokio::test]
async fn polled_counts_survive_a_restart() {
	let directory = tempfile::tempdir().unwrap();
	let path = directory.path().join("state.json");

	let manager = open(&path);
	let (poller, _live) = poller(
		&manager,
		FixedCounts {
			sold: Some(5200),
			clicked: Some(6000),
		},
	);
	assert!(matches!(poller.poll_once().await, PollOutcome::Completed(_)));
	let before_restart = manager.snapshot();
	assert!(before_restart.is_unlocked);
	drop(poller);
	drop(manager);

	let restarted = open(&path).snapshot();
	assert_eq!(restarted.tickets_verified, 5200);
	assert_eq!(restarted.tickets_claimed, 6000);
	assert!(restarted.is_unlocked);
	assert!(!restarted.validation_in_progress);
	assert_eq!(
		restarted.last_validation_check.timestamp_millis(),
		before_restart.last_validation_check.timestamp_millis()
	);
}

#[tokio::test]
async fn admin_settings_and_outages_interleave() {
	let directory = tempfile::tempdir().unwrap();
	let path = directory.path().join("state.json");
	let manager = open(&path);

	manager
		.apply_settings(DisplaySettings {
			tickets_claimed: 100,
			tickets_verified: 40,
			goal: 50,
			status_message: String::from("Almost there"),
		})
		.unwrap();
	let claimed = manager.increment_tickets_claimed();
	assert_eq!(claimed, 101);

	let (poller, _live) = poller(
		&manager,
		FixedCounts {
			sold: None,
			clicked: None,
		},
	);
	let PollOutcome::Completed(report) = poller.poll_once().await else {
		panic!("poll didn't complete");
	};
	assert!(!report.is_clean());

	let restarted = open(&path).snapshot();
	assert_eq!(restarted.tickets_claimed, 101);
	assert_eq!(restarted.tickets_verified, 40);
	assert_eq!(restarted.goal, 50);
	assert_eq!(restarted.status_message, "Almost there");
	assert!(!restarted.is_unlocked);
}

#[test]
fn corrupt_state_file_loads_defaults() {
	let directory = tempfile::tempdir().unwrap();
	let path = directory.path().join("state.json");
	std::fs::write(&path, "{\"goal\": \"lots\", \"ticketsVerified\": 6000").unwrap();

	let state = open(&path).snapshot();
	assert_eq!(state.goal, 5000);
	assert_eq!(state.tickets_verified, 892);
}
