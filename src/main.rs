// © 2024 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(feature = "ssr")]
#[tokio::main]
async fn main() -> miette::Result<()> {
	use future_portal::config::parse_config;
	use future_portal::generation::GenerationClient;
	use future_portal::state::{DisplayStateManager, FileStore, MemoryStore, StateStore};
	use future_portal::supervisor::supervise;
	use future_portal::validation::{HttpCountSource, ValidationPoller};
	use future_portal::web::server::run_server_task;
	use std::sync::Arc;
	use tokio::sync::watch;

	tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

	let config = Arc::new(parse_config("config.kdl").await?);

	let store: Box<dyn StateStore> = match &config.state_file {
		Some(path) => Box::new(FileStore::new(path)),
		None => {
			tracing::warn!("No state file configured; display state will be lost on restart");
			Box::new(MemoryStore::new())
		}
	};
	let display_state = Arc::new(DisplayStateManager::load(store));

	let (live_sender, live) = watch::channel(true);

	let count_source = Arc::new(HttpCountSource::new(&config.validation)?);
	tracing::info!(endpoint = %count_source.endpoint(), "Validating payments");
	let validation_poller = Arc::new(ValidationPoller::new(
		Arc::clone(&display_state),
		count_source,
		config.validation.fallback,
		live.clone(),
	));
	let poller_task = tokio::spawn(Arc::clone(&validation_poller).run(config.validation.interval));

	let generation = GenerationClient::new(
		&config.generation,
		&config.email_capture,
		config.validation.token.clone(),
	)?;

	let server_task = tokio::spawn(run_server_task(
		Arc::clone(&config),
		display_state,
		validation_poller,
		generation,
		live,
	));

	supervise(tokio::signal::ctrl_c(), live_sender, poller_task, server_task).await
}

#[cfg(not(feature = "ssr"))]
fn main() {}
