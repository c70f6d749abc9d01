// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keeps the background tasks running until shutdown is requested or the web server stops on its own.

use miette::IntoDiagnostic;
use std::future::Future;
use std::io;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Waits for the shutdown signal or for the server task to end, whichever comes first, then stops the poller and
/// waits for both tasks. Fails if the server ended without being asked to.
pub async fn supervise(
	shutdown_signal: impl Future<Output = io::Result<()>>,
	live: watch::Sender<bool>,
	poller_task: JoinHandle<()>,
	mut server_task: JoinHandle<()>,
) -> miette::Result<()> {
	let server_ended = tokio::select! {
		signal = shutdown_signal => {
			if let Err(error) = signal {
				tracing::error!(source = ?error, "Failed to listen for the shutdown signal");
			}
			tracing::info!("Shutting down");
			false
		}
		joined = &mut server_task => {
			if let Err(error) = joined {
				tracing::error!(source = ?error, "Web server task panicked");
			}
			tracing::error!("Web server stopped; shutting down");
			true
		}
	};

	// Receivers may already be gone if both tasks ended; there's nothing left to notify then.
	let _ = live.send(false);
	poller_task.await.into_diagnostic()?;

	if server_ended {
		return Err(miette::miette!("Web server stopped unexpectedly"));
	}
	server_task.await.into_diagnostic()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::future::pending;

	fn until_stopped(mut live: watch::Receiver<bool>) -> JoinHandle<()> {
		tokio::spawn(async move {
			let _ = live.wait_for(|live| !*live).await;
		})
	}

	#[tokio::test]
	async fn server_failure_stops_the_poller_and_fails() {
		let (live_sender, live) = watch::channel(true);
		let poller_task = until_stopped(live.clone());
		let server_task = tokio::spawn(async {});

		let result = supervise(pending::<io::Result<()>>(), live_sender, poller_task, server_task).await;
		assert!(result.is_err());
		assert!(!*live.borrow());
	}

	#[tokio::test]
	async fn shutdown_signal_stops_both_tasks_cleanly() {
		let (live_sender, live) = watch::channel(true);
		let poller_task = until_stopped(live.clone());
		let server_task = until_stopped(live.clone());

		let result = supervise(async { io::Result::Ok(()) }, live_sender, poller_task, server_task).await;
		assert!(result.is_ok());
		assert!(!*live.borrow());
	}
}
