// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::pages::app::App;
use super::pages::shell::shell;
use super::state::AppState;
use crate::admin::AdminGate;
use crate::config::ConfigData;
use crate::generation::GenerationClient;
use crate::state::DisplayStateManager;
use crate::validation::ValidationPoller;
use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use leptos::logging::log;
use leptos::prelude::*;
use leptos_axum::{LeptosRoutes, generate_route_list, render_app_to_stream};
use miette::IntoDiagnostic;
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower::util::ServiceExt;
use tower_http::services::ServeDir;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

/// Administrator sessions end after this long without a request.
const SESSION_INACTIVITY_LIMIT: Duration = Duration::hours(12);

pub async fn run_server_task(
	config: Arc<ConfigData>,
	display_state: Arc<DisplayStateManager>,
	validation_poller: Arc<ValidationPoller>,
	generation: GenerationClient,
	live: watch::Receiver<bool>,
) {
	let task_result = run_server(config, display_state, validation_poller, generation, live).await;
	if let Err(error) = task_result {
		tracing::error!(source = ?error, "Web server failed to run");
	}
}

async fn run_server(
	config: Arc<ConfigData>,
	display_state: Arc<DisplayStateManager>,
	validation_poller: Arc<ValidationPoller>,
	generation: GenerationClient,
	live: watch::Receiver<bool>,
) -> miette::Result<()> {
	let web_config = get_configuration(None).into_diagnostic()?;
	let site_addr = &config.web.bind_addr;
	let leptos_options = web_config.leptos_options;
	let routes = generate_route_list(App);

	let session_layer = session_layer();

	let app_state = AppState {
		leptos_options,
		config: Arc::clone(&config),
		display_state,
		validation_poller,
		generation,
		admin_gate: AdminGate::new(&config.admin.password_sha256),
	};

	let app = Router::new()
		.leptos_routes_with_context(
			&app_state,
			routes,
			{
				let app_state = app_state.clone();
				move || provide_context(app_state.clone())
			},
			{
				let leptos_options = app_state.leptos_options.clone();
				move || shell(leptos_options.clone())
			},
		)
		.fallback(file_and_error_handler)
		.layer(ServiceBuilder::new().layer(session_layer))
		.with_state(app_state);

	log!("Listening on http://{}", &site_addr);
	let listener = TcpListener::bind(&site_addr).await.into_diagnostic()?;
	axum::serve(listener, app.into_make_service())
		.with_graceful_shutdown(wait_for_shutdown(live))
		.await
		.into_diagnostic()?;

	Ok(())
}

/// Sessions only carry the administrator flag, so they live in memory and a restart just means logging in again.
fn session_layer() -> SessionManagerLayer<MemoryStore> {
	SessionManagerLayer::new(MemoryStore::default())
		.with_same_site(SameSite::Lax)
		.with_expiry(Expiry::OnInactivity(SESSION_INACTIVITY_LIMIT))
}

/// Resolves once the liveness flag goes false or its sender is dropped.
async fn wait_for_shutdown(mut live: watch::Receiver<bool>) {
	while *live.borrow_and_update() {
		if live.changed().await.is_err() {
			break;
		}
	}
	tracing::info!("Web server shutting down");
}

async fn file_and_error_handler(uri: Uri, State(state): State<AppState>, request: Request) -> Response {
	let site_root_dir = state.leptos_options.site_root.clone();
	let response = get_static_file(uri.clone(), &site_root_dir).await;
	let response = match response {
		Ok(response) => response,
		Err(error) => return error.into_response(),
	};

	if response.status() == StatusCode::OK {
		response.into_response()
	} else {
		let handler = render_app_to_stream(App);
		handler(request).await.into_response()
	}
}

async fn get_static_file(uri: Uri, root: &str) -> Result<Response, StatusCode> {
	let Ok(request) = Request::builder().uri(uri.clone()).body(Body::empty()) else {
		return Err(StatusCode::INTERNAL_SERVER_ERROR);
	};

	match ServeDir::new(root).oneshot(request).await {
		Ok(response) => Ok(response.into_response()),
		Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
	}
}
