// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::web::session_key::ADMIN_AUTHENTICATED;
use crate::web::state::AppState;
use leptos::prelude::*;
use leptos_axum::extract_with_state;
use tower_sessions::session::Session;

/// Gets the session for a request.
/// Must be used from a server function; relies on extracting request data.
pub async fn get_session_from_request() -> Result<Session, ServerFnError> {
	let state: AppState = expect_context();
	let session: Session = extract_with_state(&state).await?;
	Ok(session)
}

/// Checks whether the request's session has logged in to the admin panel.
/// Must be used from a server function; relies on extracting request data.
pub async fn is_admin_request() -> Result<bool, ServerFnError> {
	let session = get_session_from_request().await?;
	let authenticated: Option<bool> = session.get(ADMIN_AUTHENTICATED).await?;
	Ok(authenticated.unwrap_or(false))
}

/// Fails unless the request's session has logged in to the admin panel.
pub async fn require_admin() -> Result<(), ServerFnError> {
	if is_admin_request().await? {
		Ok(())
	} else {
		Err(ServerFnError::ServerError(String::from(
			"Administrator login required",
		)))
	}
}
