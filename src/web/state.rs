// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::admin::AdminGate;
use crate::config::ConfigData;
use crate::generation::GenerationClient;
use crate::state::DisplayStateManager;
use crate::validation::ValidationPoller;
use axum::extract::FromRef;
use leptos::config::LeptosOptions;
use std::sync::Arc;

#[derive(Clone, Debug, FromRef)]
pub struct AppState {
	pub leptos_options: LeptosOptions,
	pub config: Arc<ConfigData>,
	pub display_state: Arc<DisplayStateManager>,
	pub validation_poller: Arc<ValidationPoller>,
	pub generation: GenerationClient,
	pub admin_gate: AdminGate,
}
