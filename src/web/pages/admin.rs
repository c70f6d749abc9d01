// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::header::PageHeader;
use super::utils::alert;
use crate::model::{DisplayState, describe_time_since, format_count, format_percentage};
use chrono::{DateTime, Utc};
use leptos::ev::{MouseEvent, SubmitEvent};
use leptos::prelude::*;
use leptos::task::spawn_local;
use serde::{Deserialize, Serialize};

/// Everything the admin panel shows. Only sent to logged-in administrators.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AdminOverview {
	pub state: DisplayState,
	pub validation_endpoint: String,
	pub last_poll: Option<PollSummary>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PollSummary {
	pub checked_at: DateTime<Utc>,
	pub description: String,
	pub clean: bool,
}

#[component]
pub fn AdminPanel() -> impl IntoView {
	let (refresh_count, set_refresh_count) = signal(0u32);
	let overview = Resource::new(move || refresh_count.get(), |_| get_admin_overview());

	view! {
		<PageHeader />
		<main id="admin_page">
			<Transition fallback=|| view! { <div class="admin_loading">"Loading..."</div> }>
				{
					move || overview.get().map(|overview| match overview {
						Ok(Some(overview)) => view! { <AdminDashboard overview set_refresh_count /> }.into_any(),
						Ok(None) => view! { <AdminLogin set_refresh_count /> }.into_any(),
						Err(_) => view! {
							<div class="admin_error">"Couldn't load the admin panel."</div>
						}.into_any(),
					})
				}
			</Transition>
		</main>
	}
}

#[component]
fn AdminLogin(set_refresh_count: WriteSignal<u32>) -> impl IntoView {
	let (password, set_password) = signal(String::new());

	let login_submit = move |event: SubmitEvent| {
		event.prevent_default();
		let entered_password = password.get();
		spawn_local(async move {
			match admin_login(entered_password).await {
				Ok(true) => set_refresh_count.update(|count| *count += 1),
				Ok(false) => {
					set_password.set(String::new());
					alert("Invalid password");
				}
				Err(error) => {
					leptos::logging::error!("Login failed: {}", error);
					alert("Login failed. Please try again.");
				}
			}
		});
	};

	view! {
		<section id="admin_login" class="panel">
			<h1>"Admin Access"</h1>
			<p>"Enter password to manage the portal"</p>
			<form on:submit=login_submit>
				<input
					type="password"
					placeholder="Password"
					autocomplete="current-password"
					bind:value=(password, set_password)
					required
				/>
				<button type="submit">"Access Admin Panel"</button>
			</form>
		</section>
	}
}

#[component]
fn AdminDashboard(overview: AdminOverview, set_refresh_count: WriteSignal<u32>) -> impl IntoView {
	let state = overview.state;
	let refresh = move || set_refresh_count.update(|count| *count += 1);

	let (tickets_claimed, set_tickets_claimed) = signal(state.tickets_claimed.to_string());
	let (tickets_verified, set_tickets_verified) = signal(state.tickets_verified.to_string());
	let (goal, set_goal) = signal(state.goal.to_string());
	let (status_message, set_status_message) = signal(state.status_message.clone());
	let (checking, set_checking) = signal(state.validation_in_progress);

	let settings_submit = move |event: SubmitEvent| {
		event.prevent_default();
		let parsed = (
			tickets_claimed.with(|count| count.trim().parse::<u64>()),
			tickets_verified.with(|count| count.trim().parse::<u64>()),
			goal.with(|count| count.trim().parse::<u64>()),
		);
		let (Ok(claimed), Ok(verified), Ok(goal)) = parsed else {
			alert("Ticket counts and the goal must be whole numbers.");
			return;
		};
		if goal == 0 {
			alert("The goal must be at least 1.");
			return;
		}

		let message = status_message.get();
		spawn_local(async move {
			match update_display_settings(claimed, verified, goal, message).await {
				Ok(_) => {
					alert("Settings saved successfully!");
					refresh();
				}
				Err(error) => {
					leptos::logging::error!("Failed to save settings: {}", error);
					alert("Failed to save settings.");
				}
			}
		});
	};

	let check_click = move |_: MouseEvent| {
		set_checking.set(true);
		spawn_local(async move {
			if let Err(error) = admin_check_validation().await {
				leptos::logging::error!("Validation check failed: {}", error);
			}
			set_checking.set(false);
			refresh();
		});
	};

	let logout_click = move |_: MouseEvent| {
		spawn_local(async move {
			if let Err(error) = admin_logout().await {
				leptos::logging::error!("Logout failed: {}", error);
			}
			refresh();
		});
	};

	let unlock_card = if state.is_unlocked {
		view! {
			<div class="stats_card unlocked">
				<span class="stats_value">"Unlocked"</span>
				<span class="stats_label">"Status"</span>
			</div>
		}
		.into_any()
	} else {
		view! {
			<div class="stats_card">
				<span class="stats_value">{format_count(state.verified_remaining())}</span>
				<span class="stats_label">"Verified Remaining"</span>
			</div>
		}
		.into_any()
	};

	let last_poll = match overview.last_poll {
		Some(poll) => view! {
			<p class={if poll.clean { "poll_report" } else { "poll_report poll_report_problem" }}>
				{poll.checked_at.to_rfc3339()} ": " {poll.description}
			</p>
		}
		.into_any(),
		None => view! { <p class="poll_report">"No validation check has completed yet."</p> }.into_any(),
	};

	view! {
		<div id="admin_heading">
			<h1>"Admin Panel"</h1>
			<button type="button" on:click=logout_click>"Log Out"</button>
		</div>
		<section id="admin_stats">
			<div class="stats_card">
				<span class="stats_value">{format_count(state.tickets_claimed)}</span>
				<span class="stats_label">"Tickets Claimed"</span>
			</div>
			<div class="stats_card">
				<span class="stats_value">{format_count(state.tickets_verified)}</span>
				<span class="stats_label">"Tickets Verified"</span>
			</div>
			<div class="stats_card">
				<span class="stats_value">{format_percentage(state.verified_percentage())}</span>
				<span class="stats_label">"Verified Progress"</span>
			</div>
			{unlock_card}
		</section>
		<section id="admin_validation" class="panel">
			<h3>"Validation System"</h3>
			<div class="admin_field">
				<span class="admin_field_label">"Validation Endpoint:"</span>
				<code>{overview.validation_endpoint}</code>
			</div>
			<div class="admin_field">
				<span class="admin_field_label">"Last Check:"</span>
				<span>{describe_time_since(state.last_validation_check, Utc::now())}</span>
			</div>
			{last_poll}
			<button type="button" on:click=check_click disabled=move || checking.get()>
				{move || if checking.get() { "Checking..." } else { "Check Validation" }}
			</button>
		</section>
		<section id="admin_settings" class="panel">
			<h2>"Manage Portal Settings"</h2>
			<form on:submit=settings_submit>
				<label>
					<span>"Tickets Claimed"</span>
					<input type="number" min="0" bind:value=(tickets_claimed, set_tickets_claimed) />
				</label>
				<label>
					<span>"Tickets Verified"</span>
					<input type="number" min="0" bind:value=(tickets_verified, set_tickets_verified) />
				</label>
				<label>
					<span>"Goal"</span>
					<input type="number" min="1" bind:value=(goal, set_goal) />
				</label>
				<label>
					<span>"Status Message"</span>
					<textarea
						prop:value=move || status_message.get()
						on:input=move |event| set_status_message.set(event_target_value(&event))
					/>
				</label>
				<button type="submit">"Save Settings"</button>
			</form>
		</section>
	}
}

#[server]
async fn admin_login(password: String) -> Result<bool, ServerFnError> {
	use super::server_utils::get_session_from_request;
	use crate::web::session_key::ADMIN_AUTHENTICATED;
	use crate::web::state::AppState;

	let state = expect_context::<AppState>();
	if !state.admin_gate.verify(&password) {
		tracing::warn!("Failed admin login attempt");
		return Ok(false);
	}

	let session = get_session_from_request().await?;
	session.cycle_id().await?;
	session.insert(ADMIN_AUTHENTICATED, true).await?;
	tracing::info!("Administrator logged in");
	Ok(true)
}

#[server]
async fn admin_logout() -> Result<(), ServerFnError> {
	use super::server_utils::get_session_from_request;

	let session = get_session_from_request().await?;
	session.flush().await?;
	tracing::info!("Administrator logged out");
	Ok(())
}

/// Gets the admin panel contents, or `None` if the request isn't from a logged-in administrator.
#[server]
async fn get_admin_overview() -> Result<Option<AdminOverview>, ServerFnError> {
	use super::server_utils::is_admin_request;
	use crate::web::state::AppState;

	if !is_admin_request().await? {
		return Ok(None);
	}

	let state = expect_context::<AppState>();
	let last_poll = state.validation_poller.last_report().map(|report| PollSummary {
		checked_at: report.checked_at,
		description: report.to_string(),
		clean: report.is_clean(),
	});
	Ok(Some(AdminOverview {
		state: state.display_state.snapshot(),
		validation_endpoint: state.config.validation.endpoint.to_string(),
		last_poll,
	}))
}

#[server]
async fn admin_check_validation() -> Result<(), ServerFnError> {
	use super::server_utils::require_admin;
	use crate::web::state::AppState;

	require_admin().await?;
	let state = expect_context::<AppState>();
	state.validation_poller.poll_once().await;
	Ok(())
}

#[server]
async fn update_display_settings(
	tickets_claimed: u64,
	tickets_verified: u64,
	goal: u64,
	status_message: String,
) -> Result<DisplayState, ServerFnError> {
	use super::server_utils::require_admin;
	use crate::state::DisplaySettings;
	use crate::web::state::AppState;

	require_admin().await?;
	let state = expect_context::<AppState>();
	let updated = state.display_state.apply_settings(DisplaySettings {
		tickets_claimed,
		tickets_verified,
		goal,
		status_message,
	})?;
	tracing::info!(
		tickets_claimed = updated.tickets_claimed,
		tickets_verified = updated.tickets_verified,
		goal = updated.goal,
		"Display settings updated"
	);
	Ok(updated)
}
