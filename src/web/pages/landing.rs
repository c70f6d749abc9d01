// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::header::PageHeader;
use super::utils::{alert, use_interval};
use crate::model::{DisplayState, describe_time_since, format_count, format_percentage};
use chrono::Utc;
use leptos::ev::{MouseEvent, SubmitEvent};
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_router::hooks::use_navigate;
use std::time::Duration;

const DISPLAY_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
const SUBMIT_FAILED_MESSAGE: &str = "Failed to submit your future vision. Please try again.";
const PAYMENT_LINK: &str = "https://www.paypal.biz/ticketstothefuture";
const CONTACT_EMAIL: &str = "info@up4thechallenge.org";

#[component]
pub fn Landing() -> impl IntoView {
	let (refresh_count, set_refresh_count) = signal(0u32);
	let display_state = Resource::new(move || refresh_count.get(), |_| get_display_state());
	let refresh = move || set_refresh_count.update(|count| *count += 1);
	use_interval(DISPLAY_REFRESH_INTERVAL, refresh);

	let (checking, set_checking) = signal(false);
	let (show_future_form, set_show_future_form) = signal(false);
	let (description, set_description) = signal(String::new());
	let (submitting, set_submitting) = signal(false);

	let validation_in_progress = move || {
		checking.get()
			|| display_state
				.read()
				.as_ref()
				.and_then(|state| state.as_ref().ok())
				.is_some_and(|state| state.validation_in_progress)
	};

	let refresh_click = move |_: MouseEvent| {
		set_checking.set(true);
		spawn_local(async move {
			if let Err(error) = check_validation().await {
				leptos::logging::error!("Validation check failed: {}", error);
			}
			set_checking.set(false);
			refresh();
		});
	};

	let claim_click = move |_: MouseEvent| {
		spawn_local(async move {
			if let Err(error) = claim_ticket().await {
				leptos::logging::error!("Failed to record ticket claim: {}", error);
			}
			refresh();
			set_show_future_form.set(true);
		});
	};

	let (submitted_id, set_submitted_id) = signal(None::<String>);
	let navigate = use_navigate();
	Effect::new(move |_| {
		if let Some(generation_id) = submitted_id.get() {
			navigate(&format!("/future/{}", generation_id), Default::default());
		}
	});

	let future_submit = move |event: SubmitEvent| {
		event.prevent_default();
		let future_description = description.get();
		if future_description.trim().is_empty() {
			return;
		}

		set_submitting.set(true);
		spawn_local(async move {
			match submit_future(future_description).await {
				Ok(generation_id) => {
					set_show_future_form.set(false);
					set_submitted_id.set(Some(generation_id));
				}
				Err(error) => {
					leptos::logging::error!("Error submitting future: {}", error);
					alert(SUBMIT_FAILED_MESSAGE);
				}
			}
			set_submitting.set(false);
		});
	};

	view! {
		<PageHeader>
			<button type="button" id="refresh_button" on:click=refresh_click disabled=validation_in_progress>
				"Refresh"
			</button>
		</PageHeader>
		<main id="landing_page">
			<section id="hero">
				<h1>"Tickets to the Future"</h1>
				<p class="hero_subtitle">"For just £1, secure your place in tomorrow's possibilities"</p>
			</section>
			<Transition fallback=|| view! { <div class="mission_status_loading">"Loading mission status..."</div> }>
				{
					move || display_state.get().map(|state| match state {
						Ok(state) => {
							let is_unlocked = state.is_unlocked;
							view! {
								<MissionStatus state />
								<Show when=move || !is_unlocked>
									<PaymentInstructions on_claim=claim_click />
								</Show>
							}.into_any()
						}
						Err(_) => view! {
							<div class="mission_status_error">"Couldn't load the mission status."</div>
						}.into_any(),
					})
				}
			</Transition>
			<Show when=move || show_future_form.get()>
				<section id="future_form" class="panel">
					<button
						type="button"
						class="close_button"
						on:click=move |_| set_show_future_form.set(false)
						disabled=move || submitting.get()
					>
						"Close"
					</button>
					<h3>"Describe Your Future"</h3>
					<p>"What future do you want to help create? Share your vision."</p>
					<form on:submit=future_submit>
						<textarea
							placeholder="Describe the future you want to see..."
							prop:value=move || description.get()
							on:input=move |event| set_description.set(event_target_value(&event))
							disabled=move || submitting.get()
							required
						/>
						<button
							type="submit"
							disabled=move || submitting.get() || description.with(|text| text.trim().is_empty())
						>
							{move || if submitting.get() { "Generating Your Future..." } else { "Generate My Future" }}
						</button>
					</form>
				</section>
			</Show>
			<section id="validation_info" class="panel">
				<h3>"Payment Validation"</h3>
				<p>
					"All payments are verified through our secure validation system before counting toward the goal. "
					"This ensures the integrity of our mission and prevents the future from being unlocked prematurely. "
					"Verification typically occurs within minutes of payment and is checked automatically every 30 seconds."
				</p>
			</section>
		</main>
		<footer id="footer">
			<p>"Not a security offering. This is about vibes, vision, and collective action."</p>
			<p>"Contact: " {CONTACT_EMAIL}</p>
		</footer>
	}
}

#[component]
fn MissionStatus(state: DisplayState) -> impl IntoView {
	if state.is_unlocked {
		return view! {
			<section id="mission_status" class="panel unlocked">
				<h2>"Future Unlocked!"</h2>
				<p>
					"Incredible! We've reached our verified goal. The timeline is now active and the future is unlocked for everyone!"
				</p>
			</section>
		}
		.into_any();
	}

	let claimed_percentage = state.claimed_percentage();
	let verified_percentage = state.verified_percentage();
	let last_check = describe_time_since(state.last_validation_check, Utc::now());

	view! {
		<section id="mission_status" class="panel">
			<h2>"Mission Status"</h2>
			<div class="progress_row">
				<div class="progress_label">
					<span>"Tickets Claimed"</span>
					<span>{format_count(state.tickets_claimed)} " / " {format_count(state.goal)}</span>
				</div>
				<div class="progress_bar">
					<div class="progress_fill claimed" style:width=format!("{}%", claimed_percentage)></div>
				</div>
				<div class="progress_percentage">{format_percentage(claimed_percentage)}</div>
			</div>
			<div class="progress_row">
				<div class="progress_label">
					<span>"Tickets Verified"</span>
					<span>{format_count(state.tickets_verified)} " / " {format_count(state.goal)}</span>
				</div>
				<div class="progress_bar">
					<div class="progress_fill verified" style:width=format!("{}%", verified_percentage)></div>
				</div>
				<div class="progress_percentage">{format_percentage(verified_percentage)}</div>
			</div>
			<div class="progress_meta">
				{
					if state.validation_in_progress {
						String::from("Checking validation...")
					} else {
						format!("Last checked {}", last_check)
					}
				}
			</div>
			<p class="status_message">{state.status_message}</p>
		</section>
	}
	.into_any()
}

#[component]
fn PaymentInstructions<F>(on_claim: F) -> impl IntoView
where
	F: Fn(MouseEvent) + Clone + Send + 'static,
{
	view! {
		<section id="payment" class="panel">
			<h3>"Secure Your Ticket"</h3>
			<a class="button" href=PAYMENT_LINK target="_blank" rel="noopener noreferrer">
				"Pay with PayPal"
			</a>
			<p>"Click the button above to pay £1 for your Ticket to the Future."</p>
			<button type="button" id="claim_button" on:click=on_claim>
				"I've Paid - Claim My Ticket"
			</button>
			<p>"Click after completing your payment. Verification will occur automatically."</p>
		</section>
	}
}

#[server]
async fn get_display_state() -> Result<DisplayState, ServerFnError> {
	use crate::web::state::AppState;

	let state = expect_context::<AppState>();
	Ok(state.display_state.snapshot())
}

/// Runs a validation check now, unless one is already running, and returns the resulting state.
#[server]
async fn check_validation() -> Result<DisplayState, ServerFnError> {
	use crate::web::state::AppState;

	let state = expect_context::<AppState>();
	state.validation_poller.poll_once().await;
	Ok(state.display_state.snapshot())
}

#[server]
async fn claim_ticket() -> Result<u64, ServerFnError> {
	use crate::web::state::AppState;

	let state = expect_context::<AppState>();
	let tickets_claimed = state.display_state.increment_tickets_claimed();
	tracing::info!(tickets_claimed, "Ticket claimed");
	Ok(tickets_claimed)
}

#[server]
async fn submit_future(description: String) -> Result<String, ServerFnError> {
	use crate::web::state::AppState;

	let state = expect_context::<AppState>();
	let generation_id = state.generation.submit(&description)?;
	Ok(generation_id)
}
