// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::header::PageHeader;
use super::utils::{FutureParams, copy_to_clipboard, stop_interval, use_interval};
use crate::model::{GenerationResult, share_url, twitter_intent_url};
use crate::tracker::{
	GenerationTracker, GenerationView, LOAD_FAILED_MESSAGE, LOADING_MESSAGE_INTERVAL, STATUS_POLL_INTERVAL,
	TIMED_OUT_MESSAGE,
};
use chrono::Utc;
use leptos::ev::{MouseEvent, SubmitEvent};
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_router::hooks::use_params;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const SHARE_TEXT: &str = "I just generated my future vision! Check it out:";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ViewerSettings {
	pub base_url: String,
	pub max_wait_secs: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
enum EmailCapture {
	Idle,
	Sending,
	Done,
	Failed,
}

#[component]
pub fn SharedFuture() -> impl IntoView {
	let params = use_params::<FutureParams>();
	let generation_id = params
		.read_untracked()
		.as_ref()
		.ok()
		.and_then(|params| params.generation_id.clone())
		.unwrap_or_default();

	let settings = OnceResource::new(get_viewer_settings());
	let tracker = RwSignal::new(GenerationTracker::new(None, Utc::now()));

	// Responses that arrive after leaving the page are dropped.
	let alive = Arc::new(AtomicBool::new(true));
	on_cleanup({
		let alive = Arc::clone(&alive);
		move || alive.store(false, Ordering::Release)
	});

	Effect::new(move |_| {
		if let Some(Ok(settings)) = settings.get() {
			tracker.update(|tracker| tracker.set_max_wait(settings.max_wait_secs.map(Duration::from_secs)));
		}
	});

	let fetching = StoredValue::new(false);
	let poll_status = {
		let generation_id = generation_id.clone();
		let alive = Arc::clone(&alive);
		move || {
			if tracker.with_untracked(|tracker| tracker.is_terminal()) {
				return;
			}
			tracker.update(|tracker| {
				tracker.check_deadline(Utc::now());
			});
			if fetching.get_value() || tracker.with_untracked(|tracker| tracker.is_terminal()) {
				return;
			}
			fetching.set_value(true);
			let generation_id = generation_id.clone();
			let alive = Arc::clone(&alive);
			spawn_local(async move {
				let fetched = fetch_generation_status(generation_id).await.map_err(|error| {
					leptos::logging::error!("Error fetching generation status: {}", error);
					String::from(LOAD_FAILED_MESSAGE)
				});
				if !alive.load(Ordering::Acquire) {
					return;
				}
				fetching.set_value(false);
				tracker.update(|tracker| {
					tracker.observe(fetched, Utc::now());
				});
			});
		}
	};

	Effect::new({
		let poll_status = poll_status.clone();
		move |_| poll_status()
	});
	let status_timer = use_interval(STATUS_POLL_INTERVAL, poll_status);
	let message_timer = use_interval(LOADING_MESSAGE_INTERVAL, move || {
		tracker.update(|tracker| tracker.advance_message());
	});
	Effect::new(move |_| {
		if tracker.with(|tracker| tracker.is_terminal()) {
			stop_interval(status_timer);
			stop_interval(message_timer);
		}
	});

	let generation_view = Memo::new(move |_| tracker.with(|tracker| tracker.view().clone()));
	let loading_message = Memo::new(move |_| tracker.with(|tracker| tracker.loading_message()));

	let base_url = move || {
		settings
			.get()
			.and_then(|settings| settings.ok())
			.map(|settings| settings.base_url)
			.unwrap_or_default()
	};

	view! {
		<PageHeader />
		<main id="future_page">
			{
				move || match generation_view.get() {
					GenerationView::Loading => view! {
						<FutureLoading message=loading_message generation_id=generation_id.clone() />
					}.into_any(),
					GenerationView::Ready(result) => {
						let url = share_url(&base_url(), &generation_id);
						view! { <FutureReady result share_url=url /> }.into_any()
					}
					GenerationView::Failed(message) => view! { <FutureUnavailable message /> }.into_any(),
					GenerationView::TimedOut => view! {
						<FutureUnavailable message=String::from(TIMED_OUT_MESSAGE) />
					}.into_any(),
				}
			}
		</main>
	}
}

#[component]
fn FutureLoading(message: Memo<&'static str>, generation_id: String) -> impl IntoView {
	let (email, set_email) = signal(String::new());
	let (capture_state, set_capture_state) = signal(EmailCapture::Idle);

	let email_submit = move |event: SubmitEvent| {
		event.prevent_default();
		let address = email.get();
		let generation_id = generation_id.clone();
		set_capture_state.set(EmailCapture::Sending);
		spawn_local(async move {
			match capture_email(address, generation_id).await {
				Ok(()) => set_capture_state.set(EmailCapture::Done),
				Err(error) => {
					leptos::logging::error!("Error capturing email: {}", error);
					set_capture_state.set(EmailCapture::Failed);
				}
			}
		});
	};

	view! {
		<section id="future_loading" class="panel">
			<div class="spinner"></div>
			<h2>"Your future is being generated"</h2>
			<p class="loading_message">{move || message.get()}</p>
			<form id="email_capture" on:submit=email_submit>
				<p>"Want to know when it's ready? Leave your email and we'll let you know."</p>
				<input
					type="email"
					placeholder="you@example.com"
					bind:value=(email, set_email)
					disabled=move || matches!(capture_state.get(), EmailCapture::Sending | EmailCapture::Done)
					required
				/>
				<button
					type="submit"
					disabled=move || matches!(capture_state.get(), EmailCapture::Sending | EmailCapture::Done)
				>
					{
						move || match capture_state.get() {
							EmailCapture::Sending => "Signing up…",
							EmailCapture::Done => "Signed up!",
							EmailCapture::Idle | EmailCapture::Failed => "Notify Me",
						}
					}
				</button>
				<Show when=move || capture_state.get() == EmailCapture::Failed>
					<p class="email_capture_error">"Couldn't sign you up. Please try again."</p>
				</Show>
			</form>
		</section>
	}
}

#[component]
fn FutureReady(result: GenerationResult, share_url: String) -> impl IntoView {
	let tweet_url = twitter_intent_url(SHARE_TEXT, &share_url);
	let story_html = result.story_html();
	let (copied, set_copied) = signal(false);
	let copy_click = {
		let share_url = share_url.clone();
		move |_: MouseEvent| {
			copy_to_clipboard(&share_url);
			set_copied.set(true);
		}
	};

	view! {
		<section id="future_ready" class="panel">
			<h2>"A Vision of the Future"</h2>
			<div class="future_image">
				<img src=result.image_reference alt="Generated future vision" />
			</div>
			<div class="future_story" inner_html=story_html></div>
			<div class="future_share">
				<span>"Share this future:"</span>
				<input type="text" readonly prop:value=share_url />
				<button type="button" id="copy_link_button" on:click=copy_click>
					{move || if copied.get() { "Copied!" } else { "Copy Link" }}
				</button>
				<a class="button" href=tweet_url target="_blank" rel="noopener noreferrer">
					"Share on Twitter"
				</a>
			</div>
			<a href="/" class="button">"Get Your Own Ticket to the Future"</a>
		</section>
	}
}

#[component]
fn FutureUnavailable(message: String) -> impl IntoView {
	view! {
		<section id="future_unavailable" class="panel">
			<h2>"Future Not Found"</h2>
			<p>{message}</p>
			<a href="/" class="button">"Return Home"</a>
		</section>
	}
}

#[server]
async fn get_viewer_settings() -> Result<ViewerSettings, ServerFnError> {
	use crate::web::state::AppState;

	let state = expect_context::<AppState>();
	Ok(ViewerSettings {
		base_url: state.config.web.base_url.clone(),
		max_wait_secs: state.generation.max_wait().map(|max_wait| max_wait.as_secs()),
	})
}

#[server]
async fn fetch_generation_status(generation_id: String) -> Result<GenerationResult, ServerFnError> {
	use crate::web::state::AppState;

	let state = expect_context::<AppState>();
	let result = state.generation.fetch_status(&generation_id).await?;
	Ok(result)
}

#[server]
async fn capture_email(email: String, generation_id: String) -> Result<(), ServerFnError> {
	use crate::web::state::AppState;

	let state = expect_context::<AppState>();
	state.generation.capture_email(&email, &generation_id).await?;
	tracing::info!(%generation_id, "Captured email for generation");
	Ok(())
}
