// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use leptos::prelude::*;
use leptos_router::params::Params;
use std::time::Duration;

#[derive(Clone, Debug, Params, PartialEq)]
pub struct FutureParams {
	pub generation_id: Option<String>,
}

/// Calls `tick` every `period` for as long as the calling component is mounted. Nothing runs during server rendering.
///
/// The returned handle can be used to stop the timer early.
pub fn use_interval(period: Duration, tick: impl Fn() + Clone + 'static) -> StoredValue<Option<IntervalHandle>> {
	let timer = StoredValue::new(None);
	Effect::new(move |_| match set_interval_with_handle(tick.clone(), period) {
		Ok(handle) => {
			timer.set_value(Some(handle));
			on_cleanup(move || handle.clear());
		}
		Err(error) => leptos::logging::error!("Failed to start timer: {:?}", error),
	});
	timer
}

pub fn stop_interval(timer: StoredValue<Option<IntervalHandle>>) {
	if let Some(handle) = timer.try_get_value().flatten() {
		handle.clear();
	}
}

/// Shows a blocking browser alert.
pub fn alert(message: &str) {
	let _ = window().alert_with_message(message);
}

/// Copies text to the clipboard. The browser finishes the write in the background.
pub fn copy_to_clipboard(text: &str) {
	let _ = window().navigator().clipboard().write_text(text);
}
