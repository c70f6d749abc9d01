// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use leptos::prelude::*;

/// The site header. Pages can put extra controls next to the admin link.
#[component]
pub fn PageHeader(#[prop(optional)] children: Option<Children>) -> impl IntoView {
	view! {
		<header id="header">
			<a id="header_brand" href="/">
				"Future Portal"
			</a>
			<nav id="header_nav">
				{children.map(|children| children())}
				<a href="/admin">"Admin"</a>
			</nav>
		</header>
	}
}
