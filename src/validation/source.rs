// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::config::ValidationConfig;
use async_trait::async_trait;
use miette::{Diagnostic, IntoDiagnostic};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Which count the validation service is asked for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CountKind {
	/// Paid tickets; these become the verified count.
	Sold,
	/// Claim clicks; these become the claimed count.
	Clicked,
}

impl CountKind {
	pub fn query_value(self) -> &'static str {
		match self {
			Self::Sold => "sold",
			Self::Clicked => "clicked",
		}
	}

	/// The response field holding the count.
	pub fn response_field(self) -> &'static str {
		match self {
			Self::Sold => "number_sold",
			Self::Clicked => "number_clicked",
		}
	}
}

impl fmt::Display for CountKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.query_value())
	}
}

#[derive(Debug, Diagnostic, Error)]
pub enum FetchError {
	#[error("validation request failed")]
	Transport(#[from] reqwest::Error),
	#[error("validation service responded with {0}")]
	Status(StatusCode),
	#[error("validation response is malformed: {0}")]
	Malformed(String),
}

impl FetchError {
	/// Whether the service couldn't be reached or refused the request, as opposed to answering with a body that
	/// couldn't be used.
	pub fn is_outage(&self) -> bool {
		matches!(self, Self::Transport(_) | Self::Status(_))
	}
}

#[async_trait]
pub trait CountSource: fmt::Debug + Send + Sync {
	async fn fetch_count(&self, kind: CountKind) -> Result<u64, FetchError>;
}

/// Reads counts from the validation webhook with `GET <endpoint>?type=<kind>`.
#[derive(Debug)]
pub struct HttpCountSource {
	client: Client,
	endpoint: Url,
	token: Option<String>,
}

impl HttpCountSource {
	pub fn new(config: &ValidationConfig) -> miette::Result<Self> {
		let client = Client::builder().timeout(REQUEST_TIMEOUT).build().into_diagnostic()?;
		Ok(Self {
			client,
			endpoint: config.endpoint.clone(),
			token: config.token.clone(),
		})
	}

	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}
}

#[async_trait]
impl CountSource for HttpCountSource {
	async fn fetch_count(&self, kind: CountKind) -> Result<u64, FetchError> {
		let mut request = self
			.client
			.get(self.endpoint.clone())
			.query(&[("type", kind.query_value())])
			.header(CONTENT_TYPE, "application/json");
		if let Some(token) = &self.token {
			request = request.bearer_auth(token);
		}

		let response = request.send().await?;
		let status = response.status();
		if !status.is_success() {
			return Err(FetchError::Status(status));
		}
		let body = response.text().await?;
		parse_count(kind, &body)
	}
}

/// Extracts the count for `kind` from a response body. The field must be a non-negative number; fractions are
/// truncated.
pub fn parse_count(kind: CountKind, body: &str) -> Result<u64, FetchError> {
	let response: Value = serde_json::from_str(body).map_err(|error| FetchError::Malformed(error.to_string()))?;
	let field = kind.response_field();
	let Some(value) = response.get(field) else {
		return Err(FetchError::Malformed(format!("expected `{}` property", field)));
	};
	value
		.as_u64()
		.or_else(|| {
			value
				.as_f64()
				.filter(|number| number.is_finite() && *number >= 0.0 && *number < u64::MAX as f64)
				.map(|number| number.trunc() as u64)
		})
		.ok_or_else(|| FetchError::Malformed(format!("`{}` is not a non-negative number", field)))
}
