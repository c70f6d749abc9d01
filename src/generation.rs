// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::config::{EmailCaptureConfig, GenerationConfig};
use crate::model::{GenerationResult, GenerationStatus};
use miette::{Diagnostic, IntoDiagnostic};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ID_LENGTH: usize = 64;

#[derive(Debug, Diagnostic, Error)]
pub enum GenerationError {
	#[error("a description of the future is required")]
	EmptyDescription,
	#[error("invalid generation ID")]
	InvalidId,
	#[error("invalid email address")]
	InvalidEmail,
	#[error("generation service endpoint can't take a generation ID")]
	UnusableEndpoint,
	#[error("generation request failed")]
	Transport(#[from] reqwest::Error),
	#[error("generation service responded with {0}")]
	Status(StatusCode),
	#[error("generation response is malformed: {0}")]
	Malformed(String),
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
	description: &'a str,
	generation_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureEmailRequest<'a> {
	email: &'a str,
	generation_id: &'a str,
}

#[derive(Deserialize)]
struct StatusResponse {
	status: String,
	#[serde(default)]
	image_url: String,
	#[serde(default)]
	story: String,
}

/// Talks to the external service that turns a description into a future vision.
#[derive(Clone, Debug)]
pub struct GenerationClient {
	client: Client,
	submit_endpoint: Url,
	status_endpoint: Url,
	capture_endpoint: Url,
	image_base_url: String,
	token: Option<String>,
	max_wait: Option<Duration>,
}

impl GenerationClient {
	pub fn new(
		generation: &GenerationConfig,
		email_capture: &EmailCaptureConfig,
		token: Option<String>,
	) -> miette::Result<Self> {
		let client = Client::builder().timeout(REQUEST_TIMEOUT).build().into_diagnostic()?;
		Ok(Self {
			client,
			submit_endpoint: generation.submit_endpoint.clone(),
			status_endpoint: generation.status_endpoint.clone(),
			capture_endpoint: email_capture.endpoint.clone(),
			image_base_url: generation.image_base_url.clone(),
			token,
			max_wait: generation.max_wait,
		})
	}

	/// How long viewers should wait for a result before giving up, if at all.
	pub fn max_wait(&self) -> Option<Duration> {
		self.max_wait
	}

	fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
		match &self.token {
			Some(token) => request.bearer_auth(token),
			None => request,
		}
	}

	/// Starts generating a future for the description and returns its generation ID right away. The request to the
	/// generation service is sent in the background; its progress is observed through [`Self::fetch_status`].
	///
	/// Must be called from within a Tokio runtime.
	pub fn submit(&self, description: &str) -> Result<String, GenerationError> {
		let description = description.trim();
		if description.is_empty() {
			return Err(GenerationError::EmptyDescription);
		}
		let generation_id = cuid2::create_id();

		let request = self.authorized(self.client.post(self.submit_endpoint.clone())).json(&SubmitRequest {
			description,
			generation_id: &generation_id,
		});
		let task_generation_id = generation_id.clone();
		tokio::spawn(async move {
			match request.send().await {
				Ok(response) if response.status().is_success() => {
					tracing::info!(generation_id = %task_generation_id, "Submitted future for generation");
				}
				Ok(response) => {
					tracing::error!(
						generation_id = %task_generation_id,
						status = %response.status(),
						"Generation service rejected a submission"
					);
				}
				Err(error) => {
					tracing::error!(generation_id = %task_generation_id, source = ?error, "Failed to submit future for generation");
				}
			}
		});

		Ok(generation_id)
	}

	pub async fn fetch_status(&self, generation_id: &str) -> Result<GenerationResult, GenerationError> {
		let url = status_url(&self.status_endpoint, generation_id)?;
		let response = self.authorized(self.client.get(url)).send().await?;
		let status = response.status();
		if !status.is_success() {
			return Err(GenerationError::Status(status));
		}
		let body = response.text().await?;
		parse_status_body(&body, &self.image_base_url)
	}

	/// Registers an email address to be notified when the generation finishes.
	pub async fn capture_email(&self, email: &str, generation_id: &str) -> Result<(), GenerationError> {
		let response = self.capture_request(email, generation_id)?.send().await?;
		let status = response.status();
		if !status.is_success() {
			return Err(GenerationError::Status(status));
		}
		Ok(())
	}

	fn capture_request(&self, email: &str, generation_id: &str) -> Result<RequestBuilder, GenerationError> {
		let email = email.trim();
		if !is_valid_email(email) {
			return Err(GenerationError::InvalidEmail);
		}
		if !is_valid_generation_id(generation_id) {
			return Err(GenerationError::InvalidId);
		}

		Ok(self
			.authorized(self.client.post(self.capture_endpoint.clone()))
			.json(&CaptureEmailRequest { email, generation_id }))
	}
}

/// Generation IDs appear in page URLs, so only URL-safe IDs of reasonable length are accepted.
pub fn is_valid_generation_id(generation_id: &str) -> bool {
	!generation_id.is_empty()
		&& generation_id.len() <= MAX_ID_LENGTH
		&& generation_id
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn is_valid_email(email: &str) -> bool {
	let Some((local, domain)) = email.rsplit_once('@') else {
		return false;
	};
	!local.is_empty()
		&& !domain.is_empty()
		&& !domain.starts_with('.')
		&& !domain.ends_with('.')
		&& domain.contains('.')
		&& !email.chars().any(char::is_whitespace)
}

fn status_url(endpoint: &Url, generation_id: &str) -> Result<Url, GenerationError> {
	if !is_valid_generation_id(generation_id) {
		return Err(GenerationError::InvalidId);
	}
	let mut url = endpoint.clone();
	url.path_segments_mut()
		.map_err(|_| GenerationError::UnusableEndpoint)?
		.pop_if_empty()
		.push(generation_id);
	Ok(url)
}

/// Resolves an image reference from the generation service. Absolute URLs are used as-is; anything else is taken
/// relative to the image base URL.
pub fn resolve_image_reference(image_base_url: &str, reference: &str) -> String {
	if reference.is_empty() || reference.starts_with("https://") || reference.starts_with("http://") {
		return reference.to_string();
	}
	format!(
		"{}/{}",
		image_base_url.trim_end_matches('/'),
		reference.trim_start_matches('/')
	)
}

pub fn parse_status_body(body: &str, image_base_url: &str) -> Result<GenerationResult, GenerationError> {
	let response: StatusResponse =
		serde_json::from_str(body).map_err(|error| GenerationError::Malformed(error.to_string()))?;
	Ok(GenerationResult {
		status: GenerationStatus::from_reported(&response.status),
		image_reference: resolve_image_reference(image_base_url, &response.image_url),
		story: response.story,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn client() -> GenerationClient {
		client_with_token(None)
	}

	fn client_with_token(token: Option<&str>) -> GenerationClient {
		let generation = GenerationConfig {
			submit_endpoint: Url::parse("http://127.0.0.1:9/submit").unwrap(),
			status_endpoint: Url::parse("https://generator.example/generation-status").unwrap(),
			image_base_url: String::from("https://images.example/bucket/"),
			max_wait: None,
		};
		let email_capture = EmailCaptureConfig {
			endpoint: Url::parse("http://127.0.0.1:9/capture-email").unwrap(),
		};
		GenerationClient::new(&generation, &email_capture, token.map(String::from)).unwrap()
	}

	#[test]
	fn status_url_appends_the_id() {
		let endpoint = Url::parse("https://generator.example/generation-status").unwrap();
		assert_eq!(
			status_url(&endpoint, "abc123").unwrap().as_str(),
			"https://generator.example/generation-status/abc123"
		);
		let endpoint = Url::parse("https://generator.example/generation-status/").unwrap();
		assert_eq!(
			status_url(&endpoint, "abc123").unwrap().as_str(),
			"https://generator.example/generation-status/abc123"
		);
	}

	#[test]
	fn rejects_ids_that_could_escape_the_path() {
		let endpoint = Url::parse("https://generator.example/generation-status").unwrap();
		assert!(matches!(status_url(&endpoint, "../admin"), Err(GenerationError::InvalidId)));
		assert!(matches!(status_url(&endpoint, ""), Err(GenerationError::InvalidId)));
		assert!(!is_valid_generation_id(&"a".repeat(65)));
		assert!(is_valid_generation_id("tz4a98xxat96iws9zmbrgj3a"));
		assert!(is_valid_generation_id("future_2024-01"));
	}

	#[test]
	fn status_values_map_to_states() {
		let success = parse_status_body(
			r#"{"status": "success", "image_url": "abc.png", "story": "One.\n\nTwo."}"#,
			"https://images.example/bucket/",
		)
		.unwrap();
		assert_eq!(success.status, GenerationStatus::Success);
		assert_eq!(success.image_reference, "https://images.example/bucket/abc.png");
		assert_eq!(success.story, "One.\n\nTwo.");

		let error = parse_status_body(r#"{"status": "error"}"#, "https://images.example").unwrap();
		assert_eq!(error.status, GenerationStatus::Error);

		let running = parse_status_body(r#"{"status": "processing"}"#, "https://images.example").unwrap();
		assert_eq!(running.status, GenerationStatus::Pending);
	}

	#[test]
	fn malformed_status_body_is_an_error() {
		assert!(matches!(
			parse_status_body("not json", "https://images.example"),
			Err(GenerationError::Malformed(_))
		));
		assert!(matches!(
			parse_status_body(r#"{"image_url": "abc.png"}"#, "https://images.example"),
			Err(GenerationError::Malformed(_))
		));
	}

	#[test]
	fn absolute_image_references_are_kept() {
		assert_eq!(
			resolve_image_reference("https://images.example/bucket", "https://cdn.example/x.png"),
			"https://cdn.example/x.png"
		);
		assert_eq!(
			resolve_image_reference("https://images.example/bucket/", "/x.png"),
			"https://images.example/bucket/x.png"
		);
	}

	#[test]
	fn email_needs_local_part_and_domain() {
		assert!(is_valid_email("visitor@example.com"));
		assert!(!is_valid_email("visitor"));
		assert!(!is_valid_email("@example.com"));
		assert!(!is_valid_email("visitor@"));
		assert!(!is_valid_email("visitor@localhost"));
		assert!(!is_valid_email("visit or@example.com"));
	}

	#[tokio::test]
	async fn submit_returns_an_id_immediately() {
		let client = client();
		let generation_id = client.submit("  Cities full of gardens  ").unwrap();
		assert!(is_valid_generation_id(&generation_id));
		assert_ne!(client.submit("Another future").unwrap(), generation_id);
	}

	#[tokio::test]
	async fn submit_rejects_blank_descriptions() {
		assert!(matches!(client().submit("   "), Err(GenerationError::EmptyDescription)));
	}

	#[tokio::test]
	async fn capture_email_validates_before_sending() {
		let client = client();
		assert!(matches!(
			client.capture_email("not-an-email", "abc").await,
			Err(GenerationError::InvalidEmail)
		));
		assert!(matches!(
			client.capture_email("visitor@example.com", "../x").await,
			Err(GenerationError::InvalidId)
		));
	}

	#[test]
	fn capture_email_carries_the_service_token() {
		let request = client_with_token(Some("s3cret"))
			.capture_request(" visitor@example.com ", "abc123")
			.unwrap()
			.build()
			.unwrap();
		assert_eq!(request.url().as_str(), "http://127.0.0.1:9/capture-email");
		assert_eq!(
			request.headers().get(reqwest::header::AUTHORIZATION).unwrap(),
			"Bearer s3cret"
		);
		let body: serde_json::Value = serde_json::from_slice(request.body().unwrap().as_bytes().unwrap()).unwrap();
		assert_eq!(body["email"], "visitor@example.com");
		assert_eq!(body["generationId"], "abc123");
	}

	#[test]
	fn capture_email_without_token_sends_no_authorization() {
		let request = client()
			.capture_request("visitor@example.com", "abc123")
			.unwrap()
			.build()
			.unwrap();
		assert!(request.headers().get(reqwest::header::AUTHORIZATION).is_none());
	}
}
