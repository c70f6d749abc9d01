// © 2024 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::validation::FallbackPolicy;
use kdl::{KdlDocument, KdlNode, KdlValue};
use miette::{Diagnostic, IntoDiagnostic, Result};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::fs::read_to_string;

type UrlParseError = <Url as std::str::FromStr>::Err;

pub const DEFAULT_VALIDATION_INTERVAL_SECS: u64 = 30;

pub const ENV_VALIDATION_ENDPOINT: &str = "FUTURE_PORTAL_VALIDATION_ENDPOINT";
pub const ENV_VALIDATION_TOKEN: &str = "FUTURE_PORTAL_VALIDATION_TOKEN";
pub const ENV_GENERATION_SUBMIT_ENDPOINT: &str = "FUTURE_PORTAL_GENERATION_SUBMIT_ENDPOINT";
pub const ENV_GENERATION_STATUS_ENDPOINT: &str = "FUTURE_PORTAL_GENERATION_STATUS_ENDPOINT";
pub const ENV_EMAIL_CAPTURE_ENDPOINT: &str = "FUTURE_PORTAL_EMAIL_CAPTURE_ENDPOINT";

#[derive(Debug, Diagnostic, Error)]
pub enum ConfigError {
	#[error("missing configuration value `{0}`")]
	#[diagnostic(code(config::missing))]
	Missing(String),
	#[error("configuration value `{name}` must be {expected}")]
	#[diagnostic(code(config::wrong_type))]
	WrongType { name: String, expected: &'static str },
	#[error("configuration value `{name}` is not a valid URL")]
	#[diagnostic(code(config::invalid_url))]
	InvalidUrl {
		name: String,
		#[source]
		source: UrlParseError,
	},
	#[error("`admin.password_sha256` must be 64 hexadecimal digits")]
	#[diagnostic(
		code(config::password_digest),
		help("generate one with `printf '%s' 'your password' | sha256sum`")
	)]
	InvalidPasswordDigest,
}

#[derive(Debug)]
pub struct ConfigData {
	pub web: WebConfig,
	/// Where the display state is persisted. Without it, state only lives for the life of the process.
	pub state_file: Option<PathBuf>,
	pub validation: ValidationConfig,
	pub generation: GenerationConfig,
	pub email_capture: EmailCaptureConfig,
	pub admin: AdminConfig,
}

#[derive(Debug)]
pub struct WebConfig {
	pub bind_addr: String,
	pub base_url: String,
}

#[derive(Debug)]
pub struct ValidationConfig {
	pub endpoint: Url,
	pub token: Option<String>,
	pub interval: Duration,
	pub fallback: FallbackPolicy,
}

#[derive(Debug)]
pub struct GenerationConfig {
	pub submit_endpoint: Url,
	pub status_endpoint: Url,
	pub image_base_url: String,
	pub max_wait: Option<Duration>,
}

#[derive(Debug)]
pub struct EmailCaptureConfig {
	pub endpoint: Url,
}

#[derive(Debug)]
pub struct AdminConfig {
	/// Lowercase hex SHA-256 digest of the administrator password.
	pub password_sha256: String,
}

pub async fn parse_config(config_path: &str) -> Result<ConfigData> {
	let config_file_contents = read_to_string(config_path).await.into_diagnostic()?;
	parse_config_document(&config_file_contents, |name| std::env::var(name).ok())
}

/// Parses configuration file contents, applying overrides looked up by environment variable name.
pub fn parse_config_document(contents: &str, env: impl Fn(&str) -> Option<String>) -> Result<ConfigData> {
	let document: KdlDocument = contents.parse().map_err(miette::Report::new)?;
	let env = |name: &str| env(name).filter(|value| !value.is_empty());

	let web = section(&document, "web")?;
	let web = WebConfig {
		bind_addr: required_string(web, "web", "bind_addr")?,
		base_url: required_string(web, "web", "base_url")?
			.trim_end_matches('/')
			.to_string(),
	};

	let state_file = optional_string(&document, "", "state_file")?.map(PathBuf::from);

	let validation = section(&document, "validation")?;
	let validation_endpoint = match env(ENV_VALIDATION_ENDPOINT) {
		Some(endpoint) => endpoint,
		None => required_string(validation, "validation", "endpoint")?,
	};
	let token = match env(ENV_VALIDATION_TOKEN) {
		Some(token) => Some(token),
		None => optional_string(validation, "validation", "token")?,
	};
	let interval_secs =
		optional_positive_integer(validation, "validation", "interval_secs")?.unwrap_or(DEFAULT_VALIDATION_INTERVAL_SECS);
	let fallback = if optional_bool(validation, "validation", "fallback_progress")?.unwrap_or(false) {
		FallbackPolicy::SyntheticProgress
	} else {
		FallbackPolicy::Surface
	};
	let validation = ValidationConfig {
		endpoint: parse_url("validation.endpoint", &validation_endpoint)?,
		token,
		interval: Duration::from_secs(interval_secs),
		fallback,
	};

	let generation = section(&document, "generation")?;
	let submit_endpoint = match env(ENV_GENERATION_SUBMIT_ENDPOINT) {
		Some(endpoint) => endpoint,
		None => required_string(generation, "generation", "submit_endpoint")?,
	};
	let status_endpoint = match env(ENV_GENERATION_STATUS_ENDPOINT) {
		Some(endpoint) => endpoint,
		None => required_string(generation, "generation", "status_endpoint")?,
	};
	let generation = GenerationConfig {
		submit_endpoint: parse_url("generation.submit_endpoint", &submit_endpoint)?,
		status_endpoint: parse_url("generation.status_endpoint", &status_endpoint)?,
		image_base_url: required_string(generation, "generation", "image_base_url")?,
		max_wait: optional_positive_integer(generation, "generation", "max_wait_secs")?.map(Duration::from_secs),
	};

	let email_capture = section(&document, "email_capture")?;
	let capture_endpoint = match env(ENV_EMAIL_CAPTURE_ENDPOINT) {
		Some(endpoint) => endpoint,
		None => required_string(email_capture, "email_capture", "endpoint")?,
	};
	let email_capture = EmailCaptureConfig {
		endpoint: parse_url("email_capture.endpoint", &capture_endpoint)?,
	};

	let admin = section(&document, "admin")?;
	let password_sha256 = required_string(admin, "admin", "password_sha256")?.to_ascii_lowercase();
	if password_sha256.len() != 64 || !password_sha256.chars().all(|c| c.is_ascii_hexdigit()) {
		return Err(ConfigError::InvalidPasswordDigest.into());
	}
	let admin = AdminConfig { password_sha256 };

	Ok(ConfigData {
		web,
		state_file,
		validation,
		generation,
		email_capture,
		admin,
	})
}

fn section<'a>(document: &'a KdlDocument, name: &str) -> Result<&'a KdlDocument, ConfigError> {
	document
		.get(name)
		.and_then(|node| node.children())
		.ok_or_else(|| ConfigError::Missing(name.to_string()))
}

fn full_name(section: &str, name: &str) -> String {
	if section.is_empty() {
		name.to_string()
	} else {
		format!("{}.{}", section, name)
	}
}

/// Gets the first positional argument of the named node.
fn node_argument<'a>(document: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
	let node: &KdlNode = document.get(name)?;
	node.entries()
		.iter()
		.find(|entry| entry.name().is_none())
		.map(|entry| entry.value())
}

fn optional_string(document: &KdlDocument, section: &str, name: &str) -> Result<Option<String>, ConfigError> {
	match node_argument(document, name) {
		None => Ok(None),
		Some(value) => match value.as_string() {
			Some(value) => Ok(Some(value.to_string())),
			None => Err(ConfigError::WrongType {
				name: full_name(section, name),
				expected: "a string",
			}),
		},
	}
}

fn required_string(document: &KdlDocument, section: &str, name: &str) -> Result<String, ConfigError> {
	optional_string(document, section, name)?.ok_or_else(|| ConfigError::Missing(full_name(section, name)))
}

fn optional_positive_integer(document: &KdlDocument, section: &str, name: &str) -> Result<Option<u64>, ConfigError> {
	let Some(value) = node_argument(document, name) else {
		return Ok(None);
	};
	match value.as_integer().and_then(|value| u64::try_from(value).ok()) {
		Some(value) if value > 0 => Ok(Some(value)),
		_ => Err(ConfigError::WrongType {
			name: full_name(section, name),
			expected: "a positive integer",
		}),
	}
}

fn optional_bool(document: &KdlDocument, section: &str, name: &str) -> Result<Option<bool>, ConfigError> {
	let Some(value) = node_argument(document, name) else {
		return Ok(None);
	};
	match value.as_bool() {
		Some(value) => Ok(Some(value)),
		None => Err(ConfigError::WrongType {
			name: full_name(section, name),
			expected: "#true or #false",
		}),
	}
}

fn parse_url(name: &str, value: &str) -> Result<Url, ConfigError> {
	Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
		name: name.to_string(),
		source,
	})
}
