use crate::backend::queries::{self, eq};
use crate::backend::{Backend, EnrollmentRow, ProfileRow, ProgressRow};
use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// PostgREST-style reads against the hosted backend.
#[derive(Debug, Clone)]
pub struct RestBackend {
    base_url: Url,
    api_key: Option<String>,
    timeout_seconds: u64,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_seconds: u64) -> Result<Self> {
        // `Url::join` replaces the last path segment unless the base ends with '/'.
        let normalized = format!("{}/", base_url.trim().trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .with_context(|| format!("Invalid backend URL: {base_url}"))?;

        Ok(Self {
            base_url,
            api_key,
            timeout_seconds: timeout_seconds.max(5),
        })
    }

    pub fn endpoint(&self, table: &str, select: &str, filters: &[(&str, String)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(table)
            .with_context(|| format!("Failed to build backend URL for table: {table}"))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", select);
            filters.iter().for_each(|(column, value)| {
                pairs.append_pair(column, value);
            });
        }

        Ok(url)
    }

    fn fetch_rows<T>(&self, table: &str, select: &str, filters: &[(&str, String)]) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.endpoint(table, select, filters)?;
        let api_key = self.api_key.clone();
        let timeout_seconds = self.timeout_seconds;

        debug!(table, url = %url, "backend read");

        // The blocking client must not be created or dropped on an async worker thread.
        std::thread::spawn(move || fetch_rows_blocking(url, api_key.as_deref(), timeout_seconds))
            .join()
            .map_err(|_| anyhow!("Backend worker thread panicked"))?
    }
}

impl Backend for RestBackend {
    fn profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        let rows: Vec<ProfileRow> = self.fetch_rows(
            queries::PROFILES_TABLE,
            queries::PROFILE_SELECT,
            &[("id", eq(user_id)), ("limit", "1".to_string())],
        )?;

        Ok(rows.into_iter().next())
    }

    fn enrollments(&self, user_id: &str) -> Result<Vec<EnrollmentRow>> {
        self.fetch_rows(
            queries::ENROLLMENTS_TABLE,
            queries::ENROLLMENT_SELECT,
            &[("user_id", eq(user_id))],
        )
    }

    fn progress(&self, user_id: &str) -> Result<Vec<ProgressRow>> {
        self.fetch_rows(
            queries::PROGRESS_TABLE,
            queries::PROGRESS_SELECT,
            &[("user_id", eq(user_id))],
        )
    }

    fn all_enrollments(&self) -> Result<Vec<EnrollmentRow>> {
        self.fetch_rows(
            queries::ENROLLMENTS_TABLE,
            queries::ENROLLMENT_SELECT,
            &[("order", "created_at.desc".to_string())],
        )
    }

    fn describe(&self) -> String {
        format!("rest ({})", self.base_url)
    }
}

fn fetch_rows_blocking<T: DeserializeOwned>(
    url: Url,
    api_key: Option<&str>,
    timeout_seconds: u64,
) -> Result<Vec<T>> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Some(key) = api_key {
        headers.insert(
            "apikey",
            HeaderValue::from_str(key).context("Failed to build apikey header")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}"))
                .context("Failed to build Authorization header")?,
        );
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .default_headers(headers)
        .build()
        .context("Failed to create backend HTTP client")?;

    let response = client
        .get(url.clone())
        .send()
        .with_context(|| format!("Backend request failed: {}", url.path()))?;

    let status = response.status();
    let body = response
        .text()
        .context("Failed to read backend response body")?;

    if !status.is_success() {
        bail!("Backend error {} for {}: {}", status, url.path(), body);
    }

    serde_json::from_str(&body)
        .with_context(|| format!("Failed to parse backend rows from {}", url.path()))
}
