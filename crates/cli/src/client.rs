//! API client for a running tuner-server

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use tuner_lib::{MemoryUnit, RawTuneRequest, TuneResponse};
use url::Url;

/// Default address of a local tuner-server
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Body of `POST /api/tune`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TuneRequestBody<'a> {
    #[serde(flatten)]
    resources: &'a RawTuneRequest,
    memory_unit: MemoryUnit,
}

/// API client for the tuning server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        // Above the server's own oracle timeout
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let mut base_url = Url::parse(base_url).context("Invalid API URL")?;
        // Relative joins replace the last segment unless it ends in a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    /// Ask the server for a configuration.
    ///
    /// Failures reported by the server (400, 500, 504) still carry a
    /// tuning response and are returned as `Ok`; only transport problems
    /// and unreadable bodies are errors.
    pub async fn tune(&self, resources: &RawTuneRequest, unit: MemoryUnit) -> Result<TuneResponse> {
        let url = self.base_url.join("api/tune").context("Invalid path")?;
        let body = TuneRequestBody {
            resources,
            memory_unit: unit,
        };

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let text = response.text().await.context("Failed to read response")?;

        match serde_json::from_str::<TuneResponse>(&text) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => anyhow::bail!("API error ({}): {}", status, text),
            Err(err) => Err(err).context("Failed to parse response"),
        }
    }
}
