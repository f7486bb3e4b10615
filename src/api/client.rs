use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use yansi::Paint;

use crate::config;
use crate::error::GcpError;

pub const COMPUTE_BASE_URL: &str = "https://compute.googleapis.com/compute/v1";
pub const DNS_BASE_URL: &str = "https://dns.googleapis.com/dns/v1";

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

// Refresh this long before the token actually expires.
const TOKEN_EXPIRY_SLACK: Duration = Duration::from_secs(60);

static SILENT: AtomicBool = AtomicBool::new(false);

pub fn set_silent(silent: bool) {
    SILENT.store(silent, Ordering::Relaxed);
}

fn log_output(msg: String) {
    if !SILENT.load(Ordering::Relaxed) {
        println!("{}", msg);
    }
}

/// Token payload returned by the metadata server
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Authenticated HTTP client for the Google Cloud REST APIs.
///
/// Bearer tokens come from the GCE metadata server and are cached until
/// shortly before expiry; set `GCP_ACCESS_TOKEN` to override for local runs.
pub struct GcpClient {
    client: reqwest::Client,
    compute_base_url: String,
    dns_base_url: String,
    token_cache: Mutex<Option<CachedToken>>,
    token_override: Option<String>,
}

impl Default for GcpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GcpClient {
    pub fn new() -> Self {
        Self::with_base_urls(COMPUTE_BASE_URL, DNS_BASE_URL)
    }

    /// Client pointed at alternate API endpoints (test doubles, proxies).
    pub fn with_base_urls(
        compute_base_url: impl Into<String>,
        dns_base_url: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!("Panelup/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            compute_base_url: compute_base_url.into(),
            dns_base_url: dns_base_url.into(),
            token_cache: Mutex::new(None),
            token_override: config::get_access_token_override(),
        }
    }

    /// Replace metadata-server auth with a fixed token.
    pub fn with_static_token(mut self, token: impl Into<String>) -> Self {
        self.token_override = Some(token.into());
        self
    }

    pub fn compute_base_url(&self) -> &str {
        &self.compute_base_url
    }

    pub fn dns_base_url(&self) -> &str {
        &self.dns_base_url
    }

    /// Current bearer token, fetching a fresh one from the metadata server
    /// when the cached one is gone or about to expire.
    async fn access_token(&self) -> Result<String, GcpError> {
        if let Some(ref token) = self.token_override {
            return Ok(token.clone());
        }

        let mut cache = self.token_cache.lock().await;
        if let Some(ref cached) = *cache {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| GcpError::Auth(format!("metadata server unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GcpError::Auth(format!(
                "metadata server returned HTTP {}: {}",
                status, text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GcpError::Auth(format!("invalid token response: {}", e)))?;

        let expires_at = Instant::now() + Duration::from_secs(token.expires_in)
            - TOKEN_EXPIRY_SLACK.min(Duration::from_secs(token.expires_in));
        *cache = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at,
        });

        Ok(token.access_token)
    }

    /// Core request function for the provider APIs.
    /// Handles authentication, request building, and error responses.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        params: Option<&[(&str, &str)]>,
        body: Option<&Value>,
    ) -> Result<T, GcpError> {
        // --- Curl Logging ---
        let mut url_for_log = url.to_string();
        if let Some(p) = params {
            if !p.is_empty() {
                let query_string = p
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<String>>()
                    .join("&");
                url_for_log = format!("{}?{}", url_for_log, query_string);
            }
        }

        let mut parts = Vec::new();
        parts.push(Paint::new("curl").fg(yansi::Color::Green).bold().to_string());
        parts.push(format!(
            "-X {}",
            Paint::new(method.as_str()).fg(yansi::Color::Yellow).bold()
        ));
        parts.push(format!("'{}'", Paint::new(&url_for_log).fg(yansi::Color::Cyan)));
        parts.push(format!(
            "{} {}",
            Paint::new("-H").fg(yansi::Color::Magenta),
            Paint::new("'Authorization: Bearer $TOKEN'").fg(yansi::Color::Magenta)
        ));
        if let Some(b) = body {
            let json_str = serde_json::to_string_pretty(b).unwrap_or_default();
            let escaped_json = json_str.replace('\'', "'\\''");
            parts.push(format!(
                "{} {}",
                Paint::new("-d").fg(yansi::Color::Blue),
                Paint::new(format!("'{}'", escaped_json)).fg(yansi::Color::White)
            ));
        }
        log_output(format!("Request:\n{}", parts.join(" ")));
        // --------------------

        let token = self.access_token().await?;
        let mut req = self
            .client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", token));
        if let Some(p) = params {
            req = req.query(p);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let response = req
            .send()
            .await
            .map_err(|e| GcpError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GcpError::Network(e.to_string()))?;

        if !status.is_success() {
            log_output(format!(
                "Response:\n{}",
                Paint::new(format!("HTTP {}: {}", status, text)).fg(yansi::Color::Red)
            ));
            return Err(GcpError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        // Grayed out color (dimmed/dark gray)
        log_output(format!(
            "Response:\n{}",
            Paint::new(&text).rgb(100, 100, 100)
        ));

        serde_json::from_str(&text).map_err(|e| GcpError::Api {
            status: status.as_u16(),
            message: format!("Failed to parse response: {}", e),
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, GcpError> {
        self.request(Method::GET, url, None, None).await
    }

    /// GET with query parameters; values are percent-encoded by reqwest.
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, GcpError> {
        self.request(Method::GET, url, Some(params), None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, url: &str, body: &Value) -> Result<T, GcpError> {
        self.request(Method::POST, url, None, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, url: &str) -> Result<T, GcpError> {
        self.request(Method::DELETE, url, None, None).await
    }
}
