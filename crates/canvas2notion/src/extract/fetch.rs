//! Downloading assignment pages.

use super::error::ExtractError;
use reqwest::header::COOKIE;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Configuration for page downloads.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("canvas2notion/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Downloads the rendered assignments page at `url`.
///
/// Canvas pages need an authenticated session; pass the browser's cookie
/// header in `cookies`.
pub async fn fetch_page(
    url: &Url,
    cookies: Option<&str>,
    config: &FetchConfig,
) -> Result<String, ExtractError> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .connect_timeout(Duration::from_secs(10))
        .timeout(config.timeout)
        .build()?;

    info!(url = %url, "Fetching assignments page");

    let mut request = client.get(url.clone());
    if let Some(cookies) = cookies {
        request = request.header(COOKIE, cookies);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(ExtractError::Fetch {
            message: format!("{} returned status {}", url, response.status()),
        });
    }

    if response.url() != url {
        warn!(
            requested = %url,
            landed = %response.url(),
            "Request was redirected; the session may have expired"
        );
    }

    Ok(response.text().await?)
}
