//! Unpaywall open-access PDF lookup, grounded in `clients.py`'s
//! `UnpaywallClient`. Supports only the `oa_lookup` capability — `search`
//! always returns an empty set so it can sit in the same source registry
//! without special-casing.

use std::time::Duration;

use async_trait::async_trait;
use ba_domain::bio::Paper;
use ba_domain::error::Result;

use crate::client::{retrying_fetch_json, ClientConfig, RateLimiter};

const BASE_URL: &str = "https://api.unpaywall.org/v2";

pub struct UnpaywallClient {
    http: reqwest::Client,
    rate_limiter: RateLimiter,
    config: ClientConfig,
    email: Option<String>,
}

impl UnpaywallClient {
    pub fn new(email: Option<String>) -> Self {
        let config =
            ClientConfig::new(BASE_URL, Duration::from_millis(100)).with_timeout(Duration::from_secs(20));
        Self {
            http: reqwest::Client::new(),
            rate_limiter: RateLimiter::new(config.min_interval),
            config,
            email,
        }
    }
}

#[async_trait]
impl super::LiteratureSource for UnpaywallClient {
    fn tag(&self) -> &'static str {
        "unpaywall"
    }

    async fn search(
        &self,
        _query: &str,
        _max_results: usize,
        _year_from: Option<u32>,
        _year_to: Option<u32>,
    ) -> Result<Vec<Paper>> {
        Ok(Vec::new())
    }

    async fn oa_lookup(&self, doi: &str) -> Result<Option<String>> {
        let Some(email) = &self.email else {
            return Ok(None);
        };
        self.rate_limiter.wait().await;
        let url = format!("{BASE_URL}/{}?email={email}", urlencode(doi));
        let data = retrying_fetch_json(&self.http, "unpaywall", 1, self.config.timeout, || {
            self.http.get(&url)
        })
        .await?;

        if let Some(url) = data
            .get("best_oa_location")
            .and_then(|v| v.get("url_for_pdf"))
            .and_then(|v| v.as_str())
        {
            return Ok(Some(url.to_string()));
        }
        if let Some(locations) = data.get("oa_locations").and_then(|v| v.as_array()) {
            for loc in locations {
                if let Some(url) = loc.get("url_for_pdf").and_then(|v| v.as_str()) {
                    return Ok(Some(url.to_string()));
                }
            }
        }
        Ok(None)
    }
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
