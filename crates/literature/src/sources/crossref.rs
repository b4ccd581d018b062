//! CrossRef works API client, grounded in `clients.py`'s `CrossRefClient`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use ba_domain::bio::{Author, Paper};
use ba_domain::error::Result;

use crate::client::{retrying_fetch_json, ClientConfig, RateLimiter};

const BASE_URL: &str = "https://api.crossref.org/works";

pub struct CrossRefClient {
    http: reqwest::Client,
    rate_limiter: RateLimiter,
    config: ClientConfig,
}

impl CrossRefClient {
    pub fn new(contact_email: Option<String>) -> Self {
        let user_agent = match contact_email {
            Some(email) => format!("BioAgent/1.0 (mailto:{email})"),
            None => "BioAgent/1.0".into(),
        };
        let config = ClientConfig::new(BASE_URL, Duration::from_millis(500)).with_user_agent(user_agent);
        Self {
            http: reqwest::Client::new(),
            rate_limiter: RateLimiter::new(config.min_interval),
            config,
        }
    }

    fn parse_item(item: &serde_json::Value) -> Paper {
        let authors: Vec<Author> = item
            .get("author")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .map(|a| Author {
                        family: a
                            .get("family")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        given: a
                            .get("given")
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                        orcid: None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let year = item
            .get("published-print")
            .or_else(|| item.get("published-online"))
            .and_then(|v| v.get("date-parts"))
            .and_then(|v| v.as_array())
            .and_then(|outer| outer.first())
            .and_then(|inner| inner.as_array())
            .and_then(|inner| inner.first())
            .and_then(|v| v.as_u64())
            .map(|y| y as u32);

        let title = item
            .get("title")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let venue = item
            .get("container-title")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let mut identifiers = BTreeMap::new();
        if let Some(doi) = item.get("DOI").and_then(|v| v.as_str()) {
            identifiers.insert("doi".into(), doi.to_string());
        }

        Paper {
            title,
            authors,
            year,
            venue,
            identifiers,
            abstract_text: None,
            citation_count: item
                .get("is-referenced-by-count")
                .and_then(|v| v.as_u64())
                .map(|c| c as u32),
            reference_count: None,
            is_open_access: false,
            pdf_url: None,
            source_tag: "crossref".into(),
            relevance_score: None,
        }
    }
}

#[async_trait]
impl super::LiteratureSource for CrossRefClient {
    fn tag(&self) -> &'static str {
        "crossref"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        year_from: Option<u32>,
        year_to: Option<u32>,
    ) -> Result<Vec<Paper>> {
        let mut url = format!(
            "{BASE_URL}?query={}&rows={}&sort=relevance",
            urlencode(query),
            max_results.min(100)
        );
        let mut filter_parts = Vec::new();
        if let Some(from) = year_from {
            filter_parts.push(format!("from-pub-date:{from}"));
        }
        if let Some(to) = year_to {
            filter_parts.push(format!("until-pub-date:{to}"));
        }
        if !filter_parts.is_empty() {
            url.push_str(&format!("&filter={}", filter_parts.join(",")));
        }

        self.rate_limiter.wait().await;
        let data = retrying_fetch_json(&self.http, "crossref", self.config.max_retries, self.config.timeout, || {
            self.http.get(&url).header("User-Agent", &self.config.user_agent)
        })
        .await?;

        Ok(data
            .get("message")
            .and_then(|v| v.get("items"))
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(Self::parse_item).collect())
            .unwrap_or_default())
    }

    async fn get_by_id(&self, identifier: &str) -> Result<Option<Paper>> {
        self.rate_limiter.wait().await;
        let url = format!("{BASE_URL}/{}", urlencode(identifier));
        let data = retrying_fetch_json(&self.http, "crossref", self.config.max_retries, self.config.timeout, || {
            self.http.get(&url).header("User-Agent", &self.config.user_agent)
        })
        .await?;
        Ok(data.get("message").map(Self::parse_item))
    }
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
