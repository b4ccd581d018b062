//! Europe PMC REST client, grounded in `clients.py`'s `EuropePMCClient`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use ba_domain::bio::{Author, Paper};
use ba_domain::error::Result;

use crate::client::{retrying_fetch_json, ClientConfig, RateLimiter};

const BASE_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest";

pub struct EuropePmcClient {
    http: reqwest::Client,
    rate_limiter: RateLimiter,
    config: ClientConfig,
}

impl Default for EuropePmcClient {
    fn default() -> Self {
        let config = ClientConfig::new(BASE_URL, Duration::from_millis(200));
        Self {
            http: reqwest::Client::new(),
            rate_limiter: RateLimiter::new(config.min_interval),
            config,
        }
    }
}

#[async_trait]
impl super::LiteratureSource for EuropePmcClient {
    fn tag(&self) -> &'static str {
        "europe_pmc"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        year_from: Option<u32>,
        year_to: Option<u32>,
    ) -> Result<Vec<Paper>> {
        let mut q = query.to_string();
        if year_from.is_some() || year_to.is_some() {
            let start = year_from.unwrap_or(1900);
            let end = year_to.unwrap_or(2100);
            q.push_str(&format!(" AND PUB_YEAR:[{start} TO {end}]"));
        }

        self.rate_limiter.wait().await;
        let url = format!(
            "{BASE_URL}/search?query={}&format=json&pageSize={}&sort=RELEVANCE",
            urlencode(&q),
            max_results.min(100)
        );
        let data = retrying_fetch_json(&self.http, "europe_pmc", self.config.max_retries, self.config.timeout, || {
            self.http.get(&url)
        })
        .await?;

        let Some(results) = data
            .get("resultList")
            .and_then(|v| v.get("result"))
            .and_then(|v| v.as_array())
        else {
            return Ok(Vec::new());
        };

        let papers = results
            .iter()
            .map(|item| {
                let authors: Vec<Author> = item
                    .get("authorList")
                    .and_then(|v| v.get("author"))
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|a| {
                                a.get("fullName")
                                    .and_then(|v| v.as_str())
                                    .map(str::to_string)
                            })
                            .map(|name| Author {
                                family: name,
                                given: None,
                                orcid: None,
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                let mut identifiers = BTreeMap::new();
                if let Some(doi) = item.get("doi").and_then(|v| v.as_str()) {
                    identifiers.insert("doi".into(), doi.to_string());
                }
                if let Some(pmid) = item.get("pmid").and_then(|v| v.as_str()) {
                    identifiers.insert("pmid".into(), pmid.to_string());
                }
                if let Some(pmcid) = item.get("pmcid").and_then(|v| v.as_str()) {
                    identifiers.insert("pmcid".into(), pmcid.to_string());
                }

                Paper {
                    title: item
                        .get("title")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    authors,
                    year: item
                        .get("pubYear")
                        .and_then(|v| v.as_str().map(str::to_string).or(v.as_u64().map(|n| n.to_string())))
                        .and_then(|s| s.parse().ok()),
                    venue: item
                        .get("journalTitle")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    identifiers,
                    abstract_text: None,
                    citation_count: item
                        .get("citedByCount")
                        .and_then(|v| v.as_u64())
                        .map(|c| c as u32),
                    reference_count: None,
                    is_open_access: item
                        .get("isOpenAccess")
                        .and_then(|v| v.as_str())
                        .map(|v| v == "Y")
                        .unwrap_or(false),
                    pdf_url: None,
                    source_tag: "europe_pmc".into(),
                    relevance_score: None,
                }
            })
            .collect();
        Ok(papers)
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
