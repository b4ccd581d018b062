//! Semantic Scholar Graph API client, grounded in
//! `Research_Agent/literature/clients.py`'s `SemanticScholarClient`. This is
//! the one source exposing both citations and references, so the
//! orchestrator's one-hop citation network walk routes through it.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use ba_domain::bio::{Author, Paper};
use ba_domain::error::Result;

use crate::client::{retrying_fetch_json, ClientConfig, RateLimiter};

const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const FIELDS: &str = "paperId,title,authors,year,venue,citationCount,referenceCount,isOpenAccess,openAccessPdf,externalIds,abstract";

pub struct SemanticScholarClient {
    http: reqwest::Client,
    rate_limiter: RateLimiter,
    config: ClientConfig,
}

impl SemanticScholarClient {
    pub fn new(api_key: Option<String>) -> Self {
        let config = ClientConfig::new(BASE_URL, Duration::from_millis(500)).with_api_key(api_key);
        Self {
            http: reqwest::Client::new(),
            rate_limiter: RateLimiter::new(config.min_interval),
            config,
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(url);
        if let Some(key) = &self.config.api_key {
            req = req.header("x-api-key", key);
        }
        req
    }

    fn parse_paper(value: &serde_json::Value) -> Paper {
        let authors: Vec<Author> = value
            .get("authors")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| a.get("name").and_then(|n| n.as_str()))
                    .map(|name| {
                        let mut parts = name.rsplitn(2, ' ');
                        let last = parts.next().unwrap_or(name);
                        let rest = parts.next();
                        match rest {
                            Some(given) => Author {
                                family: last.to_string(),
                                given: Some(given.to_string()),
                                orcid: None,
                            },
                            None => Author {
                                family: last.to_string(),
                                given: None,
                                orcid: None,
                            },
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut identifiers = BTreeMap::new();
        if let Some(ext) = value.get("externalIds").and_then(|v| v.as_object()) {
            if let Some(doi) = ext.get("DOI").and_then(|v| v.as_str()) {
                identifiers.insert("doi".into(), doi.to_string());
            }
            if let Some(pmid) = ext.get("PubMed").and_then(|v| v.as_str()) {
                identifiers.insert("pmid".into(), pmid.to_string());
            }
        }
        if let Some(id) = value.get("paperId").and_then(|v| v.as_str()) {
            identifiers.insert("s2".into(), id.to_string());
        }

        let pdf_url = value
            .get("openAccessPdf")
            .and_then(|v| v.get("url"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Paper {
            title: value
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            authors,
            year: value.get("year").and_then(|v| v.as_u64()).map(|y| y as u32),
            venue: value
                .get("venue")
                .and_then(|v| v.as_str())
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            identifiers,
            abstract_text: value
                .get("abstract")
                .and_then(|v| v.as_str())
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            citation_count: value.get("citationCount").and_then(|v| v.as_u64()).map(|c| c as u32),
            reference_count: value.get("referenceCount").and_then(|v| v.as_u64()).map(|c| c as u32),
            is_open_access: value.get("isOpenAccess").and_then(|v| v.as_bool()).unwrap_or(false),
            pdf_url: pdf_url.clone(),
            source_tag: "semantic_scholar".into(),
            relevance_score: None,
        }
    }
}

#[async_trait]
impl super::LiteratureSource for SemanticScholarClient {
    fn tag(&self) -> &'static str {
        "semantic_scholar"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        year_from: Option<u32>,
        year_to: Option<u32>,
    ) -> Result<Vec<Paper>> {
        self.rate_limiter.wait().await;
        let mut url = format!(
            "{BASE_URL}/paper/search?query={}&limit={}&fields={FIELDS}",
            urlencoding(query),
            max_results.min(100)
        );
        if let Some(from) = year_from {
            url.push_str(&format!("&year={from}-{}", year_to.map(|y| y.to_string()).unwrap_or_default()));
        }
        let data = retrying_fetch_json(&self.http, "semantic_scholar", self.config.max_retries, self.config.timeout, || {
            self.request(&url)
        })
        .await?;
        Ok(data
            .get("data")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(Self::parse_paper).collect())
            .unwrap_or_default())
    }

    async fn get_by_id(&self, identifier: &str) -> Result<Option<Paper>> {
        self.rate_limiter.wait().await;
        let url = format!("{BASE_URL}/paper/{identifier}?fields={FIELDS}");
        let data = retrying_fetch_json(&self.http, "semantic_scholar", self.config.max_retries, self.config.timeout, || {
            self.request(&url)
        })
        .await?;
        if data.is_null() {
            return Ok(None);
        }
        Ok(Some(Self::parse_paper(&data)))
    }

    async fn citations(&self, identifier: &str, cap: usize) -> Result<Vec<Paper>> {
        self.rate_limiter.wait().await;
        let url = format!(
            "{BASE_URL}/paper/{identifier}/citations?fields=paperId,title,authors,year,venue,citationCount,externalIds&limit={cap}"
        );
        let data = retrying_fetch_json(&self.http, "semantic_scholar", self.config.max_retries, self.config.timeout, || {
            self.request(&url)
        })
        .await?;
        Ok(data
            .get("data")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| c.get("citingPaper"))
                    .map(Self::parse_paper)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn references(&self, identifier: &str, cap: usize) -> Result<Vec<Paper>> {
        self.rate_limiter.wait().await;
        let url = format!(
            "{BASE_URL}/paper/{identifier}/references?fields=paperId,title,authors,year,venue,citationCount,externalIds&limit={cap}"
        );
        let data = retrying_fetch_json(&self.http, "semantic_scholar", self.config.max_retries, self.config.timeout, || {
            self.request(&url)
        })
        .await?;
        Ok(data
            .get("data")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| c.get("citedPaper"))
                    .map(Self::parse_paper)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn recommendations(&self, identifier: &str, cap: usize) -> Result<Vec<Paper>> {
        self.rate_limiter.wait().await;
        let url = format!(
            "{BASE_URL}/recommendations/v1/papers/forpaper/{identifier}?fields=paperId,title,authors,year,venue,citationCount,externalIds&limit={cap}"
        );
        let data = retrying_fetch_json(&self.http, "semantic_scholar", self.config.max_retries, self.config.timeout, || {
            self.request(&url)
        })
        .await?;
        Ok(data
            .get("recommendedPapers")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(Self::parse_paper).collect())
            .unwrap_or_default())
    }
}

fn urlencoding(value: &str) -> String {
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
