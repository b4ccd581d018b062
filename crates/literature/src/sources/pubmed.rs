//! PubMed via NCBI E-utilities, grounded in `Research_Agent/literature/clients.py`'s
//! `PubMedClient` (esearch then esummary, same two-step fetch).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use ba_domain::bio::{Author, Paper};
use ba_domain::error::Result;

use crate::client::{retrying_fetch_json, ClientConfig, RateLimiter};

const BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

pub struct PubMedClient {
    http: reqwest::Client,
    rate_limiter: RateLimiter,
    config: ClientConfig,
    email: Option<String>,
}

impl PubMedClient {
    pub fn new(api_key: Option<String>, email: Option<String>) -> Self {
        // NCBI: 3 req/s without a key, 10 req/s with one.
        let min_interval = if api_key.is_some() {
            Duration::from_millis(100)
        } else {
            Duration::from_millis(340)
        };
        let config = ClientConfig::new(BASE_URL, min_interval).with_api_key(api_key);
        Self {
            http: reqwest::Client::new(),
            rate_limiter: RateLimiter::new(config.min_interval),
            config,
            email,
        }
    }

    fn build_url(&self, endpoint: &str, mut params: Vec<(String, String)>) -> String {
        if let Some(key) = &self.config.api_key {
            params.push(("api_key".into(), key.clone()));
        }
        if let Some(email) = &self.email {
            params.push(("email".into(), email.clone()));
        }
        params.push(("retmode".into(), "json".into()));
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding_encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}/{endpoint}.fcgi?{query}", self.config.base_url)
    }

    async fn fetch_papers(&self, pmids: &[String]) -> Result<Vec<Paper>> {
        if pmids.is_empty() {
            return Ok(Vec::new());
        }
        self.rate_limiter.wait().await;
        let url = self.build_url(
            "esummary",
            vec![("db".into(), "pubmed".into()), ("id".into(), pmids.join(","))],
        );
        let data = retrying_fetch_json(&self.http, "pubmed", self.config.max_retries, self.config.timeout, || {
            self.http.get(&url)
        })
            .await?;
        let Some(result) = data.get("result").and_then(|v| v.as_object()) else {
            return Ok(Vec::new());
        };

        let mut papers = Vec::new();
        for pmid in pmids {
            let Some(item) = result.get(pmid) else {
                continue;
            };
            let authors: Vec<Author> = item
                .get("authors")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|a| a.get("name").and_then(|n| n.as_str()))
                        .map(|name| split_author_name(name))
                        .collect()
                })
                .unwrap_or_default();

            let doi = item
                .get("articleids")
                .and_then(|v| v.as_array())
                .and_then(|arr| {
                    arr.iter().find(|aid| {
                        aid.get("idtype").and_then(|v| v.as_str()) == Some("doi")
                    })
                })
                .and_then(|aid| aid.get("value"))
                .and_then(|v| v.as_str())
                .map(str::to_string);

            let year = item
                .get("pubdate")
                .and_then(|v| v.as_str())
                .and_then(|s| s.get(0..4))
                .and_then(|y| y.parse::<u32>().ok());

            let mut identifiers = BTreeMap::new();
            identifiers.insert("pmid".into(), pmid.clone());
            if let Some(doi) = doi {
                identifiers.insert("doi".into(), doi);
            }

            papers.push(Paper {
                title: item
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                authors,
                year,
                venue: item
                    .get("source")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                identifiers,
                abstract_text: None,
                citation_count: None,
                reference_count: None,
                is_open_access: false,
                pdf_url: None,
                source_tag: "pubmed".into(),
                relevance_score: None,
            });
        }
        Ok(papers)
    }
}

#[async_trait]
impl super::LiteratureSource for PubMedClient {
    fn tag(&self) -> &'static str {
        "pubmed"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        year_from: Option<u32>,
        year_to: Option<u32>,
    ) -> Result<Vec<Paper>> {
        let mut term = query.to_string();
        if year_from.is_some() || year_to.is_some() {
            let start = year_from.unwrap_or(1900);
            let end = year_to.unwrap_or(2100);
            term.push_str(&format!(" AND {start}:{end}[dp]"));
        }

        self.rate_limiter.wait().await;
        let url = self.build_url(
            "esearch",
            vec![
                ("db".into(), "pubmed".into()),
                ("term".into(), term),
                ("retmax".into(), max_results.to_string()),
                ("sort".into(), "relevance".into()),
            ],
        );
        let data = retrying_fetch_json(&self.http, "pubmed", self.config.max_retries, self.config.timeout, || {
            self.http.get(&url)
        })
            .await?;
        let ids: Vec<String> = data
            .get("esearchresult")
            .and_then(|v| v.get("idlist"))
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        self.fetch_papers(&ids).await
    }

    async fn get_by_id(&self, identifier: &str) -> Result<Option<Paper>> {
        let papers = self.fetch_papers(&[identifier.to_string()]).await?;
        Ok(papers.into_iter().next())
    }
}

fn split_author_name(name: &str) -> Author {
    let mut parts = name.rsplitn(2, ' ');
    let family = parts.next().unwrap_or(name).to_string();
    let given = parts.next().map(str::to_string);
    // PubMed reports "Last FM" (family first); flip back to family/given.
    match given {
        Some(given) => Author {
            family: given,
            given: Some(family),
            orcid: None,
        },
        None => Author {
            family,
            given: None,
            orcid: None,
        },
    }
}

fn urlencoding_encode(value: &str) -> String {
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
