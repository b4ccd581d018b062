//! Citation formatting — grounded in the source citation manager
//! (`Research_Agent/citations/manager.py`), which keeps a `CitationStyle`
//! trait with an inline and reference-list formatter per style. The core
//! keeps two representative styles; more can be added without touching
//! call sites.

use serde::{Deserialize, Serialize};

use super::literature::Paper;

/// A paper with its assigned citation number and first-cite order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub paper: Paper,
    pub number: u32,
}

/// Selects a concrete `CitationStyle` implementation by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStyleKind {
    /// Numbered, e.g. `[1] Smith J, Doe A. Title. Journal. 2024. doi:...`
    Vancouver,
    /// Author-year, e.g. `(Smith & Doe, 2024)`.
    Apa,
}

impl CitationStyleKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "vancouver" => Some(Self::Vancouver),
            "apa" => Some(Self::Apa),
            _ => None,
        }
    }
}

/// Trait implemented by each citation style, mirroring the source
/// `CitationStyle` ABC's two formatting entry points.
pub trait CitationStyle {
    fn format_inline(&self, paper: &Paper, number: u32) -> String;
    fn format_reference(&self, paper: &Paper, number: u32) -> String;
}

pub struct VancouverStyle;

impl CitationStyle for VancouverStyle {
    fn format_inline(&self, _paper: &Paper, number: u32) -> String {
        format!("[{number}]")
    }

    fn format_reference(&self, paper: &Paper, number: u32) -> String {
        let authors = format_authors_vancouver(paper);
        let mut parts = vec![format!("{number}. {authors}")];
        parts.push(format!("{}.", paper.title.trim_end_matches('.')));
        if let Some(venue) = &paper.venue {
            parts.push(format!("{venue}."));
        }
        if let Some(year) = paper.year {
            parts.push(year.to_string());
        }
        if let Some(doi) = paper.identifiers.get("doi") {
            parts.push(format!("doi:{doi}"));
        }
        parts.join(" ")
    }
}

fn format_authors_vancouver(paper: &Paper) -> String {
    if paper.authors.is_empty() {
        return "Anonymous.".into();
    }
    let mut names: Vec<String> = paper
        .authors
        .iter()
        .take(6)
        .map(|a| {
            let initials = a.initials();
            if initials.is_empty() {
                a.family.clone()
            } else {
                format!("{} {}", a.family, initials)
            }
        })
        .collect();
    if paper.authors.len() > 6 {
        names.push("et al".into());
    }
    format!("{}.", names.join(", "))
}

pub struct ApaStyle;

impl CitationStyle for ApaStyle {
    fn format_inline(&self, paper: &Paper, _number: u32) -> String {
        let year = paper
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "n.d.".into());
        match paper.authors.as_slice() {
            [] => format!("(Anonymous, {year})"),
            [a] => format!("({}, {year})", a.family),
            [a, b] => format!("({} & {}, {year})", a.family, b.family),
            [a, ..] => format!("({} et al., {year})", a.family),
        }
    }

    fn format_reference(&self, paper: &Paper, _number: u32) -> String {
        let authors = format_authors_apa(paper);
        let year = paper
            .year
            .map(|y| format!("({y})"))
            .unwrap_or_else(|| "(n.d.)".into());
        let title = paper.title.trim_end_matches('.');
        let mut parts = vec![authors, year, format!("{title}.")];
        if let Some(venue) = &paper.venue {
            parts.push(format!("*{venue}*."));
        }
        if let Some(doi) = paper.identifiers.get("doi") {
            parts.push(format!("https://doi.org/{doi}"));
        }
        parts.join(" ")
    }
}

fn format_authors_apa(paper: &Paper) -> String {
    if paper.authors.is_empty() {
        return "Anonymous".into();
    }
    let formatted: Vec<String> = paper
        .authors
        .iter()
        .take(20)
        .map(|a| {
            let initials = a.initials();
            if initials.is_empty() {
                a.family.clone()
            } else {
                let spaced: String = initials
                    .chars()
                    .map(|c| format!("{c}."))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("{}, {spaced}", a.family)
            }
        })
        .collect();
    match formatted.as_slice() {
        [one] => one.clone(),
        [a, b] => format!("{a} & {b}"),
        _ => {
            let (last, rest) = formatted.split_last().unwrap();
            format!("{}, & {last}", rest.join(", "))
        }
    }
}

fn style_for(kind: CitationStyleKind) -> Box<dyn CitationStyle> {
    match kind {
        CitationStyleKind::Vancouver => Box::new(VancouverStyle),
        CitationStyleKind::Apa => Box::new(ApaStyle),
    }
}

/// Format an ordered reference list (first-cited order) for a set of papers.
pub fn format_reference_list(papers: &[Paper], style: CitationStyleKind) -> String {
    let formatter = style_for(style);
    if papers.is_empty() {
        return "## References\n\nNo references cited.".into();
    }
    let mut lines = vec!["## References".to_string(), String::new()];
    for (i, paper) in papers.iter().enumerate() {
        lines.push(formatter.format_reference(paper, (i + 1) as u32));
        lines.push(String::new());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn paper() -> Paper {
        Paper {
            title: "Deep learning in genomics".into(),
            authors: vec![
                Author {
                    family: "Smith".into(),
                    given: Some("Jane Q".into()),
                    orcid: None,
                },
                Author {
                    family: "Doe".into(),
                    given: Some("Alan".into()),
                    orcid: None,
                },
            ],
            year: Some(2023),
            venue: Some("Nature Methods".into()),
            identifiers: {
                let mut m = BTreeMap::new();
                m.insert("doi".into(), "10.1/xyz".into());
                m
            },
            abstract_text: None,
            citation_count: None,
            reference_count: None,
            is_open_access: false,
            pdf_url: None,
            source_tag: "test".into(),
            relevance_score: None,
        }
    }

    #[test]
    fn vancouver_inline_is_bracketed_number() {
        assert_eq!(VancouverStyle.format_inline(&paper(), 3), "[3]");
    }

    #[test]
    fn apa_inline_two_authors_uses_ampersand() {
        assert_eq!(ApaStyle.format_inline(&paper(), 1), "(Smith & Doe, 2023)");
    }

    #[test]
    fn vancouver_reference_contains_doi() {
        let r = VancouverStyle.format_reference(&paper(), 1);
        assert!(r.contains("doi:10.1/xyz"));
        assert!(r.starts_with("1. Smith JQ, Doe A."));
    }

    #[test]
    fn format_reference_list_empty_papers() {
        assert_eq!(
            format_reference_list(&[], CitationStyleKind::Apa),
            "## References\n\nNo references cited."
        );
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(CitationStyleKind::parse("APA"), Some(CitationStyleKind::Apa));
        assert_eq!(CitationStyleKind::parse("bogus"), None);
    }
}
