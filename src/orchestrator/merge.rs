//! Additive merge helpers for phase retries
//!
//! Retrying an additive phase keeps the results already on the session and
//! folds the fresh worker output in on top, deduplicating by a per-type
//! identity key. Phase-2 papers keep the entry already on the session; for
//! re-analyzed papers, solutions, and analysis items the fresh entry
//! replaces the stored one in place.

use crate::models::{AnalysisItem, Paper, Phase4Analysis, Solution};
use crate::orchestrator::normalize::EnrichedRecord;
use std::collections::{HashMap, HashSet};

/// Identity key for a paper: pdf link when present, otherwise the
/// lowercased title
fn paper_key(paper: &Paper) -> String {
    if !paper.pdf_link.is_empty() {
        paper.pdf_link.clone()
    } else {
        paper.title.to_lowercase()
    }
}

pub fn merge_papers(existing: Vec<Paper>, incoming: Vec<Paper>) -> Vec<Paper> {
    let mut seen: HashSet<String> = existing.iter().map(paper_key).collect();
    let mut merged = existing;
    for paper in incoming {
        if seen.insert(paper_key(&paper)) {
            merged.push(paper);
        }
    }
    merged
}

/// Phase-3 merge: a paper re-analyzed in a later run replaces its earlier
/// enrichment in place.
pub fn merge_enriched_papers(existing: Vec<Paper>, incoming: Vec<Paper>) -> Vec<Paper> {
    let mut merged = existing;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, p)| (paper_key(p), i))
        .collect();
    for paper in incoming {
        let key = paper_key(&paper);
        match index.get(&key) {
            Some(&i) => merged[i] = paper,
            None => {
                index.insert(key, merged.len());
                merged.push(paper);
            }
        }
    }
    merged
}

pub fn merge_solutions(existing: Vec<Solution>, incoming: Vec<Solution>) -> Vec<Solution> {
    let mut merged = existing;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, s)| (s.dedup_key(), i))
        .collect();
    for solution in incoming {
        let key = solution.dedup_key();
        match index.get(&key) {
            Some(&i) => merged[i] = solution,
            None => {
                index.insert(key, merged.len());
                merged.push(solution);
            }
        }
    }
    merged
}

fn merge_items(existing: Vec<AnalysisItem>, incoming: Vec<AnalysisItem>) -> Vec<AnalysisItem> {
    let mut merged = existing;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, item)| (item.title.to_lowercase(), i))
        .collect();
    for item in incoming {
        let key = item.title.to_lowercase();
        match index.get(&key) {
            Some(&i) => merged[i] = item,
            None => {
                index.insert(key, merged.len());
                merged.push(item);
            }
        }
    }
    merged
}

fn merge_strings(existing: Vec<String>, incoming: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = existing.iter().cloned().collect();
    let mut merged = existing;
    for value in incoming {
        if seen.insert(value.clone()) {
            merged.push(value);
        }
    }
    merged
}

pub fn merge_analysis(
    existing: Option<Phase4Analysis>,
    incoming: Phase4Analysis,
) -> Phase4Analysis {
    match existing {
        None => incoming,
        Some(existing) => Phase4Analysis {
            most_common_methodologies: merge_items(
                existing.most_common_methodologies,
                incoming.most_common_methodologies,
            ),
            technology_or_algorithms: merge_strings(
                existing.technology_or_algorithms,
                incoming.technology_or_algorithms,
            ),
            datasets_used: merge_strings(existing.datasets_used, incoming.datasets_used),
            unique_or_less_common_approaches: merge_items(
                existing.unique_or_less_common_approaches,
                incoming.unique_or_less_common_approaches,
            ),
        },
    }
}

// ============================================================================
// Phase 3 enrichment
// ============================================================================

/// Match an analyzed record back to its phase-2 paper. Pdf link match comes
/// first (exact, then substring either way), then case-insensitive title.
fn find_base<'a>(papers: &'a [Paper], record: &EnrichedRecord) -> Option<&'a Paper> {
    if !record.pdf_link.is_empty() {
        if let Some(paper) = papers.iter().find(|p| p.pdf_link == record.pdf_link) {
            return Some(paper);
        }
        if let Some(paper) = papers.iter().find(|p| {
            !p.pdf_link.is_empty()
                && (p.pdf_link.contains(&record.pdf_link)
                    || record.pdf_link.contains(&p.pdf_link))
        }) {
            return Some(paper);
        }
    }
    if let Some(title) = &record.title {
        let lowered = title.to_lowercase();
        return papers.iter().find(|p| p.title.to_lowercase() == lowered);
    }
    None
}

/// Fold phase-3 output into the paper list. Records missing a summary or a
/// methodology are dropped, and only papers that received enrichment remain.
pub fn enrich_papers(papers: &[Paper], records: Vec<EnrichedRecord>) -> Vec<Paper> {
    let mut enriched = Vec::new();
    for record in records.into_iter().filter(|r| r.is_complete()) {
        let mut paper = match find_base(papers, &record) {
            Some(base) => base.clone(),
            None => Paper {
                title: record.title.clone().unwrap_or_else(|| "Untitled".to_string()),
                pdf_link: record.pdf_link.clone(),
                year: record.year,
                ..Default::default()
            },
        };
        paper.summary = record.summary;
        paper.methodology = record.methodology;
        paper.algorithms_used = record.algorithms_used;
        paper.result = Some(record.result);
        paper.conclusion = Some(record.conclusion);
        paper.limitations = Some(record.limitations);
        paper.future_scope = Some(record.future_scope);
        if paper.year.is_none() {
            paper.year = record.year;
        }
        enriched.push(paper);
    }
    enriched
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(title: &str, pdf_link: &str) -> Paper {
        Paper {
            title: title.to_string(),
            pdf_link: pdf_link.to_string(),
            ..Default::default()
        }
    }

    fn record(title: Option<&str>, pdf_link: &str) -> EnrichedRecord {
        EnrichedRecord {
            pdf_link: pdf_link.to_string(),
            title: title.map(|t| t.to_string()),
            year: None,
            summary: Some("summary".to_string()),
            methodology: Some("methodology".to_string()),
            algorithms_used: vec!["algo".to_string()],
            result: "result".to_string(),
            conclusion: "conclusion".to_string(),
            limitations: "Not mentioned".to_string(),
            future_scope: "Not mentioned".to_string(),
        }
    }

    #[test]
    fn test_merge_papers_dedup_by_link_then_title() {
        let existing = vec![paper("Paper A", "https://x/a.pdf"), paper("Paper B", "")];
        let incoming = vec![
            paper("Renamed A", "https://x/a.pdf"),
            paper("PAPER B", ""),
            paper("Paper C", "https://x/c.pdf"),
        ];
        let merged = merge_papers(existing, incoming);
        assert_eq!(merged.len(), 3);
        // Existing entry wins on collision
        assert_eq!(merged[0].title, "Paper A");
        assert_eq!(merged[2].title, "Paper C");
    }

    #[test]
    fn test_merge_solutions_key_is_title_and_website() {
        let mut base = Solution::default();
        base.title = "Tool".to_string();
        base.official_website = "https://tool.dev".to_string();

        let mut same_name_other_site = base.clone();
        same_name_other_site.official_website = "https://other.dev".to_string();

        let merged = merge_solutions(vec![base.clone()], vec![base, same_name_other_site]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_analysis_dedups_by_lowercase_title() {
        let existing = Phase4Analysis {
            most_common_methodologies: vec![AnalysisItem {
                title: "CNN".to_string(),
                description: "old".to_string(),
            }],
            technology_or_algorithms: vec!["PyTorch".to_string()],
            datasets_used: Vec::new(),
            unique_or_less_common_approaches: Vec::new(),
        };
        let incoming = Phase4Analysis {
            most_common_methodologies: vec![
                AnalysisItem {
                    title: "cnn".to_string(),
                    description: "new".to_string(),
                },
                AnalysisItem {
                    title: "Transformer".to_string(),
                    description: String::new(),
                },
            ],
            technology_or_algorithms: vec!["PyTorch".to_string(), "JAX".to_string()],
            datasets_used: vec!["MNIST".to_string()],
            unique_or_less_common_approaches: Vec::new(),
        };
        let merged = merge_analysis(Some(existing), incoming);
        assert_eq!(merged.most_common_methodologies.len(), 2);
        // The fresh item replaces the stored one, keeping its position
        assert_eq!(merged.most_common_methodologies[0].title, "cnn");
        assert_eq!(merged.most_common_methodologies[0].description, "new");
        assert_eq!(merged.technology_or_algorithms, vec!["PyTorch", "JAX"]);
        assert_eq!(merged.datasets_used, vec!["MNIST"]);
    }

    #[test]
    fn test_merge_solutions_new_version_wins() {
        let mut old = Solution::default();
        old.title = "Tool".to_string();
        old.official_website = "https://tool.dev".to_string();
        old.summary = "stale summary".to_string();

        let mut new = old.clone();
        new.summary = "fresh summary".to_string();
        new.pricing_or_license = "MIT".to_string();

        let merged = merge_solutions(vec![old], vec![new]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].summary, "fresh summary");
        assert_eq!(merged[0].pricing_or_license, "MIT");
    }

    #[test]
    fn test_merge_enriched_papers_replaces_earlier_enrichment() {
        let mut old = paper("Paper A", "https://x/a.pdf");
        old.summary = Some("first pass".to_string());
        let mut new = paper("Paper A", "https://x/a.pdf");
        new.summary = Some("second pass".to_string());

        let merged = merge_enriched_papers(vec![old], vec![new, paper("Paper B", "https://x/b.pdf")]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].summary.as_deref(), Some("second pass"));
        assert_eq!(merged[1].title, "Paper B");
    }

    #[test]
    fn test_enrich_drops_incomplete_records() {
        let papers = vec![paper("Paper A", "https://x/a.pdf")];
        let mut incomplete = record(None, "https://x/a.pdf");
        incomplete.methodology = None;
        let enriched = enrich_papers(&papers, vec![incomplete]);
        assert!(enriched.is_empty());
    }

    #[test]
    fn test_enrich_matches_by_link_substring_then_title() {
        let papers = vec![
            paper("Paper A", "https://arxiv.org/pdf/1234.pdf"),
            paper("Paper B", "https://x/b.pdf"),
        ];
        // Substring link match
        let by_link = record(None, "arxiv.org/pdf/1234.pdf");
        // Title match with no usable link
        let by_title = record(Some("paper b"), "");

        let enriched = enrich_papers(&papers, vec![by_link, by_title]);
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].title, "Paper A");
        assert_eq!(enriched[1].title, "Paper B");
        assert!(enriched.iter().all(|p| p.is_enriched()));
    }

    #[test]
    fn test_enrich_unmatched_record_becomes_new_paper() {
        let enriched = enrich_papers(&[], vec![record(Some("Fresh Paper"), "https://x/f.pdf")]);
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].title, "Fresh Paper");
        assert_eq!(enriched[0].pdf_link, "https://x/f.pdf");
    }

    #[test]
    fn test_enrichment_drops_unanalyzed_papers() {
        let papers = vec![paper("Paper A", "https://x/a.pdf"), paper("Paper B", "https://x/b.pdf")];
        let enriched = enrich_papers(&papers, vec![record(None, "https://x/a.pdf")]);
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].pdf_link, "https://x/a.pdf");
    }
}
