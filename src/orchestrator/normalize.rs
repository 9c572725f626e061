//! Response-shape normalization
//!
//! The external worker returns payloads in three shapes: a bare object, an
//! array whose first element (or whole body) is the payload, or an object
//! wrapping a named field. One adapter per phase folds all of them into the
//! phase's canonical payload type. Precedence per adapter: named wrapper
//! field first, then array unwrapping, then the bare value.

use crate::models::{
    AnalysisItem, FactorScore, FinalSolution, Paper, Phase4Analysis, Solution, Subtopic,
    TechStackEntry, WorkflowPhase,
};
use crate::utils::clean_abstract;
use serde_json::Value;

// ============================================================================
// Shared helpers
// ============================================================================

fn get_str(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = value.get(*key).and_then(|v| v.as_str()) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

fn get_string_list(value: &Value, keys: &[&str]) -> Vec<String> {
    for key in keys {
        if let Some(arr) = value.get(*key).and_then(|v| v.as_array()) {
            return arr
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect();
        }
    }
    Vec::new()
}

/// Authors arrive either as an array or as a comma-separated string
fn get_authors(value: &Value) -> Vec<String> {
    match value.get("authors") {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn get_item_list(value: &Value, key: &str) -> Vec<AnalysisItem> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|item| {
                    let title = get_str(item, &["title"])?;
                    Some(AnalysisItem {
                        title,
                        description: get_str(item, &["description"]).unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Unwrap `{wrapper: payload}`, `[payload, ...]`, or a bare payload into the
/// inner value
fn unwrap_first(raw: &Value, wrapper: &str) -> Value {
    if let Some(inner) = raw.get(wrapper) {
        return unwrap_first(inner, wrapper);
    }
    if let Some(arr) = raw.as_array() {
        return arr.first().cloned().unwrap_or(Value::Null);
    }
    raw.clone()
}

/// Unwrap `{wrapper: [..]}`, a bare array, or a bare object into a list of
/// payload elements
fn unwrap_list(raw: &Value, wrapper: &str) -> Vec<Value> {
    if let Some(inner) = raw.get(wrapper) {
        return unwrap_list(inner, wrapper);
    }
    match raw {
        Value::Array(arr) => arr.clone(),
        Value::Object(_) => vec![raw.clone()],
        _ => Vec::new(),
    }
}

// ============================================================================
// Phase 1: prompt enhancement
// ============================================================================

/// Canonical phase-1 payload
#[derive(Debug, Clone, Default)]
pub struct Phase1Output {
    pub enhanced_prompt: Option<String>,
    pub refined_problem: Option<String>,
    pub subtopics: Vec<Subtopic>,
    pub embedding: Vec<f64>,
}

pub fn normalize_phase1(raw: &Value) -> Phase1Output {
    let body = unwrap_first(raw, "phase1Data");

    let refined_problem = get_str(&body, &["refine_problem", "refined_problem"]);
    let enhanced_prompt = get_str(
        &body,
        &["enhancedPrompt", "refine_problem", "refined_problem"],
    );

    let subtopics = body
        .get("subtopics")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .enumerate()
                .filter_map(|(i, topic)| normalize_subtopic(topic, i))
                .collect()
        })
        .unwrap_or_default();

    let embedding = body
        .get("refine_problem_embedding")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_f64()).collect())
        .unwrap_or_default();

    Phase1Output {
        enhanced_prompt,
        refined_problem,
        subtopics,
        embedding,
    }
}

/// Subtopics arrive either as plain strings or as objects with varying
/// field names
fn normalize_subtopic(topic: &Value, index: usize) -> Option<Subtopic> {
    if let Some(title) = topic.as_str() {
        return Some(Subtopic {
            id: Some(index as i64 + 1),
            title: title.to_string(),
            description: title.to_string(),
            keywords: vec![title.to_string()],
            search_query: None,
        });
    }

    if topic.is_object() {
        let title = get_str(topic, &["title", "subtopic", "name"])
            .unwrap_or_else(|| "Untitled".to_string());
        return Some(Subtopic {
            id: topic
                .get("subtopic_id")
                .and_then(|v| v.as_i64())
                .or(Some(index as i64 + 1)),
            description: get_str(topic, &["description"]).unwrap_or_else(|| title.clone()),
            keywords: {
                let keywords = get_string_list(topic, &["keywords"]);
                if keywords.is_empty() {
                    vec![title.clone()]
                } else {
                    keywords
                }
            },
            search_query: get_str(topic, &["arxiv_search_query", "searchQuery"]),
            title,
        });
    }

    None
}

// ============================================================================
// Phase 2: paper retrieval
// ============================================================================

pub fn normalize_phase2(raw: &Value) -> Vec<Paper> {
    unwrap_list(raw, "phase2Data")
        .iter()
        .filter_map(normalize_paper)
        .collect()
}

fn normalize_paper(paper: &Value) -> Option<Paper> {
    if !paper.is_object() {
        return None;
    }
    let title = get_str(paper, &["title", "paper_title"]).unwrap_or_else(|| "Untitled".to_string());
    let relevance_score = paper
        .get("semantic_score")
        .or_else(|| paper.get("semanticScore"))
        .or_else(|| paper.get("relevanceScore"))
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);

    Some(Paper {
        title,
        authors: get_authors(paper),
        abstract_text: clean_abstract(&get_str(paper, &["abstract"]).unwrap_or_default()),
        pdf_link: get_str(paper, &["pdf_url", "pdfLink", "pdf_link"]).unwrap_or_default(),
        relevance_score,
        relevance_score_percent: if relevance_score > 0.0 {
            Some((relevance_score * 100.0).round() as u32)
        } else {
            None
        },
        year: paper.get("year").and_then(|v| v.as_i64()).map(|y| y as i32),
        summary: None,
        methodology: None,
        algorithms_used: Vec::new(),
        result: None,
        conclusion: None,
        limitations: None,
        future_scope: None,
    })
}

// ============================================================================
// Phase 3: per-paper enrichment
// ============================================================================

/// One analyzed-paper record from the phase-3 worker, before it is matched
/// against the phase-2 paper list
#[derive(Debug, Clone)]
pub struct EnrichedRecord {
    pub pdf_link: String,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub summary: Option<String>,
    pub methodology: Option<String>,
    pub algorithms_used: Vec<String>,
    pub result: String,
    pub conclusion: String,
    pub limitations: String,
    pub future_scope: String,
}

impl EnrichedRecord {
    /// Only records carrying both a summary and a methodology survive the
    /// enrichment filter
    pub fn is_complete(&self) -> bool {
        self.summary.as_deref().is_some_and(|s| !s.is_empty())
            && self.methodology.as_deref().is_some_and(|m| !m.is_empty())
    }
}

pub fn normalize_phase3(raw: &Value) -> Vec<EnrichedRecord> {
    unwrap_list(raw, "phase3Data")
        .iter()
        .filter_map(|record| {
            if !record.is_object() {
                return None;
            }
            Some(EnrichedRecord {
                pdf_link: get_str(record, &["pdf_link", "pdfLink", "pdf_url"]).unwrap_or_default(),
                title: get_str(record, &["title"]),
                year: record
                    .get("year")
                    .and_then(|v| v.as_i64())
                    .map(|y| y as i32),
                summary: get_str(record, &["summary"]),
                methodology: get_str(record, &["methodology"]),
                algorithms_used: get_string_list(record, &["algorithms_used", "algorithmsUsed"]),
                result: get_str(record, &["result"]).unwrap_or_default(),
                conclusion: get_str(record, &["conclusion"]).unwrap_or_default(),
                limitations: get_str(record, &["limitations"])
                    .unwrap_or_else(|| "Not mentioned".to_string()),
                future_scope: get_str(record, &["future_scope", "futureScope"])
                    .unwrap_or_else(|| "Not mentioned".to_string()),
            })
        })
        .collect()
}

// ============================================================================
// Phase 4: methodology analysis
// ============================================================================

pub fn normalize_phase4(raw: &Value) -> Option<Phase4Analysis> {
    let body = unwrap_first(raw, "phase4Data");
    let cleaned = body.get("cleanedOutput").cloned().unwrap_or(body);
    if !cleaned.is_object() {
        return None;
    }

    Some(Phase4Analysis {
        most_common_methodologies: get_item_list(&cleaned, "most_common_methodologies"),
        technology_or_algorithms: get_string_list(&cleaned, &["technology_or_algorithms"]),
        datasets_used: get_string_list(&cleaned, &["datasets_used"]),
        unique_or_less_common_approaches: get_item_list(
            &cleaned,
            "unique_or_less_common_approaches",
        ),
    })
}

// ============================================================================
// Phase 5: existing solutions
// ============================================================================

/// Canonical phase-5 payload
#[derive(Debug, Clone, Default)]
pub struct Phase5Output {
    pub solutions: Vec<Solution>,
    pub notes: String,
}

pub fn normalize_phase5(raw: &Value) -> Phase5Output {
    let body = unwrap_first(raw, "phase5Data");

    let solutions = body
        .get("solutions")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(normalize_solution).collect())
        .unwrap_or_default();

    Phase5Output {
        solutions,
        notes: get_str(&body, &["notes"]).unwrap_or_default(),
    }
}

fn normalize_solution(solution: &Value) -> Option<Solution> {
    if !solution.is_object() {
        return None;
    }
    // Limitations may arrive as a list or a single string
    let limitations = match solution.get("limitations") {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    };

    Some(Solution {
        title: get_str(solution, &["title"]).unwrap_or_default(),
        summary: get_str(solution, &["summary"]).unwrap_or_default(),
        features: get_string_list(solution, &["features"]),
        limitations,
        target_users: get_str(solution, &["target_users", "targetUsers"]).unwrap_or_default(),
        platform_type: get_str(solution, &["platform_type", "platformType"]).unwrap_or_default(),
        official_website: get_str(solution, &["official_website", "officialWebsite"])
            .unwrap_or_default(),
        documentation_link: get_str(solution, &["documentation_link", "documentationLink"])
            .unwrap_or_default(),
        pricing_or_license: get_str(solution, &["pricing_or_license", "pricingOrLicense"])
            .unwrap_or_default(),
    })
}

// ============================================================================
// Phase 6: final solution
// ============================================================================

pub fn normalize_phase6(raw: &Value) -> Option<FinalSolution> {
    let body = unwrap_first(raw, "phase6Data");
    let structured = body.get("structuredOutput").cloned().unwrap_or(body);
    if !structured.is_object() {
        return None;
    }

    let implementation_workflow = structured
        .get("Implementation Workflow")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .map(|phase| WorkflowPhase {
                    phase_title: get_str(phase, &["phase_title", "phaseTitle"]).unwrap_or_default(),
                    steps: get_string_list(phase, &["steps"]),
                })
                .collect()
        })
        .unwrap_or_default();

    let recommended_tech_stack = structured
        .get("Recommended Tech Stack")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .map(|stack| TechStackEntry {
                    title: get_str(stack, &["title"]).unwrap_or_default(),
                    items: get_string_list(stack, &["items"]),
                })
                .collect()
        })
        .unwrap_or_default();

    let scoring_by_factors = structured
        .get("Scoring by Factors")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .map(|score| FactorScore {
                    title: get_str(score, &["title"]).unwrap_or_default(),
                    rating: score.get("rating").and_then(|v| v.as_f64()).unwrap_or(0.0),
                    description: get_str(score, &["description"]).unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    Some(FinalSolution {
        proposed_solution: get_str(&structured, &["proposed_solution", "proposedSolution"])
            .unwrap_or_default(),
        problem_understanding: get_str(&structured, &["Problem Understanding"])
            .unwrap_or_default(),
        solution_architecture: get_string_list(
            &structured,
            &["Solution Architecture & Approach"],
        ),
        implementation_workflow,
        recommended_tech_stack,
        scoring_by_factors,
        limitations: get_string_list(&structured, &["Limitations & Open Questions"]),
        additional_information: get_string_list(&structured, &["Additional Information"]),
    })
}

// ============================================================================
// Tests
// ============================================================================
