// Data models for six-phase research sessions

pub mod state_machine;

pub use state_machine::{can_transition, transition_state, StateTransitionError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Phases
// ============================================================================

/// One of the six sequential processing stages of a research session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Phase 1: prompt enhancement and subtopic decomposition
    Enhance,
    /// Phase 2: paper retrieval per subtopic
    Search,
    /// Phase 3: per-paper PDF analysis and enrichment
    PdfAnalysis,
    /// Phase 4: cross-paper methodology aggregation
    Analysis,
    /// Phase 5: existing solutions survey
    Solutions,
    /// Phase 6: final proposed solution synthesis
    Synthesis,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Enhance,
        Phase::Search,
        Phase::PdfAnalysis,
        Phase::Analysis,
        Phase::Solutions,
        Phase::Synthesis,
    ];

    /// The 1-based phase number used on the wire
    pub fn number(&self) -> u8 {
        match self {
            Phase::Enhance => 1,
            Phase::Search => 2,
            Phase::PdfAnalysis => 3,
            Phase::Analysis => 4,
            Phase::Solutions => 5,
            Phase::Synthesis => 6,
        }
    }

    pub fn from_number(n: u8) -> Option<Phase> {
        match n {
            1 => Some(Phase::Enhance),
            2 => Some(Phase::Search),
            3 => Some(Phase::PdfAnalysis),
            4 => Some(Phase::Analysis),
            5 => Some(Phase::Solutions),
            6 => Some(Phase::Synthesis),
            _ => None,
        }
    }

    pub fn next(&self) -> Option<Phase> {
        Phase::from_number(self.number() + 1)
    }

    pub fn previous(&self) -> Option<Phase> {
        match self.number() {
            1 => None,
            n => Phase::from_number(n - 1),
        }
    }

    /// Action tag sent to the external worker for this phase
    pub fn action(&self) -> &'static str {
        match self {
            Phase::Enhance => "enhance_prompt",
            Phase::Search => "process_research",
            Phase::PdfAnalysis => "process_pdfs",
            Phase::Analysis => "process_phase4",
            Phase::Solutions => "process_phase5",
            Phase::Synthesis => "process_phase6",
        }
    }

    /// Progress checkpoint when this phase enters processing
    pub fn start_progress(&self) -> u8 {
        match self {
            Phase::Enhance => 10,
            Phase::Search => 15,
            Phase::PdfAnalysis => 40,
            Phase::Analysis => 60,
            Phase::Solutions => 75,
            Phase::Synthesis => 90,
        }
    }

    /// Progress checkpoint when this phase completes
    pub fn complete_progress(&self) -> u8 {
        match self {
            Phase::Enhance => 10,
            Phase::Search => 25,
            Phase::PdfAnalysis => 55,
            Phase::Analysis => 70,
            Phase::Solutions => 85,
            Phase::Synthesis => 100,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "phase {}", self.number())
    }
}

/// Status of a single phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::Processing => "processing",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Failed => "failed",
        }
    }
}

impl Default for PhaseStatus {
    fn default() -> Self {
        PhaseStatus::Pending
    }
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PhaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PhaseStatus::Pending),
            "processing" => Ok(PhaseStatus::Processing),
            "completed" => Ok(PhaseStatus::Completed),
            "failed" => Ok(PhaseStatus::Failed),
            _ => Err(format!(
                "Invalid phase status: '{}'. Expected 'pending', 'processing', 'completed', or 'failed'",
                s
            )),
        }
    }
}

/// Overall status of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Initialized,
    Processing,
    Completed,
    Failed,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Initialized => "initialized",
            OverallStatus::Processing => "processing",
            OverallStatus::Completed => "completed",
            OverallStatus::Failed => "failed",
        }
    }
}

impl Default for OverallStatus {
    fn default() -> Self {
        OverallStatus::Initialized
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Phase Records
// ============================================================================

/// Per-phase bookkeeping: status, timing, error, raw worker response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseRecord {
    #[serde(default)]
    pub status: PhaseStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub worker_call_sent: bool,
    /// Raw worker response, retained for audit/debug
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
}

impl PhaseRecord {
    /// Reset to a fresh pending shape (destructive retry)
    pub fn reset(&mut self) {
        *self = PhaseRecord::default();
    }

    /// Mark the phase as processing now. Dispatch bookkeeping from an
    /// earlier run is cleared so a re-entered phase gets a fresh worker call.
    pub fn begin(&mut self) {
        self.status = PhaseStatus::Processing;
        self.started_at = Some(Utc::now());
        self.completed_at = None;
        self.error = None;
        self.worker_call_sent = false;
        self.raw_response = None;
    }

    /// Mark the phase completed, retaining the raw worker response
    pub fn complete(&mut self, raw_response: Option<Value>) {
        self.status = PhaseStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.worker_call_sent = true;
        self.error = None;
        self.raw_response = raw_response;
    }

    /// Mark the phase failed with a human-readable error
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = PhaseStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }
}

/// The six phase records, one named field per phase.
///
/// Access goes through [`Phase`] so callers never build `"phase" + N` keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Phases {
    #[serde(default)]
    pub phase1: PhaseRecord,
    #[serde(default)]
    pub phase2: PhaseRecord,
    #[serde(default)]
    pub phase3: PhaseRecord,
    #[serde(default)]
    pub phase4: PhaseRecord,
    #[serde(default)]
    pub phase5: PhaseRecord,
    #[serde(default)]
    pub phase6: PhaseRecord,
}

impl Phases {
    pub fn record(&self, phase: Phase) -> &PhaseRecord {
        match phase {
            Phase::Enhance => &self.phase1,
            Phase::Search => &self.phase2,
            Phase::PdfAnalysis => &self.phase3,
            Phase::Analysis => &self.phase4,
            Phase::Solutions => &self.phase5,
            Phase::Synthesis => &self.phase6,
        }
    }

    pub fn record_mut(&mut self, phase: Phase) -> &mut PhaseRecord {
        match phase {
            Phase::Enhance => &mut self.phase1,
            Phase::Search => &mut self.phase2,
            Phase::PdfAnalysis => &mut self.phase3,
            Phase::Analysis => &mut self.phase4,
            Phase::Solutions => &mut self.phase5,
            Phase::Synthesis => &mut self.phase6,
        }
    }
}

// ============================================================================
// Phase Payloads
// ============================================================================

/// A research subtopic produced by phase 1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtopic {
    #[serde(default, alias = "subtopic_id")]
    pub id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, alias = "arxiv_search_query")]
    pub search_query: Option<String>,
}

/// A paper found in phase 2, optionally enriched by phase 3
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub pdf_link: String,
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default)]
    pub relevance_score_percent: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
    // Phase 3 enrichment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methodology: Option<String>,
    #[serde(default)]
    pub algorithms_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limitations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub future_scope: Option<String>,
}

impl Paper {
    /// A paper counts as enriched once phase 3 produced both a summary and
    /// a methodology for it
    pub fn is_enriched(&self) -> bool {
        self.summary.as_deref().is_some_and(|s| !s.is_empty())
            && self.methodology.as_deref().is_some_and(|m| !m.is_empty())
    }

    /// Drop all phase-3 fields, keeping the phase-2 base record
    pub fn strip_enrichment(&mut self) {
        self.summary = None;
        self.methodology = None;
        self.algorithms_used = Vec::new();
        self.result = None;
        self.conclusion = None;
        self.limitations = None;
        self.future_scope = None;
    }
}

/// Titled item inside the phase-4 analysis lists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Cross-paper methodology analysis produced by phase 4
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase4Analysis {
    #[serde(default)]
    pub most_common_methodologies: Vec<AnalysisItem>,
    #[serde(default)]
    pub technology_or_algorithms: Vec<String>,
    #[serde(default)]
    pub datasets_used: Vec<String>,
    #[serde(default)]
    pub unique_or_less_common_approaches: Vec<AnalysisItem>,
}

/// An existing solution surveyed by phase 5
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub limitations: Vec<String>,
    #[serde(default)]
    pub target_users: String,
    #[serde(default)]
    pub platform_type: String,
    #[serde(default)]
    pub official_website: String,
    #[serde(default)]
    pub documentation_link: String,
    #[serde(default)]
    pub pricing_or_license: String,
}

impl Solution {
    /// Composite dedup key: lowercase title + official website
    pub fn dedup_key(&self) -> String {
        format!("{}_{}", self.title.to_lowercase(), self.official_website)
    }
}

/// One phase of the proposed implementation workflow (phase 6)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPhase {
    #[serde(default)]
    pub phase_title: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// A recommended tech-stack grouping (phase 6)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechStackEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<String>,
}

/// A scored evaluation factor (phase 6), rating 0-10
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorScore {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub description: String,
}

/// The final proposed solution produced by phase 6
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalSolution {
    #[serde(default)]
    pub proposed_solution: String,
    #[serde(default)]
    pub problem_understanding: String,
    #[serde(default)]
    pub solution_architecture: Vec<String>,
    #[serde(default)]
    pub implementation_workflow: Vec<WorkflowPhase>,
    #[serde(default)]
    pub recommended_tech_stack: Vec<TechStackEntry>,
    #[serde(default)]
    pub scoring_by_factors: Vec<FactorScore>,
    #[serde(default)]
    pub limitations: Vec<String>,
    #[serde(default)]
    pub additional_information: Vec<String>,
}

// ============================================================================
// Session
// ============================================================================

/// Request metadata captured at session creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Value>,
}

/// One end-to-end research run, identified by its chat id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique identifier; chat ids are never reused
    pub chat_id: String,
    /// Owning-identity reference, if the caller supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    /// Original problem statement, immutable once created
    pub original_input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_problem: Option<String>,
    #[serde(default)]
    pub embedding: Vec<f64>,
    #[serde(default)]
    pub subtopics: Vec<Subtopic>,
    #[serde(default)]
    pub papers: Vec<Paper>,
    #[serde(default)]
    pub phase4_analysis: Phase4Analysis,
    #[serde(default)]
    pub phase5_solutions: Vec<Solution>,
    #[serde(default)]
    pub phase5_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase6_solution: Option<FinalSolution>,
    #[serde(default)]
    pub phases: Phases,
    pub current_phase: u8,
    pub overall_status: OverallStatus,
    pub progress: u8,
    #[serde(default)]
    pub metadata: SessionMetadata,
    /// Optimistic-concurrency counter, bumped on every checked save
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session with phase 1 already processing
    pub fn new(
        chat_id: String,
        original_input: String,
        user_email: Option<String>,
        metadata: SessionMetadata,
    ) -> Self {
        let now = Utc::now();
        let mut session = Self {
            chat_id,
            user_email,
            original_input,
            enhanced_input: None,
            refined_problem: None,
            embedding: Vec::new(),
            subtopics: Vec::new(),
            papers: Vec::new(),
            phase4_analysis: Phase4Analysis::default(),
            phase5_solutions: Vec::new(),
            phase5_notes: String::new(),
            phase6_solution: None,
            phases: Phases::default(),
            current_phase: 1,
            overall_status: OverallStatus::Processing,
            progress: 0,
            metadata,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        session.phases.phase1.begin();
        session.set_progress(Phase::Enhance.start_progress());
        session
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Raise progress to the given checkpoint. Progress never moves backward.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }

    /// Transition a phase into processing and bump the progress checkpoint
    pub fn begin_phase(&mut self, phase: Phase) {
        self.phases.record_mut(phase).begin();
        self.current_phase = phase.number();
        self.set_progress(phase.start_progress());
        self.touch();
    }

    /// Mark a phase completed and bump the progress checkpoint
    pub fn complete_phase(&mut self, phase: Phase, raw_response: Option<Value>) {
        self.phases.record_mut(phase).complete(raw_response);
        self.set_progress(phase.complete_progress());
        self.touch();
    }

    /// Mark a phase failed with a human-readable error
    pub fn fail_phase(&mut self, phase: Phase, error: impl Into<String>) {
        self.phases.record_mut(phase).fail(error);
        self.touch();
    }

    /// Non-empty PDF links collected from the current paper list
    pub fn pdf_links(&self) -> Vec<String> {
        self.papers
            .iter()
            .map(|p| p.pdf_link.clone())
            .filter(|link| !link.is_empty())
            .collect()
    }
}

// ============================================================================
// Constants
// ============================================================================

/// Minimum word count for a problem statement
pub const MIN_PROBLEM_WORDS: usize = 30;

/// A phase stuck in processing longer than this is considered abandoned
pub const STALE_PROCESSING_MINUTES: i64 = 20;

// ============================================================================
// Tests
// ============================================================================
