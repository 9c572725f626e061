//! Phase orchestrator
//!
//! Drives a session through the six phases: one `tokio::spawn` per phase
//! transition, session re-loaded before every mutation, worker failures
//! persisted into the phase record and never propagated past the task
//! boundary. User-facing operations (initiate, retry, stop) validate
//! synchronously and return before the worker call resolves.

pub mod events;
pub mod merge;
pub mod normalize;

use crate::gateway::{PhaseInputs, WorkerGateway};
use crate::models::state_machine::{
    check_start_precondition, fail_if_stale, is_stale, StateTransitionError, INTERRUPTED_ERROR,
};
use crate::models::{OverallStatus, Phase, PhaseStatus, Session, SessionMetadata};
use crate::store::{sessions::SessionStore, StoreError};
use chrono::Utc;
use events::{PhaseEvent, PhaseEventBroadcaster};
use merge::{enrich_papers, merge_analysis, merge_enriched_papers, merge_papers, merge_solutions};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Error recorded when a phase is stopped manually
pub const STOPPED_ERROR: &str = "Phase manually stopped by user";

pub const NO_SUBTOPICS_ERROR: &str = "Phase 1 did not generate any subtopics";
pub const NO_PDF_LINKS_ERROR: &str = "No PDF links available for analysis";

/// What a retry does with results the phase already produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryMode {
    /// Clear the phase's results before re-running
    Destructive,
    /// Keep existing results and merge the fresh output in
    Additive,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    State(#[from] StateTransitionError),

    #[error("Phase {phase} is already processing")]
    AlreadyProcessing { phase: u8 },

    #[error("Phase {phase} is not currently processing")]
    NotProcessing { phase: u8 },
}

/// Cheap to clone; clones share the gateway and the event channel
#[derive(Clone)]
pub struct Orchestrator {
    store: SessionStore,
    gateway: Arc<dyn WorkerGateway>,
    events: PhaseEventBroadcaster,
}

impl Orchestrator {
    pub fn new(store: SessionStore, gateway: Arc<dyn WorkerGateway>) -> Self {
        Self {
            store,
            gateway,
            events: PhaseEventBroadcaster::new(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Subscribe to phase lifecycle events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PhaseEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // User-facing operations
    // ========================================================================

    /// Create a session and kick off phase 1 in the background
    pub fn initiate(
        &self,
        problem_statement: &str,
        user_email: Option<String>,
        metadata: SessionMetadata,
    ) -> Result<Session, OrchestratorError> {
        let session = self.store.create(problem_statement, user_email, metadata)?;
        self.broadcast(&session, Phase::Enhance);
        self.spawn_phase(session.chat_id.clone(), Phase::Enhance);
        Ok(session)
    }

    /// Re-run a phase.
    ///
    /// A stale processing record (older than the staleness threshold) is
    /// force-failed first; a live processing record rejects the retry. The
    /// previous phase must be completed.
    pub fn retry_phase(
        &self,
        chat_id: &str,
        phase: Phase,
        mode: RetryMode,
    ) -> Result<Session, OrchestratorError> {
        let mut session = self.store.get(chat_id)?;

        let now = Utc::now();
        let record = session.phases.record(phase);
        if record.status == PhaseStatus::Processing && !is_stale(record, now) {
            return Err(OrchestratorError::AlreadyProcessing {
                phase: phase.number(),
            });
        }
        if fail_if_stale(session.phases.record_mut(phase), now) {
            log::warn!(
                "Session {}: {} was stale, force-failed before retry",
                chat_id,
                phase
            );
        }

        check_start_precondition(&session.phases, phase)?;

        if mode == RetryMode::Destructive {
            clear_phase_data(&mut session, phase);
            session.phases.record_mut(phase).reset();
        }
        session.begin_phase(phase);
        session.overall_status = OverallStatus::Processing;
        self.store.save(&mut session)?;

        self.broadcast(&session, phase);
        self.spawn_phase(chat_id.to_string(), phase);
        Ok(session)
    }

    /// Mark a processing phase as manually stopped.
    ///
    /// The outbound worker call is not cancelled; its continuation notices
    /// the status change and discards the late result.
    pub fn stop_phase(
        &self,
        chat_id: &str,
        phase: Phase,
    ) -> Result<Session, OrchestratorError> {
        let mut session = self.store.get(chat_id)?;

        if session.phases.record(phase).status != PhaseStatus::Processing {
            return Err(OrchestratorError::NotProcessing {
                phase: phase.number(),
            });
        }

        session.fail_phase(phase, STOPPED_ERROR);
        session.overall_status = OverallStatus::Failed;
        self.store.save(&mut session)?;

        self.broadcast(&session, phase);
        Ok(session)
    }

    /// Load a session, force-failing any phase stuck in `processing` past
    /// the staleness threshold. Status reads go through here so stuck
    /// sessions surface as failed instead of processing forever.
    pub fn reconcile_stale(&self, chat_id: &str) -> Result<Session, OrchestratorError> {
        let session = self.store.get(chat_id)?;
        let now = Utc::now();
        if !Phase::ALL
            .iter()
            .any(|p| is_stale(session.phases.record(*p), now))
        {
            return Ok(session);
        }

        let session = self.store.update(chat_id, |session| {
            for phase in Phase::ALL {
                if fail_if_stale(session.phases.record_mut(phase), Utc::now()) {
                    log::warn!("Session {}: {} marked as {}", chat_id, phase, INTERRUPTED_ERROR);
                }
            }
            if session.overall_status == OverallStatus::Processing {
                session.overall_status = OverallStatus::Failed;
            }
        })?;
        Ok(session)
    }

    // ========================================================================
    // Background continuations
    // ========================================================================

    fn spawn_phase(&self, chat_id: String, phase: Phase) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_phase(&chat_id, phase).await;
        });
    }

    /// Run one phase to resolution. The phase record is already
    /// `processing` when this is spawned.
    async fn run_phase(&self, chat_id: &str, phase: Phase) {
        let session = match self.store.get(chat_id) {
            Ok(session) => session,
            Err(e) => {
                log::error!("Session {}: load before {} failed: {}", chat_id, phase, e);
                return;
            }
        };
        if session.phases.record(phase).status != PhaseStatus::Processing {
            log::warn!(
                "Session {}: {} is no longer processing, skipping dispatch",
                chat_id,
                phase
            );
            return;
        }

        let inputs = match build_inputs(&session, phase) {
            Ok(inputs) => inputs,
            Err(message) => {
                self.persist_failure(chat_id, phase, &message);
                return;
            }
        };

        log::info!("Session {}: dispatching {}", chat_id, phase);
        match self.gateway.call_phase(chat_id, phase, inputs).await {
            Ok(raw) => self.apply_success(chat_id, phase, raw),
            Err(e) => self.persist_failure(chat_id, phase, &e.to_string()),
        }
    }

    /// Persist a successful worker response and chain the next phase.
    ///
    /// If the phase stopped being `processing` while the call was in flight
    /// (manual stop, concurrent retry) the late result is discarded.
    fn apply_success(&self, chat_id: &str, phase: Phase, raw: Value) {
        let mut applied = false;
        let result = self.store.update(chat_id, |session| {
            applied = session.phases.record(phase).status == PhaseStatus::Processing;
            if applied {
                apply_phase_output(session, phase, &raw);
            }
        });

        let session = match result {
            Ok(session) => session,
            Err(e) => {
                log::error!("Session {}: persisting {} result failed: {}", chat_id, phase, e);
                return;
            }
        };
        if !applied {
            log::warn!(
                "Session {}: {} resolved after a stop or retry, result discarded",
                chat_id,
                phase
            );
            return;
        }

        self.broadcast(&session, phase);

        // Chain whatever the completion handler put into processing
        if let Some(next) = phase.next() {
            let next_record = session.phases.record(next);
            if next_record.status == PhaseStatus::Processing && !next_record.worker_call_sent {
                self.broadcast(&session, next);
                self.spawn_phase(chat_id.to_string(), next);
            } else if next_record.status == PhaseStatus::Failed {
                self.broadcast(&session, next);
            }
        }
    }

    /// Persist a worker failure. Phase 6 is best effort: its failure still
    /// resolves the session as completed at full progress.
    fn persist_failure(&self, chat_id: &str, phase: Phase, message: &str) {
        log::error!("Session {}: {} failed: {}", chat_id, phase, message);

        let result = self.store.update(chat_id, |session| {
            if session.phases.record(phase).status != PhaseStatus::Processing {
                return;
            }
            session.fail_phase(phase, message);
            if phase == Phase::Synthesis {
                session.overall_status = OverallStatus::Completed;
                session.set_progress(100);
            } else {
                session.overall_status = OverallStatus::Failed;
            }
        });

        match result {
            Ok(session) => self.broadcast(&session, phase),
            Err(e) => log::error!(
                "Session {}: persisting {} failure failed: {}",
                chat_id,
                phase,
                e
            ),
        }
    }

    fn broadcast(&self, session: &Session, phase: Phase) {
        let record = session.phases.record(phase);
        self.events.broadcast(PhaseEvent {
            chat_id: session.chat_id.clone(),
            phase,
            status: record.status,
            overall_status: session.overall_status,
            progress: session.progress,
            error: record.error.clone(),
        });
    }
}

// ============================================================================
// Phase wiring
// ============================================================================

/// Build the worker inputs for a phase from the current session state.
/// Returns a user-visible error message when the required inputs are absent.
fn build_inputs(session: &Session, phase: Phase) -> Result<PhaseInputs, String> {
    let refined_problem = || {
        session
            .refined_problem
            .clone()
            .or_else(|| session.enhanced_input.clone())
            .unwrap_or_else(|| session.original_input.clone())
    };

    match phase {
        Phase::Enhance => Ok(PhaseInputs::Enhance {
            original_input: session.original_input.clone(),
        }),
        Phase::Search => {
            if session.subtopics.is_empty() {
                return Err(NO_SUBTOPICS_ERROR.to_string());
            }
            Ok(PhaseInputs::Search {
                refined_problem: refined_problem(),
                subtopics: session.subtopics.clone(),
                embedding: session.embedding.clone(),
            })
        }
        Phase::PdfAnalysis => {
            let pdf_links = session.pdf_links();
            if pdf_links.is_empty() {
                return Err(NO_PDF_LINKS_ERROR.to_string());
            }
            Ok(PhaseInputs::PdfAnalysis { pdf_links })
        }
        Phase::Analysis | Phase::Solutions | Phase::Synthesis => Ok(PhaseInputs::ProblemOnly {
            refined_problem: refined_problem(),
        }),
    }
}

/// Fold a successful worker response into the session and set up the next
/// phase. Runs inside the store's checked read-modify-write.
fn apply_phase_output(session: &mut Session, phase: Phase, raw: &Value) {
    match phase {
        Phase::Enhance => {
            let output = normalize::normalize_phase1(raw);
            session.enhanced_input = output.enhanced_prompt;
            session.refined_problem = output.refined_problem;
            session.subtopics = output.subtopics;
            session.embedding = output.embedding;
            session.complete_phase(phase, Some(raw.clone()));

            if session.subtopics.is_empty() {
                session.fail_phase(Phase::Search, NO_SUBTOPICS_ERROR);
                session.overall_status = OverallStatus::Failed;
            } else {
                session.begin_phase(Phase::Search);
            }
        }
        Phase::Search => {
            let incoming = normalize::normalize_phase2(raw);
            session.papers = merge_papers(std::mem::take(&mut session.papers), incoming);
            session.complete_phase(phase, Some(raw.clone()));

            // No links means nothing for phase 3 to analyze; the session
            // stays where it is until the user retries phase 2
            if !session.pdf_links().is_empty() {
                session.begin_phase(Phase::PdfAnalysis);
            }
        }
        Phase::PdfAnalysis => {
            let records = normalize::normalize_phase3(raw);
            let already_enriched: Vec<_> = session
                .papers
                .iter()
                .filter(|p| p.is_enriched())
                .cloned()
                .collect();
            let fresh = enrich_papers(&session.papers, records);
            session.papers = merge_enriched_papers(already_enriched, fresh);
            session.complete_phase(phase, Some(raw.clone()));
            session.begin_phase(Phase::Analysis);
        }
        Phase::Analysis => {
            if let Some(incoming) = normalize::normalize_phase4(raw) {
                let existing = std::mem::take(&mut session.phase4_analysis);
                session.phase4_analysis = merge_analysis(Some(existing), incoming);
            }
            session.complete_phase(phase, Some(raw.clone()));
            session.begin_phase(Phase::Solutions);
        }
        Phase::Solutions => {
            let output = normalize::normalize_phase5(raw);
            session.phase5_solutions =
                merge_solutions(std::mem::take(&mut session.phase5_solutions), output.solutions);
            if !output.notes.is_empty() {
                session.phase5_notes = output.notes;
            }
            session.complete_phase(phase, Some(raw.clone()));
            session.begin_phase(Phase::Synthesis);
        }
        Phase::Synthesis => {
            match normalize::normalize_phase6(raw) {
                Some(solution) => {
                    session.phase6_solution = Some(solution);
                    session.complete_phase(phase, Some(raw.clone()));
                }
                None => {
                    session.fail_phase(phase, "Phase 6 returned no structured output");
                }
            }
            // Best effort: phase 6 resolution always completes the session
            session.overall_status = OverallStatus::Completed;
            session.set_progress(100);
        }
    }
}

/// Destructive-retry clear rules. Each phase drops only its own results;
/// phase 3 strips enrichment but keeps the phase-2 papers underneath.
fn clear_phase_data(session: &mut Session, phase: Phase) {
    match phase {
        Phase::Enhance => {
            session.enhanced_input = None;
            session.refined_problem = None;
            session.subtopics.clear();
            session.embedding.clear();
        }
        Phase::Search => session.papers.clear(),
        Phase::PdfAnalysis => {
            for paper in &mut session.papers {
                paper.strip_enrichment();
            }
        }
        Phase::Analysis => session.phase4_analysis = Default::default(),
        Phase::Solutions => {
            session.phase5_solutions.clear();
            session.phase5_notes.clear();
        }
        Phase::Synthesis => session.phase6_solution = None,
    }
}

// ============================================================================
// Tests
// ============================================================================
