//! External worker gateway
//!
//! Each phase is delegated to an external worker over a single HTTP POST to
//! a phase-specific webhook endpoint. The gateway owns endpoint
//! configuration, per-phase timeout budgets, and failure classification. It
//! never retries on its own; retrying is a session-level, user-triggered
//! decision.

use crate::models::{Phase, Subtopic};
use chrono::Utc;
use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Phase {phase} webhook request timed out")]
    Timeout { phase: u8 },

    #[error("Phase {phase} webhook failed with status {status}")]
    Http { phase: u8, status: u16 },

    #[error("Phase {phase} webhook request failed - no response received")]
    NoResponse { phase: u8 },

    #[error("Webhook URL for phase {phase} is not configured")]
    Config { phase: u8 },
}

/// Phase-specific inputs for the worker payload
#[derive(Debug, Clone)]
pub enum PhaseInputs {
    /// Phase 1: the raw problem statement
    Enhance { original_input: String },
    /// Phase 2: phase-1 output
    Search {
        refined_problem: String,
        subtopics: Vec<Subtopic>,
        embedding: Vec<f64>,
    },
    /// Phase 3: PDF links collected in phase 2
    PdfAnalysis { pdf_links: Vec<String> },
    /// Phases 4-6: driven by the refined problem alone
    ProblemOnly { refined_problem: String },
}

/// Uniform request contract to the external processing backend
pub trait WorkerGateway: Send + Sync {
    /// POST the phase payload to the phase's endpoint and return the raw
    /// JSON response body
    fn call_phase<'a>(
        &'a self,
        chat_id: &'a str,
        phase: Phase,
        inputs: PhaseInputs,
    ) -> BoxFuture<'a, Result<Value, GatewayError>>;
}

/// Timeout budget per phase. Phase 3 analyzes PDF batches and routinely
/// takes minutes; the others are interactive-scale.
pub fn timeout_for(phase: Phase) -> Duration {
    match phase {
        Phase::Enhance => Duration::from_secs(150),
        Phase::Search => Duration::from_secs(180),
        Phase::PdfAnalysis => Duration::from_secs(1200),
        Phase::Analysis | Phase::Solutions | Phase::Synthesis => Duration::from_secs(300),
    }
}

/// Build the JSON payload for a phase call. Field names follow the worker's
/// expected contract, which is not uniformly cased.
pub fn build_payload(chat_id: &str, phase: Phase, inputs: &PhaseInputs) -> Value {
    let mut object = serde_json::Map::new();
    object.insert("chatId".to_string(), json!(chat_id));
    object.insert("phase".to_string(), json!(phase.number()));
    object.insert("action".to_string(), json!(phase.action()));
    object.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));

    match inputs {
        PhaseInputs::Enhance { original_input } => {
            object.insert("originalInput".to_string(), json!(original_input));
        }
        PhaseInputs::Search {
            refined_problem,
            subtopics,
            embedding,
        } => {
            object.insert("refined_problem".to_string(), json!(refined_problem));
            object.insert("subtopics".to_string(), json!(subtopics));
            object.insert("refine_problem_embedding".to_string(), json!(embedding));
        }
        PhaseInputs::PdfAnalysis { pdf_links } => {
            object.insert("pdfLinks".to_string(), json!(pdf_links));
        }
        PhaseInputs::ProblemOnly { refined_problem } => {
            object.insert("refinedProblem".to_string(), json!(refined_problem));
        }
    }

    Value::Object(object)
}

/// Per-phase webhook endpoints, read from the environment
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    endpoints: [Option<String>; 6],
}

impl GatewayConfig {
    /// Read `RESEARCH_WEBHOOK_PHASE{1..6}_URL` from the environment.
    /// Missing endpoints are allowed at startup and surface as
    /// `GatewayError::Config` when the phase is dispatched.
    pub fn from_env() -> Self {
        let mut endpoints: [Option<String>; 6] = Default::default();
        for phase in Phase::ALL {
            let var = format!("RESEARCH_WEBHOOK_PHASE{}_URL", phase.number());
            endpoints[(phase.number() - 1) as usize] =
                std::env::var(&var).ok().filter(|v| !v.is_empty());
        }
        Self { endpoints }
    }

    pub fn with_endpoint(mut self, phase: Phase, url: impl Into<String>) -> Self {
        self.endpoints[(phase.number() - 1) as usize] = Some(url.into());
        self
    }

    pub fn endpoint(&self, phase: Phase) -> Option<&str> {
        self.endpoints[(phase.number() - 1) as usize].as_deref()
    }
}

/// HTTP implementation of the gateway over reqwest
pub struct HttpWorkerGateway {
    config: GatewayConfig,
    client: reqwest::Client,
    /// Keep-alive tuned client for phase 3's long-held connections
    long_haul_client: reqwest::Client,
}

impl HttpWorkerGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let long_haul_client = reqwest::Client::builder()
            .tcp_keepalive(Duration::from_secs(60))
            .pool_idle_timeout(Duration::from_secs(1200))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            client,
            long_haul_client,
        }
    }

    fn client_for(&self, phase: Phase) -> &reqwest::Client {
        match phase {
            Phase::PdfAnalysis => &self.long_haul_client,
            _ => &self.client,
        }
    }

    async fn dispatch(
        &self,
        chat_id: &str,
        phase: Phase,
        inputs: PhaseInputs,
    ) -> Result<Value, GatewayError> {
        let number = phase.number();
        let url = self
            .config
            .endpoint(phase)
            .ok_or(GatewayError::Config { phase: number })?;

        let payload = build_payload(chat_id, phase, &inputs);

        log::debug!("Dispatching {} for session {} to {}", phase, chat_id, url);

        let response = self
            .client_for(phase)
            .post(url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .timeout(timeout_for(phase))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout { phase: number }
                } else {
                    GatewayError::NoResponse { phase: number }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Http {
                phase: number,
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|_| GatewayError::NoResponse { phase: number })
    }
}

impl WorkerGateway for HttpWorkerGateway {
    fn call_phase<'a>(
        &'a self,
        chat_id: &'a str,
        phase: Phase,
        inputs: PhaseInputs,
    ) -> BoxFuture<'a, Result<Value, GatewayError>> {
        Box::pin(self.dispatch(chat_id, phase, inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_budgets() {
        assert_eq!(timeout_for(Phase::Enhance), Duration::from_secs(150));
        assert_eq!(timeout_for(Phase::Search), Duration::from_secs(180));
        assert_eq!(timeout_for(Phase::PdfAnalysis), Duration::from_secs(1200));
        assert_eq!(timeout_for(Phase::Analysis), Duration::from_secs(300));
        assert_eq!(timeout_for(Phase::Synthesis), Duration::from_secs(300));
    }

    #[test]
    fn test_payload_phase1() {
        let inputs = PhaseInputs::Enhance {
            original_input: "my problem".to_string(),
        };
        let payload = build_payload("chat-1", Phase::Enhance, &inputs);

        assert_eq!(payload["chatId"], "chat-1");
        assert_eq!(payload["phase"], 1);
        assert_eq!(payload["action"], "enhance_prompt");
        assert_eq!(payload["originalInput"], "my problem");
        assert!(payload.get("timestamp").is_some());
    }

    #[test]
    fn test_payload_phase2_field_names() {
        let inputs = PhaseInputs::Search {
            refined_problem: "refined".to_string(),
            subtopics: vec![],
            embedding: vec![0.1, 0.2],
        };
        let payload = build_payload("chat-1", Phase::Search, &inputs);

        assert_eq!(payload["action"], "process_research");
        assert_eq!(payload["refined_problem"], "refined");
        assert_eq!(payload["refine_problem_embedding"][1], 0.2);
    }

    #[test]
    fn test_payload_phase3_links() {
        let inputs = PhaseInputs::PdfAnalysis {
            pdf_links: vec!["https://arxiv.org/pdf/1".to_string()],
        };
        let payload = build_payload("chat-1", Phase::PdfAnalysis, &inputs);

        assert_eq!(payload["action"], "process_pdfs");
        assert_eq!(payload["pdfLinks"][0], "https://arxiv.org/pdf/1");
    }

    #[test]
    fn test_payload_later_phases() {
        let inputs = PhaseInputs::ProblemOnly {
            refined_problem: "refined".to_string(),
        };
        for phase in [Phase::Analysis, Phase::Solutions, Phase::Synthesis] {
            let payload = build_payload("chat-1", phase, &inputs);
            assert_eq!(payload["phase"], phase.number());
            assert_eq!(payload["refinedProblem"], "refined");
        }
    }

    #[test]
    fn test_config_endpoint_lookup() {
        let config = GatewayConfig::default()
            .with_endpoint(Phase::Enhance, "http://localhost:5678/phase1");
        assert_eq!(
            config.endpoint(Phase::Enhance),
            Some("http://localhost:5678/phase1")
        );
        assert_eq!(config.endpoint(Phase::Search), None);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            GatewayError::Timeout { phase: 3 }.to_string(),
            "Phase 3 webhook request timed out"
        );
        assert_eq!(
            GatewayError::Http { phase: 2, status: 502 }.to_string(),
            "Phase 2 webhook failed with status 502"
        );
    }
}
