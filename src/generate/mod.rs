//! Generation backends.
//!
//! [`GenerationBackend`] abstracts the five collaborator services the
//! simulation consumes: scenario fabrication, asset copy, streaming
//! chat, image rendering, and combination synthesis. The trait is
//! object-safe so the orchestrator can run against the HTTP service,
//! the scripted fallback, or a test fake interchangeably.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::errors::{GenerationError, StreamError};
use crate::model::{AssetType, CanvasAsset, ChatMessage, CompanyProfile, Scenario, ScenarioSet};

pub mod http;
pub mod scripted;

pub use http::HttpBackend;
pub use scripted::ScriptedBackend;

/// Project context threaded through every generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectContext {
    pub company: CompanyProfile,
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub phase_label: String,
}

impl ProjectContext {
    pub fn new(company: CompanyProfile, scenarios: Vec<Scenario>) -> Self {
        Self {
            company,
            scenarios,
            phase_label: String::new(),
        }
    }

    pub fn with_phase(&self, label: &str) -> Self {
        let mut ctx = self.clone();
        ctx.phase_label = label.to_string();
        ctx
    }

    /// Title of the lead scenario, used to flavor prompts and images.
    pub fn scenario_label(&self) -> String {
        self.scenarios
            .first()
            .map(|s| s.title.clone())
            .unwrap_or_else(|| "crisis scenario".to_string())
    }

    /// "Title: summary" lines for every selected scenario.
    pub fn scenario_summaries(&self) -> String {
        self.scenarios
            .iter()
            .map(|s| format!("{}: {}", s.title, s.summary))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Request for one generated asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRequest {
    pub persona_id: String,
    pub asset_type: AssetType,
    pub context: ProjectContext,
}

/// Title + body returned by the asset service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAsset {
    pub title: String,
    pub content: String,
}

/// Request for one streamed chat turn.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub persona_id: String,
    /// Bounded recent-message window; truncated, never summarized.
    pub history: Vec<ChatMessage>,
    pub context: ProjectContext,
}

/// One chunk of a chat token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Incremental text.
    Token(String),
    /// End-of-stream marker; always the final chunk of a healthy stream.
    Done,
}

/// Receiving end of a chat token stream.
pub type TokenStream = mpsc::Receiver<Result<StreamChunk, StreamError>>;

/// Request for one asset visual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    pub asset_type: AssetType,
    pub title: String,
    pub content: String,
    pub company_name: String,
    pub scenario_label: String,
    pub persona_id: String,
    /// True during finalization: render at presentation quality.
    pub final_quality: bool,
}

/// Image service result. Unavailability is `image_data_uri: None`,
/// never an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageResult {
    pub image_data_uri: Option<String>,
    pub revised_prompt: Option<String>,
}

/// Request to synthesize a combination of two assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombineRequest {
    pub asset_a: CanvasAsset,
    pub asset_b: CanvasAsset,
    pub context: ProjectContext,
}

/// One persona reaction inside a combination discussion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionTurn {
    pub agent_id: String,
    pub content: String,
}

/// Replacement data for the derived asset of a combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssetData {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<AssetType>,
    pub title: String,
    pub content: String,
}

/// Combination synthesis response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombineSynthesis {
    #[serde(default)]
    pub conversation: Vec<DiscussionTurn>,
    pub new_asset: NewAssetData,
}

/// Abstraction over the generation services, enabling test mocking.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Fabricate doomsday scenarios for a company. Partial or missing
    /// horizons are tolerated and surface as empty lists.
    async fn scenarios(&self, profile: &CompanyProfile) -> Result<ScenarioSet, GenerationError>;

    /// Generate one asset's title and content. Must accept unknown
    /// persona ids and asset types (lead-persona behavior applies).
    async fn asset(&self, request: AssetRequest) -> Result<GeneratedAsset, GenerationError>;

    /// Open one chat token stream, terminated by [`StreamChunk::Done`].
    async fn chat_stream(&self, request: ChatRequest) -> Result<TokenStream, GenerationError>;

    /// Render a visual for an asset. Never errors; unavailability is
    /// signaled through an empty [`ImageResult`].
    async fn image(&self, request: ImageRequest) -> ImageResult;

    /// Synthesize a discussion and derived asset for a combination.
    async fn combine(&self, request: CombineRequest) -> Result<CombineSynthesis, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Horizon;

    fn context() -> ProjectContext {
        ProjectContext::new(
            CompanyProfile::new("Vantage Corp"),
            vec![Scenario {
                id: "1_year-0".to_string(),
                title: "Supply Chain Shatters".to_string(),
                probability: 48,
                severity: 4,
                summary: "Geopolitical shock".to_string(),
                horizon: Horizon::OneYear,
            }],
        )
    }

    #[test]
    fn test_scenario_label_uses_first() {
        assert_eq!(context().scenario_label(), "Supply Chain Shatters");
        let empty = ProjectContext::new(CompanyProfile::new("X"), vec![]);
        assert_eq!(empty.scenario_label(), "crisis scenario");
    }

    #[test]
    fn test_scenario_summaries_format() {
        let summaries = context().scenario_summaries();
        assert_eq!(summaries, "Supply Chain Shatters: Geopolitical shock");
    }

    #[test]
    fn test_with_phase_does_not_mutate_original() {
        let ctx = context();
        let phased = ctx.with_phase("research");
        assert_eq!(phased.phase_label, "research");
        assert!(ctx.phase_label.is_empty());
    }

    #[test]
    fn test_combine_synthesis_tolerates_missing_conversation() {
        let json = r#"{"new_asset": {"title": "T", "content": "C"}}"#;
        let synthesis: CombineSynthesis = serde_json::from_str(json).unwrap();
        assert!(synthesis.conversation.is_empty());
        assert!(synthesis.new_asset.asset_type.is_none());
    }
}
