//! Domain types shared across the simulation.
//!
//! The store is the single owner of all [`CanvasAsset`] and
//! [`ChatMessage`] records; cursor state is private to one orchestration
//! run and torn down with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel agent id used for messages typed by the human user.
pub const USER_AGENT_ID: &str = "user";

/// The company a campaign is being fabricated for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub description: String,
}

impl CompanyProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: String::new(),
            sector: String::new(),
            description: String::new(),
        }
    }
}

/// Future time bucket used to group generated risk scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "1_year")]
    OneYear,
    #[serde(rename = "5_year")]
    FiveYear,
    #[serde(rename = "10_year")]
    TenYear,
    #[serde(rename = "50_year")]
    FiftyYear,
}

impl Horizon {
    /// All horizons in display order.
    pub const ALL: [Horizon; 4] = [
        Horizon::OneYear,
        Horizon::FiveYear,
        Horizon::TenYear,
        Horizon::FiftyYear,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Horizon::OneYear => "1_year",
            Horizon::FiveYear => "5_year",
            Horizon::TenYear => "10_year",
            Horizon::FiftyYear => "50_year",
        }
    }
}

/// One fabricated doomsday scenario. Read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub id: String,
    pub title: String,
    /// Probability of materialization, 0-100.
    #[serde(default)]
    pub probability: u8,
    /// Severity, 1-5.
    #[serde(default)]
    pub severity: u8,
    #[serde(default)]
    pub summary: String,
    pub horizon: Horizon,
}

/// A full scenario-generation response, grouped per horizon.
///
/// Missing horizon keys deserialize as empty lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub company: String,
    #[serde(default)]
    pub horizons: BTreeMap<Horizon, Vec<Scenario>>,
}

impl ScenarioSet {
    /// Scenarios for one horizon; empty slice when the backend omitted it.
    pub fn for_horizon(&self, horizon: Horizon) -> &[Scenario] {
        self.horizons.get(&horizon).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Flatten all horizons in display order.
    pub fn all(&self) -> Vec<&Scenario> {
        Horizon::ALL
            .iter()
            .flat_map(|h| self.for_horizon(*h).iter())
            .collect()
    }
}

/// Closed set of asset kinds; determines default render size and
/// image-generation eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    TextCard,
    AdConcept,
    OohMockup,
    MessagingFramework,
    Manifesto,
    StickyNote,
}

impl AssetType {
    /// Default pixel dimensions for this type.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            AssetType::TextCard => (250.0, 120.0),
            AssetType::AdConcept => (250.0, 150.0),
            AssetType::OohMockup => (250.0, 150.0),
            AssetType::MessagingFramework => (250.0, 160.0),
            AssetType::Manifesto => (250.0, 180.0),
            AssetType::StickyNote => (130.0, 70.0),
        }
    }

    /// Whether finalized assets of this type receive a generated visual.
    pub fn is_visual(&self) -> bool {
        matches!(
            self,
            AssetType::AdConcept | AssetType::OohMockup | AssetType::Manifesto
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            AssetType::TextCard => "text card",
            AssetType::AdConcept => "ad concept",
            AssetType::OohMockup => "ooh mockup",
            AssetType::MessagingFramework => "messaging framework",
            AssetType::Manifesto => "manifesto",
            AssetType::StickyNote => "sticky note",
        }
    }
}

/// Lifecycle state of an asset. Forward-only in normal operation;
/// review reverts to draft only through explicit re-combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    Draft,
    Review,
    Final,
}

/// A 2D canvas coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// The unit of creative output placed on the canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasAsset {
    pub id: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub title: String,
    pub content: String,
    /// Mutable; owned by whichever entity last moved it.
    pub position: Point,
    pub state: AssetState,
    pub created_by: String,
    pub width: f64,
    pub height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    /// Parent ids, present only on assets produced by combination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_from: Option<(String, String)>,
}

impl CanvasAsset {
    /// Center of the asset's bounding box.
    pub fn center(&self) -> Point {
        Point::new(
            self.position.x + self.width / 2.0,
            self.position.y + self.height / 2.0,
        )
    }
}

/// One entry in the shared chat log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    /// Persona id, or [`USER_AGENT_ID`] for the human.
    pub agent_id: String,
    /// Grows incrementally while streaming.
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// False while streaming; true once the stream ends or errors out.
    pub is_complete: bool,
}

impl ChatMessage {
    pub fn new(id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            content: String::new(),
            timestamp: Utc::now(),
            is_complete: false,
        }
    }

    pub fn is_from_user(&self) -> bool {
        self.agent_id == USER_AGENT_ID
    }
}

/// Behavioral state of a persona's on-canvas cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorState {
    Idle,
    Working,
    Discussing,
    Reviewing,
    Creating,
}

/// Animation state for one persona. `state` and `target_position` are
/// mutated exclusively by the orchestrator; `position` exclusively by
/// the cursor engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCursor {
    pub agent_id: String,
    pub position: Point,
    pub target_position: Point,
    pub state: CursorState,
    pub color: String,
    pub label: String,
}

/// One stage of the scripted workflow. Strictly ordered, monotonically
/// advancing for a run, never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Research,
    Ideation,
    Production,
    Finalization,
    Export,
    Complete,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Research => "research",
            Phase::Ideation => "ideation",
            Phase::Production => "production",
            Phase::Finalization => "finalization",
            Phase::Export => "export",
            Phase::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
