//! Deterministic placement and construction of canvas assets.
//!
//! Each persona owns a vertical zone; assets stack into three rows per
//! column and wrap into a second column. All counters are owned by the
//! factory instance so a new orchestration run starts from a clean
//! layout without touching process-wide state.

use std::collections::HashMap;

use uuid::Uuid;

use crate::model::{AssetState, AssetType, CanvasAsset, Point};
use crate::personas::PERSONAS;

const ZONE_WIDTH: f64 = 280.0;
const ZONE_GAP: f64 = 16.0;
const START_X: f64 = 40.0;
const START_Y: f64 = 50.0;
const ZONE_PADDING: f64 = 10.0;
const ROW_PITCH: f64 = 100.0;
const COLUMN_OFFSET: f64 = 130.0;
const ROWS_PER_COLUMN: u32 = 3;

/// Vertical drop below the lower parent when placing a combined asset.
const COMBINED_DROP: f64 = 40.0;

/// Inputs for [`AssetFactory::create_asset`].
#[derive(Debug, Clone)]
pub struct AssetSpec {
    pub asset_type: AssetType,
    pub title: String,
    pub content: String,
    pub created_by: String,
    /// Explicit position; otherwise the next open slot in the
    /// creator's zone is used.
    pub position: Option<Point>,
    pub state: Option<AssetState>,
}

impl AssetSpec {
    pub fn new(
        asset_type: AssetType,
        title: impl Into<String>,
        content: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            asset_type,
            title: title.into(),
            content: content.into(),
            created_by: created_by.into(),
            position: None,
            state: None,
        }
    }
}

/// Run-owned asset construction state.
#[derive(Debug)]
pub struct AssetFactory {
    /// Short nonce distinguishing ids across runs.
    run_nonce: String,
    asset_counter: u64,
    slot_counters: HashMap<String, u32>,
}

impl AssetFactory {
    pub fn new() -> Self {
        Self {
            run_nonce: fresh_nonce(),
            asset_counter: 0,
            slot_counters: HashMap::new(),
        }
    }

    /// Reset layout and id counters for a fresh orchestration run. The
    /// nonce is regenerated so ids from successive runs never collide
    /// in a store that keeps accumulating.
    pub fn reset(&mut self) {
        self.run_nonce = fresh_nonce();
        self.asset_counter = 0;
        self.slot_counters.clear();
    }

    fn next_id(&mut self) -> String {
        self.asset_counter += 1;
        format!("asset-{}-{}", self.run_nonce, self.asset_counter)
    }

    /// Zero-based column index of a persona's zone, left to right.
    fn zone_column(agent_id: &str) -> usize {
        PERSONAS
            .iter()
            .position(|p| p.id == agent_id)
            .unwrap_or(0)
    }

    /// Next open slot inside the given persona's zone. Consumes the slot.
    pub fn next_position(&mut self, agent_id: &str) -> Point {
        let slot = self.slot_counters.entry(agent_id.to_string()).or_insert(0);
        let slot_index = *slot;
        *slot += 1;

        let col = Self::zone_column(agent_id) as f64;
        let zone_x = START_X + col * (ZONE_WIDTH + ZONE_GAP);

        let row_in_col = f64::from(slot_index % ROWS_PER_COLUMN);
        let col_offset = f64::from(slot_index / ROWS_PER_COLUMN);

        Point::new(
            zone_x + ZONE_PADDING + col_offset * COLUMN_OFFSET,
            START_Y + 22.0 + ZONE_PADDING + row_in_col * ROW_PITCH,
        )
    }

    /// Construct a new asset. Never fails for well-formed input.
    pub fn create_asset(&mut self, spec: AssetSpec) -> CanvasAsset {
        let position = match spec.position {
            Some(p) => p,
            None => self.next_position(&spec.created_by),
        };
        let (width, height) = spec.asset_type.dimensions();

        CanvasAsset {
            id: self.next_id(),
            asset_type: spec.asset_type,
            title: spec.title,
            content: spec.content,
            position,
            state: spec.state.unwrap_or(AssetState::Draft),
            created_by: spec.created_by,
            width,
            height,
            image_url: None,
            image_prompt: None,
            combined_from: None,
        }
    }

    /// Construct the derived asset for a combination. Positioned at the
    /// horizontal midpoint of the parents, dropped below whichever
    /// parent sits lower. Parents are not touched.
    pub fn create_combined_asset(
        &mut self,
        parent_a: &CanvasAsset,
        parent_b: &CanvasAsset,
        asset_type: Option<AssetType>,
        title: String,
        content: String,
        created_by: Option<String>,
    ) -> CanvasAsset {
        let mid_x = (parent_a.position.x + parent_b.position.x) / 2.0;
        let below_y = parent_a.position.y.max(parent_b.position.y) + COMBINED_DROP;
        let asset_type = asset_type.unwrap_or(parent_a.asset_type);
        let (width, height) = asset_type.dimensions();

        CanvasAsset {
            id: self.next_id(),
            asset_type,
            title,
            content,
            position: Point::new(mid_x, below_y),
            state: AssetState::Draft,
            created_by: created_by.unwrap_or_else(|| parent_a.created_by.clone()),
            width,
            height,
            image_url: None,
            image_prompt: None,
            combined_from: Some((parent_a.id.clone(), parent_b.id.clone())),
        }
    }
}

impl Default for AssetFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn fresh_nonce() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssetType;

    #[test]
    fn test_ids_are_unique_and_monotonic() {
        let mut factory = AssetFactory::new();
        let a = factory.create_asset(AssetSpec::new(AssetType::TextCard, "a", "", "boris"));
        let b = factory.create_asset(AssetSpec::new(AssetType::TextCard, "b", "", "boris"));
        assert_ne!(a.id, b.id);
        assert!(a.id.ends_with("-1"));
        assert!(b.id.ends_with("-2"));
    }

    #[test]
    fn test_dimensions_from_type_table() {
        let mut factory = AssetFactory::new();
        let note = factory.create_asset(AssetSpec::new(AssetType::StickyNote, "n", "", "gremlin"));
        assert_eq!((note.width, note.height), (130.0, 70.0));
    }

    #[test]
    fn test_slots_stack_then_wrap() {
        let mut factory = AssetFactory::new();
        let p0 = factory.next_position("boris");
        let p1 = factory.next_position("boris");
        let p2 = factory.next_position("boris");
        let p3 = factory.next_position("boris");

        // First three stack vertically in one column
        assert_eq!(p0.x, p1.x);
        assert_eq!(p1.x, p2.x);
        assert!((p1.y - p0.y - 100.0).abs() < f64::EPSILON);
        // Fourth wraps into a second column at the top row
        assert!((p3.x - p0.x - 130.0).abs() < f64::EPSILON);
        assert!((p3.y - p0.y).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zones_are_per_persona() {
        let mut factory = AssetFactory::new();
        let boris = factory.next_position("boris");
        let nadia = factory.next_position("nadia");
        assert!((nadia.x - boris.x - (280.0 + 16.0)).abs() < f64::EPSILON);
        assert_eq!(boris.y, nadia.y);
    }

    #[test]
    fn test_unknown_persona_uses_first_zone() {
        let mut factory = AssetFactory::new();
        let known = factory.next_position("boris");
        factory.reset();
        let unknown = factory.next_position("somebody-else");
        assert_eq!(known.x, unknown.x);
    }

    #[test]
    fn test_reset_restarts_layout() {
        let mut factory = AssetFactory::new();
        let first = factory.next_position("gremlin");
        factory.next_position("gremlin");
        factory.reset();
        let after_reset = factory.next_position("gremlin");
        assert_eq!(first, after_reset);
    }

    #[test]
    fn test_explicit_position_bypasses_slots() {
        let mut factory = AssetFactory::new();
        let mut spec = AssetSpec::new(AssetType::TextCard, "t", "", "nadia");
        spec.position = Some(Point::new(7.0, 9.0));
        let asset = factory.create_asset(spec);
        assert_eq!(asset.position, Point::new(7.0, 9.0));
        // Slot counter untouched: next auto-placement is the zone's first slot
        let auto = factory.next_position("nadia");
        assert!((auto.y - (50.0 + 22.0 + 10.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_combined_asset_placement_and_provenance() {
        let mut factory = AssetFactory::new();
        let mut spec_a = AssetSpec::new(AssetType::AdConcept, "A", "alpha", "boris");
        spec_a.position = Some(Point::new(100.0, 100.0));
        let a = factory.create_asset(spec_a);
        let mut spec_b = AssetSpec::new(AssetType::StickyNote, "B", "beta", "gremlin");
        spec_b.position = Some(Point::new(300.0, 180.0));
        let b = factory.create_asset(spec_b);

        let combined = factory.create_combined_asset(
            &a,
            &b,
            None,
            "A x B".to_string(),
            "merged".to_string(),
            None,
        );

        assert_eq!(combined.position.x, 200.0);
        assert_eq!(combined.position.y, 220.0);
        // Type defaults to parent A's
        assert_eq!(combined.asset_type, AssetType::AdConcept);
        assert_eq!(combined.state, AssetState::Draft);
        assert_eq!(combined.created_by, "boris");
        assert_eq!(
            combined.combined_from,
            Some((a.id.clone(), b.id.clone()))
        );
    }
}
