//! Drag-to-combine: proximity detection and the merge flow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::canvas::factory::AssetFactory;
use crate::config::Config;
use crate::generate::{CombineRequest, CombineSynthesis, DiscussionTurn, GenerationBackend, NewAssetData, ProjectContext};
use crate::model::{AssetState, CanvasAsset, ChatMessage};
use crate::store::CanvasStore;

/// Extra slack (px) beyond touching boxes; deliberately generous so
/// drag-to-combine feels forgiving.
pub const PROXIMITY_THRESHOLD: f64 = 80.0;

/// Pause between revealed discussion turns.
const REVEAL_STAGGER_MS: u64 = 500;

/// AABB near-touch test on box centers. Symmetric in its arguments.
pub fn proximity(a: &CanvasAsset, b: &CanvasAsset) -> bool {
    let ca = a.center();
    let cb = b.center();

    let dx = (ca.x - cb.x).abs();
    let dy = (ca.y - cb.y).abs();

    dx < (a.width + b.width) / 2.0 + PROXIMITY_THRESHOLD
        && dy < (a.height + b.height) / 2.0 + PROXIMITY_THRESHOLD
}

/// Nearest proximate asset to the dragged one, by center distance.
///
/// Ties are broken by iteration order over `all` — acceptable
/// non-determinism for a cosmetic feature; do not rely on it.
pub fn find_combine_target<'a>(
    dragged: &CanvasAsset,
    all: &'a [CanvasAsset],
) -> Option<&'a CanvasAsset> {
    let mut closest: Option<&CanvasAsset> = None;
    let mut closest_dist = f64::INFINITY;

    for other in all {
        if other.id == dragged.id {
            continue;
        }
        if !proximity(dragged, other) {
            continue;
        }

        let dist = dragged.position.distance_to(other.position);
        if dist < closest_dist {
            closest_dist = dist;
            closest = Some(other);
        }
    }

    closest
}

/// Executes a confirmed combination: synthesized discussion revealed
/// with a stagger, then the derived asset. Never fails outward — a
/// synthesis failure falls back to joining the parents' text locally.
pub struct CombineFlow {
    backend: Arc<dyn GenerationBackend>,
    store: CanvasStore,
    factory: Arc<Mutex<AssetFactory>>,
    config: Config,
    in_flight: AtomicBool,
}

impl CombineFlow {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        store: CanvasStore,
        factory: Arc<Mutex<AssetFactory>>,
        config: Config,
    ) -> Self {
        Self {
            backend,
            store,
            factory,
            config,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Handle a drag release of `dragged_id` onto `target_id`.
    ///
    /// Returns the derived asset, or `None` when either parent is gone
    /// or another combination is already in flight.
    pub async fn combine(
        &self,
        dragged_id: &str,
        target_id: &str,
        context: &ProjectContext,
    ) -> Option<CanvasAsset> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return None;
        }
        let result = self.combine_inner(dragged_id, target_id, context).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn combine_inner(
        &self,
        dragged_id: &str,
        target_id: &str,
        context: &ProjectContext,
    ) -> Option<CanvasAsset> {
        let asset_a = self.store.asset(dragged_id)?;
        let asset_b = self.store.asset(target_id)?;

        let request = CombineRequest {
            asset_a: asset_a.clone(),
            asset_b: asset_b.clone(),
            context: context.clone(),
        };

        let budget = Duration::from_secs(self.config.generation_timeout_secs);
        let synthesis = match timeout(budget, self.backend.combine(request)).await {
            Ok(Ok(synthesis)) => synthesis,
            Ok(Err(err)) => {
                warn!("Combination synthesis failed, joining locally: {}", err);
                local_fallback(&asset_a, &asset_b)
            }
            Err(_) => {
                warn!("Combination synthesis timed out, joining locally");
                local_fallback(&asset_a, &asset_b)
            }
        };

        for turn in &synthesis.conversation {
            self.reveal_turn(turn);
            sleep(Duration::from_millis(
                self.config.scaled_delay_ms(REVEAL_STAGGER_MS),
            ))
            .await;
        }

        let combined = self.factory.lock().create_combined_asset(
            &asset_a,
            &asset_b,
            synthesis.new_asset.asset_type,
            synthesis.new_asset.title,
            synthesis.new_asset.content,
            None,
        );
        debug!(
            "Combined {} + {} into {}",
            asset_a.id, asset_b.id, combined.id
        );
        self.store.add_asset(combined.clone());

        // Dim the parents; their content is never touched
        self.store.update_asset_state(dragged_id, AssetState::Review);
        self.store.update_asset_state(target_id, AssetState::Review);

        Some(combined)
    }

    fn reveal_turn(&self, turn: &DiscussionTurn) {
        let mut message = ChatMessage::new(
            format!("combine-{}", Uuid::new_v4().simple()),
            turn.agent_id.clone(),
        );
        message.content = turn.content.clone();
        message.is_complete = true;
        self.store.add_message(message);
    }
}

/// Local join used when synthesis is unavailable: the interaction must
/// never silently fail.
fn local_fallback(a: &CanvasAsset, b: &CanvasAsset) -> CombineSynthesis {
    CombineSynthesis {
        conversation: vec![DiscussionTurn {
            agent_id: "boris".to_string(),
            content: "The combination has potential. Let us refine it.".to_string(),
        }],
        new_asset: NewAssetData {
            asset_type: None,
            title: format!("{} + {}", a.title, b.title),
            content: format!("{}\n\n---\n\n{}", a.content, b.content),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetType, Point};
    use proptest::prelude::*;

    fn asset_at(id: &str, x: f64, y: f64, w: f64, h: f64) -> CanvasAsset {
        CanvasAsset {
            id: id.to_string(),
            asset_type: AssetType::TextCard,
            title: format!("{} title", id),
            content: format!("{} content", id),
            // Center the box on (x, y)
            position: Point::new(x - w / 2.0, y - h / 2.0),
            state: AssetState::Draft,
            created_by: "boris".to_string(),
            width: w,
            height: h,
            image_url: None,
            image_prompt: None,
            combined_from: None,
        }
    }

    #[test]
    fn test_proximity_near_and_far() {
        // Centers 40px apart, half-width sum 100, threshold 80
        let a = asset_at("a", 100.0, 100.0, 100.0, 100.0);
        let b = asset_at("b", 140.0, 100.0, 100.0, 100.0);
        assert!(proximity(&a, &b));

        let far = asset_at("b", 500.0, 100.0, 100.0, 100.0);
        assert!(!proximity(&a, &far));
    }

    #[test]
    fn test_find_target_picks_nearest() {
        let dragged = asset_at("d", 100.0, 100.0, 100.0, 100.0);
        let near = asset_at("near", 150.0, 100.0, 100.0, 100.0);
        let nearer = asset_at("nearer", 120.0, 100.0, 100.0, 100.0);
        let all = vec![dragged.clone(), near, nearer];
        let target = find_combine_target(&dragged, &all).unwrap();
        assert_eq!(target.id, "nearer");
    }

    #[test]
    fn test_find_target_ignores_self_and_distant() {
        let dragged = asset_at("d", 100.0, 100.0, 100.0, 100.0);
        let distant = asset_at("x", 900.0, 900.0, 100.0, 100.0);
        let all = vec![dragged.clone(), distant];
        assert!(find_combine_target(&dragged, &all).is_none());
    }

    #[test]
    fn test_local_fallback_joins_text() {
        let a = asset_at("a", 0.0, 0.0, 10.0, 10.0);
        let b = asset_at("b", 0.0, 0.0, 10.0, 10.0);
        let synthesis = local_fallback(&a, &b);
        assert_eq!(synthesis.new_asset.title, "a title + b title");
        assert!(synthesis.new_asset.content.contains("a content"));
        assert!(synthesis.new_asset.content.contains("b content"));
        assert!(!synthesis.conversation.is_empty());
    }

    proptest! {
        /// The proximity test is symmetric in its arguments.
        #[test]
        fn prop_proximity_symmetric(
            ax in -1000.0f64..1000.0, ay in -1000.0f64..1000.0,
            bx in -1000.0f64..1000.0, by in -1000.0f64..1000.0,
            aw in 10.0f64..400.0, ah in 10.0f64..400.0,
            bw in 10.0f64..400.0, bh in 10.0f64..400.0,
        ) {
            let a = asset_at("a", ax, ay, aw, ah);
            let b = asset_at("b", bx, by, bw, bh);
            prop_assert_eq!(proximity(&a, &b), proximity(&b, &a));
        }
    }
}
