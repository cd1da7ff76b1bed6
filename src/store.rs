//! Shared state store for one simulation session.
//!
//! Single owner of all asset and chat records plus the phase flag. The
//! orchestrator and the combine flow are the only writers; the
//! presentation layer reads snapshots. Handles are cheap clones sharing
//! one underlying store.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::model::{AssetState, CanvasAsset, ChatMessage, Phase, Point};

#[derive(Debug, Default)]
struct StoreInner {
    assets: Vec<CanvasAsset>,
    messages: Vec<ChatMessage>,
    phase: Option<Phase>,
    complete: bool,
}

/// Clone-able handle to the session's shared state.
#[derive(Debug, Clone, Default)]
pub struct CanvasStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl CanvasStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Assets ──────────────────────────────────────────────────────

    pub fn add_asset(&self, asset: CanvasAsset) {
        self.inner.write().assets.push(asset);
    }

    /// Apply a partial update to one asset. Unknown ids are ignored.
    pub fn update_asset(&self, id: &str, update: impl FnOnce(&mut CanvasAsset)) {
        let mut inner = self.inner.write();
        if let Some(asset) = inner.assets.iter_mut().find(|a| a.id == id) {
            update(asset);
        }
    }

    pub fn update_asset_position(&self, id: &str, position: Point) {
        self.update_asset(id, |a| a.position = position);
    }

    pub fn update_asset_state(&self, id: &str, state: AssetState) {
        self.update_asset(id, |a| a.state = state);
    }

    pub fn set_asset_image(&self, id: &str, url: String, prompt: Option<String>) {
        self.update_asset(id, |a| {
            a.image_url = Some(url);
            a.image_prompt = prompt;
        });
    }

    pub fn remove_asset(&self, id: &str) {
        self.inner.write().assets.retain(|a| a.id != id);
    }

    pub fn assets(&self) -> Vec<CanvasAsset> {
        self.inner.read().assets.clone()
    }

    pub fn asset(&self, id: &str) -> Option<CanvasAsset> {
        self.inner.read().assets.iter().find(|a| a.id == id).cloned()
    }

    pub fn asset_count(&self) -> usize {
        self.inner.read().assets.len()
    }

    /// All assets in `Final` state, for the export surface.
    pub fn final_assets(&self) -> Vec<CanvasAsset> {
        self.inner
            .read()
            .assets
            .iter()
            .filter(|a| a.state == AssetState::Final)
            .cloned()
            .collect()
    }

    // ── Chat log ────────────────────────────────────────────────────

    pub fn add_message(&self, message: ChatMessage) {
        self.inner.write().messages.push(message);
    }

    /// Apply a partial update to one message. Unknown ids are ignored.
    pub fn update_message(&self, id: &str, update: impl FnOnce(&mut ChatMessage)) {
        let mut inner = self.inner.write();
        if let Some(msg) = inner.messages.iter_mut().find(|m| m.id == id) {
            update(msg);
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.read().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.inner.read().messages.len()
    }

    // ── Phase / completion ──────────────────────────────────────────

    pub fn set_phase(&self, phase: Phase) {
        self.inner.write().phase = Some(phase);
    }

    pub fn phase(&self) -> Option<Phase> {
        self.inner.read().phase
    }

    pub fn set_complete(&self, complete: bool) {
        self.inner.write().complete = complete;
    }

    pub fn is_complete(&self) -> bool {
        self.inner.read().complete
    }

    /// Clear everything back to the pre-run state.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.assets.clear();
        inner.messages.clear();
        inner.phase = None;
        inner.complete = false;
    }
}
