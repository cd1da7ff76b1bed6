//! Session wiring: composes the store, cursor engine, orchestrator,
//! and combine flow over one generation backend, and tears them down
//! together. Dropping or shutting down the session is an implicit
//! cancellation of any run in progress.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};
use uuid::Uuid;

use crate::canvas::combine::CombineFlow;
use crate::canvas::cursor::{CursorEngine, WorkspaceBounds};
use crate::canvas::factory::AssetFactory;
use crate::chat::ChatClient;
use crate::config::Config;
use crate::export::{build_bundle, ExportBundle};
use crate::generate::{
    GenerationBackend, HttpBackend, ProjectContext, ScriptedBackend,
};
use crate::model::{
    AssetState, CanvasAsset, ChatMessage, CompanyProfile, CursorState, Phase, Point, Scenario,
    ScenarioSet, USER_AGENT_ID,
};
use crate::orchestrator::{PhaseOrchestrator, StageCallbacks};
use crate::store::CanvasStore;

/// Bridges the orchestrator's callback surface onto the store and the
/// cursor engine.
struct Director {
    store: CanvasStore,
    engine: Arc<CursorEngine>,
}

impl StageCallbacks for Director {
    fn add_asset(&self, asset: CanvasAsset) {
        self.store.add_asset(asset);
        self.engine.sync_assets(self.store.assets());
    }

    fn update_asset_state(&self, id: &str, state: AssetState) {
        self.store.update_asset_state(id, state);
    }

    fn update_asset_image(&self, id: &str, url: String, prompt: Option<String>) {
        self.store.set_asset_image(id, url, prompt);
    }

    fn add_chat_message(&self, message: ChatMessage) {
        self.store.add_message(message);
    }

    fn update_chat_message(&self, id: &str, content: &str, is_complete: bool) {
        self.store.update_message(id, |m| {
            m.content = content.to_string();
            m.is_complete = is_complete;
        });
    }

    fn set_cursor_state(&self, agent_id: &str, state: CursorState, target: Option<Point>) {
        self.engine.set_cursor_state(agent_id, state, target);
    }

    fn set_phase(&self, phase: Phase) {
        self.store.set_phase(phase);
    }

    fn set_complete(&self, complete: bool) {
        self.store.set_complete(complete);
    }

    fn messages(&self) -> Vec<ChatMessage> {
        self.store.messages()
    }
}

/// One active simulation session for one project context.
pub struct Session {
    config: Config,
    context: ProjectContext,
    store: CanvasStore,
    engine: Arc<CursorEngine>,
    orchestrator: Arc<PhaseOrchestrator>,
    combine: CombineFlow,
    chat: ChatClient,
}

impl Session {
    /// Build a session, choosing the HTTP backend when an API key is
    /// configured and the scripted fallback otherwise.
    pub fn new(
        config: Config,
        company: CompanyProfile,
        scenarios: Vec<Scenario>,
    ) -> Result<Self, crate::errors::CollectiveError> {
        let backend: Arc<dyn GenerationBackend> = if config.has_backend() {
            Arc::new(HttpBackend::new(&config)?)
        } else {
            info!("No generation backend configured; using scripted fallback");
            Arc::new(ScriptedBackend::new(config.pacing.scale))
        };
        Ok(Self::with_backend(config, company, scenarios, backend))
    }

    /// Build a session over an explicit backend (used by tests).
    pub fn with_backend(
        config: Config,
        company: CompanyProfile,
        scenarios: Vec<Scenario>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        let context = ProjectContext::new(company, scenarios);
        let store = CanvasStore::new();
        let engine = Arc::new(CursorEngine::new(WorkspaceBounds {
            width: config.workspace.width,
            height: config.workspace.height,
        }));
        let factory = Arc::new(Mutex::new(AssetFactory::new()));

        let director: Arc<dyn StageCallbacks> = Arc::new(Director {
            store: store.clone(),
            engine: Arc::clone(&engine),
        });

        let orchestrator = Arc::new(PhaseOrchestrator::new(
            director,
            Arc::clone(&backend),
            Arc::clone(&factory),
            context.clone(),
            config.clone(),
        ));

        let combine = CombineFlow::new(
            Arc::clone(&backend),
            store.clone(),
            factory,
            config.clone(),
        );

        Self {
            chat: ChatClient::new(backend),
            config,
            context,
            store,
            engine,
            orchestrator,
            combine,
        }
    }

    pub fn store(&self) -> &CanvasStore {
        &self.store
    }

    pub fn cursor_engine(&self) -> &CursorEngine {
        &self.engine
    }

    pub fn context(&self) -> &ProjectContext {
        &self.context
    }

    pub fn is_running(&self) -> bool {
        self.orchestrator.is_running()
    }

    /// Start the cursor loop and run the full orchestration to
    /// completion (or cancellation).
    pub async fn run(&self) {
        self.engine.start();
        self.orchestrator.start().await;
    }

    /// Cancel the run and pause the cursor loop. Resumable via `run`.
    pub fn stop(&self) {
        self.orchestrator.stop();
        self.engine.stop();
    }

    /// Terminal teardown (the unmount path): cancels the run and
    /// destroys the cursor engine.
    pub fn shutdown(&self) {
        self.orchestrator.stop();
        self.engine.destroy();
        info!("Session shut down");
    }

    /// Append a message typed by the human user to the chat log.
    pub fn send_user_message(&self, text: &str) -> ChatMessage {
        let mut message = ChatMessage::new(
            format!("user-{}", Uuid::new_v4().simple()),
            USER_AGENT_ID,
        );
        message.content = text.to_string();
        message.is_complete = true;
        self.store.add_message(message.clone());
        message
    }

    /// Stream one persona reply into the chat log, outside the scripted
    /// timeline (the interactive chat path). Failures complete the
    /// message with a visible notice; nothing is left streaming.
    pub async fn request_reply(&self, persona_id: &str) {
        let id = format!("reply-{}-{}", persona_id, Uuid::new_v4().simple());
        self.store
            .add_message(ChatMessage::new(id.clone(), persona_id));

        let history = self.store.messages();
        let phase_label = self
            .store
            .phase()
            .map(|p| p.label())
            .unwrap_or("production");
        let context = self.context.with_phase(phase_label);

        let store = self.store.clone();
        let accumulated = Arc::new(Mutex::new(String::new()));
        let on_token = {
            let store = store.clone();
            let accumulated = Arc::clone(&accumulated);
            let id = id.clone();
            move |token: &str| {
                let mut acc = accumulated.lock();
                acc.push_str(token);
                let content = acc.clone();
                store.update_message(&id, |m| m.content = content);
            }
        };
        let on_complete = {
            let store = store.clone();
            let id = id.clone();
            move || {
                store.update_message(&id, |m| m.is_complete = true);
            }
        };

        let budget = Duration::from_secs(self.config.generation_timeout_secs);
        let outcome = timeout(
            budget,
            self.chat
                .stream_chat(persona_id, &history, &context, on_token, on_complete),
        )
        .await;

        match outcome {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                warn!("Interactive reply from {} failed: {}", persona_id, err);
                self.fail_message(&id);
            }
            Err(_) => {
                warn!("Interactive reply from {} timed out", persona_id);
                self.fail_message(&id);
            }
        }
    }

    fn fail_message(&self, id: &str) {
        self.store.update_message(id, |m| {
            if !m.content.is_empty() {
                m.content.push_str("\n\n");
            }
            m.content
                .push_str("THE APPARATUS IS EXPERIENCING A MOMENTARY RECALIBRATION.");
            m.is_complete = true;
        });
    }

    /// Handle a drag release: if the dragged asset near-touches another,
    /// run the combination flow. Returns the derived asset if a merge
    /// happened.
    pub async fn drag_release(&self, dragged_id: &str) -> Option<CanvasAsset> {
        let assets = self.store.assets();
        let dragged = assets.iter().find(|a| a.id == dragged_id)?;
        let target = crate::canvas::combine::find_combine_target(dragged, &assets)?;
        let target_id = target.id.clone();
        let combined = self
            .combine
            .combine(dragged_id, &target_id, &self.context)
            .await;
        if combined.is_some() {
            self.engine.sync_assets(self.store.assets());
        }
        combined
    }

    /// Assemble the campaign dossier from the current store state.
    pub fn export_bundle(&self) -> ExportBundle {
        build_bundle(
            self.store.final_assets(),
            self.store.messages(),
            &self.context,
        )
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.orchestrator.stop();
        self.engine.destroy();
    }
}

/// Fabricate the scenario set for a company, falling back to the
/// scripted generator so the flow never dead-ends.
pub async fn fabricate_scenarios(
    backend: &dyn GenerationBackend,
    profile: &CompanyProfile,
    timeout_secs: u64,
) -> ScenarioSet {
    match timeout(
        Duration::from_secs(timeout_secs),
        backend.scenarios(profile),
    )
    .await
    {
        Ok(Ok(set)) => set,
        Ok(Err(err)) => {
            warn!("Scenario generation failed, using scripted set: {}", err);
            crate::generate::scripted::scripted_scenarios(&profile.name)
        }
        Err(_) => {
            warn!("Scenario generation timed out, using scripted set");
            crate::generate::scripted::scripted_scenarios(&profile.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::scripted::scripted_scenarios;

    fn fast_session() -> Session {
        let mut config = Config::default();
        config.pacing.scale = 0.0;
        let scenarios = scripted_scenarios("Vantage Corp")
            .for_horizon(crate::model::Horizon::FiveYear)
            .to_vec();
        Session::with_backend(
            config.clone(),
            CompanyProfile::new("Vantage Corp"),
            scenarios,
            Arc::new(ScriptedBackend::new(0.0)),
        )
    }

    #[tokio::test]
    async fn test_user_message_lands_in_log() {
        let session = fast_session();
        session.send_user_message("Make it louder.");
        let messages = session.store().messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_from_user());
        assert!(messages[0].is_complete);
    }

    #[tokio::test]
    async fn test_interactive_reply_completes() {
        let session = fast_session();
        session.send_user_message("What about the billboard?");
        session.request_reply("gremlin").await;

        let messages = session.store().messages();
        assert_eq!(messages.len(), 2);
        let reply = &messages[1];
        assert_eq!(reply.agent_id, "gremlin");
        assert!(reply.is_complete);
        assert!(!reply.content.is_empty());
    }

    #[tokio::test]
    async fn test_drag_release_combines_near_assets() {
        let session = fast_session();
        session.run().await;
        session.stop();

        // Drag the first asset onto the second
        let assets = session.store().assets();
        let dragged = assets[0].clone();
        let target = assets[1].clone();
        session
            .store()
            .update_asset_position(&dragged.id, target.position);

        let combined = session.drag_release(&dragged.id).await.unwrap();
        assert_eq!(
            combined.combined_from,
            Some((dragged.id.clone(), target.id.clone()))
        );

        // Parents only changed state
        let after = session.store().asset(&dragged.id).unwrap();
        assert_eq!(after.title, dragged.title);
        assert_eq!(after.content, dragged.content);
        assert_eq!(after.state, AssetState::Review);
    }

    #[tokio::test]
    async fn test_shutdown_freezes_everything() {
        let session = fast_session();
        session.shutdown();
        assert!(!session.is_running());
        session.cursor_engine().tick();
        let before = session.cursor_engine().cursors();
        session.cursor_engine().tick();
        let after = session.cursor_engine().cursors();
        assert_eq!(before[0].position, after[0].position);
    }

    #[tokio::test]
    async fn test_fabricate_scenarios_falls_back() {
        struct Down;
        #[async_trait::async_trait]
        impl GenerationBackend for Down {
            async fn scenarios(
                &self,
                _: &CompanyProfile,
            ) -> Result<ScenarioSet, crate::errors::GenerationError> {
                Err(crate::errors::GenerationError::NotConfigured)
            }
            async fn asset(
                &self,
                _: crate::generate::AssetRequest,
            ) -> Result<crate::generate::GeneratedAsset, crate::errors::GenerationError> {
                Err(crate::errors::GenerationError::NotConfigured)
            }
            async fn chat_stream(
                &self,
                _: crate::generate::ChatRequest,
            ) -> Result<crate::generate::TokenStream, crate::errors::GenerationError> {
                Err(crate::errors::GenerationError::NotConfigured)
            }
            async fn image(&self, _: crate::generate::ImageRequest) -> crate::generate::ImageResult {
                crate::generate::ImageResult::default()
            }
            async fn combine(
                &self,
                _: crate::generate::CombineRequest,
            ) -> Result<crate::generate::CombineSynthesis, crate::errors::GenerationError> {
                Err(crate::errors::GenerationError::NotConfigured)
            }
        }

        let set = fabricate_scenarios(&Down, &CompanyProfile::new("Vantage Corp"), 1).await;
        assert_eq!(set.company, "Vantage Corp");
        assert!(!set.for_horizon(crate::model::Horizon::OneYear).is_empty());
    }
}
