//! The Collective - A Feral Creative-Agency Simulation
//!
//! A phase-driven simulation engine in which five scripted personas
//! improvise a proactive-apology ad campaign for a doomed company on a
//! shared infinite canvas:
//!
//! - **Orchestrator**: five scripted phases (research → ideation →
//!   production → finalization → export), cancellable at every await
//! - **Cursor Engine**: frame-driven persona motion, independent of the
//!   orchestrator's coarse cadence
//! - **Streaming Chat**: incremental token delivery with a scripted
//!   fallback when no generation backend is configured
//! - **Canvas**: deterministic asset placement, drag-to-combine merges
//!
//! # Quick Start
//!
//! ```ignore
//! use collective::{Config, Session};
//!
//! let config = Config::load(None)?;
//! let session = Session::new(config, project).await?;
//! session.start().await;
//! ```

pub mod chat;
pub mod config;
pub mod errors;
pub mod export;
pub mod model;
pub mod orchestrator;
pub mod personas;
pub mod session;
pub mod store;

pub mod canvas;
pub mod generate;

pub use config::Config;
pub use errors::CollectiveError;
pub use model::{CanvasAsset, ChatMessage, CompanyProfile, Phase, Scenario};
pub use session::Session;
pub use store::CanvasStore;
