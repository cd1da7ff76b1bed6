//! Canvas subsystem: asset placement, drag-to-combine merging, and the
//! persona cursor engine.

pub mod combine;
pub mod cursor;
pub mod factory;

pub use combine::{find_combine_target, proximity, CombineFlow, PROXIMITY_THRESHOLD};
pub use cursor::{CursorEngine, WorkspaceBounds};
pub use factory::{AssetFactory, AssetSpec};
