//! The cursor engine: continuous persona-position simulation.
//!
//! Runs its own frame loop, decoupled from the orchestrator's coarse
//! phase cadence. The engine computes positions; pushing them into a
//! rendering technology is the job of registered position sinks, so the
//! core stays render-framework agnostic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::debug;

use crate::model::{AgentCursor, CanvasAsset, CursorState, Point};
use crate::personas::PERSONAS;

/// Reference workspace the home anchors were laid out on.
const REFERENCE_WIDTH: f64 = 1000.0;
const REFERENCE_HEIGHT: f64 = 600.0;

/// Frame period of the internal loop (~60 Hz).
const FRAME_MS: u64 = 16;

/// Callback receiving a persona's position every tick.
pub type PositionSink = Box<dyn Fn(Point) + Send + Sync>;

/// Current workspace pixel dimensions.
#[derive(Debug, Clone, Copy)]
pub struct WorkspaceBounds {
    pub width: f64,
    pub height: f64,
}

impl Default for WorkspaceBounds {
    fn default() -> Self {
        Self {
            width: REFERENCE_WIDTH,
            height: REFERENCE_HEIGHT,
        }
    }
}

struct EngineInner {
    cursors: Mutex<Vec<AgentCursor>>,
    /// Snapshot of canvas assets, used for the `working` centroid.
    assets: Mutex<Vec<CanvasAsset>>,
    workspace: Mutex<WorkspaceBounds>,
    sinks: Mutex<HashMap<String, PositionSink>>,
    frame: AtomicU64,
    destroyed: AtomicBool,
}

/// Frame-driven position simulation for the persona roster.
///
/// `stop` halts the loop without discarding state; `destroy` is
/// terminal and guards against any late frame firing afterwards.
pub struct CursorEngine {
    inner: Arc<EngineInner>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CursorEngine {
    pub fn new(workspace: WorkspaceBounds) -> Self {
        let cursors = PERSONAS
            .iter()
            .map(|p| AgentCursor {
                agent_id: p.id.to_string(),
                position: p.home,
                target_position: p.home,
                state: CursorState::Idle,
                color: p.color.to_string(),
                label: p.name.to_string(),
            })
            .collect();

        Self {
            inner: Arc::new(EngineInner {
                cursors: Mutex::new(cursors),
                assets: Mutex::new(Vec::new()),
                workspace: Mutex::new(workspace),
                sinks: Mutex::new(HashMap::new()),
                frame: AtomicU64::new(0),
                destroyed: AtomicBool::new(false),
            }),
            loop_handle: Mutex::new(None),
        }
    }

    /// Register a sink receiving this persona's position every tick.
    /// Passing `None` unregisters.
    pub fn register_position_sink(&self, agent_id: &str, sink: Option<PositionSink>) {
        let mut sinks = self.inner.sinks.lock();
        match sink {
            Some(s) => {
                sinks.insert(agent_id.to_string(), s);
            }
            None => {
                sinks.remove(agent_id);
            }
        }
    }

    pub fn set_workspace_size(&self, width: f64, height: f64) {
        *self.inner.workspace.lock() = WorkspaceBounds { width, height };
    }

    /// Replace the asset snapshot used for `working` centroids.
    pub fn sync_assets(&self, assets: Vec<CanvasAsset>) {
        *self.inner.assets.lock() = assets;
    }

    /// Current cursor snapshot.
    pub fn cursors(&self) -> Vec<AgentCursor> {
        self.inner.cursors.lock().clone()
    }

    /// Current position of one persona.
    pub fn position(&self, agent_id: &str) -> Option<Point> {
        self.inner
            .cursors
            .lock()
            .iter()
            .find(|c| c.agent_id == agent_id)
            .map(|c| c.position)
    }

    /// Set a persona's behavioral state, optionally aiming it at an
    /// explicit target (used by `creating` to aim at an asset slot).
    pub fn set_cursor_state(&self, agent_id: &str, state: CursorState, target: Option<Point>) {
        let mut cursors = self.inner.cursors.lock();
        if let Some(cursor) = cursors.iter_mut().find(|c| c.agent_id == agent_id) {
            cursor.state = state;
            if let Some(t) = target {
                cursor.target_position = t;
            }
        }
    }

    /// Begin the frame loop. Idempotent; no-op after `destroy`.
    pub fn start(&self) {
        if self.inner.destroyed.load(Ordering::SeqCst) {
            return;
        }
        let mut handle = self.loop_handle.lock();
        if handle.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *handle = Some(tokio::spawn(async move {
            let mut frame = interval(Duration::from_millis(FRAME_MS));
            loop {
                frame.tick().await;
                if inner.destroyed.load(Ordering::SeqCst) {
                    break;
                }
                Self::advance(&inner);
            }
        }));
        debug!("Cursor engine started");
    }

    /// Halt the frame loop without discarding state. Resumable.
    pub fn stop(&self) {
        if let Some(handle) = self.loop_handle.lock().take() {
            handle.abort();
        }
    }

    /// Terminal stop: releases all sinks. No frame may ever run after
    /// this, even from a callback already in flight.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::SeqCst);
        self.stop();
        self.inner.sinks.lock().clear();
        debug!("Cursor engine destroyed");
    }

    /// Advance one frame directly. Hosts that drive their own frame
    /// clock call this instead of `start`.
    pub fn tick(&self) {
        if self.inner.destroyed.load(Ordering::SeqCst) {
            return;
        }
        Self::advance(&self.inner);
    }

    fn advance(inner: &EngineInner) {
        let frame = inner.frame.fetch_add(1, Ordering::Relaxed) + 1;
        let t = frame as f64 * 0.016;
        let workspace = *inner.workspace.lock();
        let assets = inner.assets.lock();
        let mut cursors = inner.cursors.lock();
        let roster_len = cursors.len();
        let mut rng = rand::rng();

        for (index, cursor) in cursors.iter_mut().enumerate() {
            let seed = agent_seed(&cursor.agent_id);
            let home = scaled_home(&cursor.agent_id, workspace);

            let raw_target = match cursor.state {
                CursorState::Idle => {
                    let r = 80.0;
                    Point::new(
                        home.x + (t * 0.3 + seed).sin() * r + (t * 0.17 + seed * 2.0).cos() * r * 0.5,
                        home.y + (t * 0.25 + seed).cos() * r * 0.6
                            + (t * 0.12 + seed * 3.0).sin() * r * 0.3,
                    )
                }
                CursorState::Working => {
                    let anchor = latest_asset_center(&assets, &cursor.agent_id);
                    match anchor {
                        Some(c) => Point::new(
                            c.x + (t * 2.5 + seed).sin() * 25.0 + rng.random_range(-4.0..4.0),
                            c.y + (t * 2.0 + seed).cos() * 18.0 + rng.random_range(-3.0..3.0),
                        ),
                        None => Point::new(
                            home.x + (t * 1.5 + seed).sin() * 40.0 + rng.random_range(-5.0..5.0),
                            home.y + (t * 1.2 + seed).cos() * 30.0 + rng.random_range(-4.0..4.0),
                        ),
                    }
                }
                CursorState::Discussing => {
                    let center = Point::new(workspace.width * 0.4, workspace.height * 0.35);
                    let angle = index as f64 * (std::f64::consts::TAU / roster_len.max(1) as f64);
                    let radius = 90.0 + index as f64 * 15.0;
                    Point::new(
                        center.x + (t * 0.15 + angle).cos() * radius,
                        center.y + (t * 0.15 + angle).sin() * radius * 0.7,
                    )
                }
                CursorState::Reviewing => {
                    let scan_span = workspace.width * 0.7;
                    let scan_x = workspace.width * 0.15 + (t * 20.0 + seed * 100.0) % scan_span;
                    let scan_y = home.y + (t * 0.2 + seed).sin() * 50.0;
                    Point::new(scan_x, scan_y)
                }
                CursorState::Creating => Point::new(
                    cursor.target_position.x + rng.random_range(-1.5..1.5),
                    cursor.target_position.y + rng.random_range(-1.0..1.0),
                ),
            };

            cursor.target_position = clamp_to_workspace(raw_target, workspace);

            let lerp = match cursor.state {
                CursorState::Creating => 0.04,
                CursorState::Working => 0.06,
                _ => 0.05,
            };
            cursor.position = Point::new(
                cursor.position.x + (cursor.target_position.x - cursor.position.x) * lerp,
                cursor.position.y + (cursor.target_position.y - cursor.position.y) * lerp,
            );
        }

        // Publish outside the cursor borrow
        let published: Vec<(String, Point)> = cursors
            .iter()
            .map(|c| (c.agent_id.clone(), c.position))
            .collect();
        drop(cursors);
        drop(assets);

        let sinks = inner.sinks.lock();
        for (agent_id, position) in published {
            if let Some(sink) = sinks.get(&agent_id) {
                sink(position);
            }
        }
    }
}

impl Drop for CursorEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Stable per-persona phase offset derived from the id.
fn agent_seed(agent_id: &str) -> f64 {
    let mut chars = agent_id.chars();
    let first = chars.next().map(|c| c as u32).unwrap_or(0) as f64;
    let second = chars.next().map(|c| c as u32).unwrap_or(0) as f64;
    first * 0.7 + second * 0.3
}

/// Home anchor scaled from the reference workspace to the current one.
fn scaled_home(agent_id: &str, workspace: WorkspaceBounds) -> Point {
    let home = PERSONAS
        .iter()
        .find(|p| p.id == agent_id)
        .map(|p| p.home)
        .unwrap_or(Point::new(400.0, 200.0));
    Point::new(
        home.x * workspace.width / REFERENCE_WIDTH,
        home.y * workspace.height / REFERENCE_HEIGHT,
    )
}

/// Center of the persona's most recently created asset, if any.
fn latest_asset_center(assets: &[CanvasAsset], agent_id: &str) -> Option<Point> {
    assets
        .iter()
        .filter(|a| a.created_by == agent_id)
        .next_back()
        .map(|a| a.center())
}

fn clamp_to_workspace(p: Point, workspace: WorkspaceBounds) -> Point {
    Point::new(
        p.x.clamp(20.0, (workspace.width - 60.0).max(20.0)),
        p.y.clamp(20.0, (workspace.height - 60.0).max(20.0)),
    )
}
