//! Pose source abstraction.
//!
//! The platform AR layer (hit testing, anchor creation, anchor tracking) is
//! consumed through the [`PoseSource`] trait so the placement and gesture
//! systems can run against a real device backend, a desktop simulation, or a
//! scripted source in tests. Anchor creation is asynchronous on every real
//! platform; the trait models it as a request that is polled once per tick,
//! which keeps the render loop free of awaits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bevy::log::warn;
use bevy::prelude::*;

use crate::types::{ArSession, FrameState, SurfaceDetected};

/// A tracked pose: position plus orientation in session space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position in session space.
    pub translation: Vec3,
    /// Orientation in session space.
    pub rotation: Quat,
}

impl Pose {
    /// Identity pose at the session origin.
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Pose at `translation` with no rotation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::IDENTITY,
        }
    }

    /// Convert to a scene-graph transform (unit scale).
    pub fn to_transform(self) -> Transform {
        Transform {
            translation: self.translation,
            rotation: self.rotation,
            scale: Vec3::ONE,
        }
    }
}

impl From<Transform> for Pose {
    fn from(transform: Transform) -> Self {
        Self {
            translation: transform.translation,
            rotation: transform.rotation,
        }
    }
}

/// Per-tick snapshot pulled from the pose source.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseFrame {
    /// Best candidate placement pose from surface hit testing, if any.
    pub hit: Option<Pose>,
}

/// Opaque token for a committed, world-locked anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorId(pub u64);

/// Opaque token for an in-flight anchor creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorRequest(pub u64);

/// Result of polling an anchor creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorStatus {
    /// Still materializing; poll again next tick.
    Pending,
    /// The anchor is committed and trackable.
    Ready(AnchorId),
    /// Creation failed; the request is spent.
    Failed,
}

/// Platform AR capability consumed by this plugin.
///
/// Implementations must never block: `next_frame` is called once per render
/// tick and everything else is bookkeeping on state the backend already has.
pub trait PoseSource: Send + Sync + 'static {
    /// Pull the tracking snapshot for this tick. `None` means tracking data
    /// is not available right now; pose-dependent updates are skipped for
    /// the tick but the loop keeps running.
    fn next_frame(&mut self) -> Option<PoseFrame>;

    /// Begin asynchronous creation of a world-locked anchor at `pose`.
    fn create_anchor(&mut self, pose: Pose) -> AnchorRequest;

    /// Poll an in-flight anchor creation request.
    fn poll_request(&mut self, request: AnchorRequest) -> AnchorStatus;

    /// Tracked pose of a committed anchor for this frame. `None` is a
    /// transient tracking loss, not an error.
    fn anchor_pose(&mut self, anchor: AnchorId) -> Option<Pose>;

    /// Release a committed anchor the placement no longer follows.
    fn release_anchor(&mut self, anchor: AnchorId);

    /// Cancel subscriptions and in-flight requests. Called on session end;
    /// results arriving afterwards must be dropped by the backend.
    fn shutdown(&mut self);
}

/// Resource holding the active [`PoseSource`] backend.
///
/// The host inserts this before (or while) starting a session; without it
/// the plugin idles.
#[derive(Resource)]
pub struct PoseSourceHandle(Box<dyn PoseSource>);

impl PoseSourceHandle {
    /// Wrap a backend implementation.
    pub fn new(source: impl PoseSource) -> Self {
        Self(Box::new(source))
    }

    pub(crate) fn next_frame(&mut self) -> Option<PoseFrame> {
        self.0.next_frame()
    }

    pub(crate) fn create_anchor(&mut self, pose: Pose) -> AnchorRequest {
        self.0.create_anchor(pose)
    }

    pub(crate) fn poll_request(&mut self, request: AnchorRequest) -> AnchorStatus {
        self.0.poll_request(request)
    }

    pub(crate) fn anchor_pose(&mut self, anchor: AnchorId) -> Option<Pose> {
        self.0.anchor_pose(anchor)
    }

    pub(crate) fn release_anchor(&mut self, anchor: AnchorId) {
        self.0.release_anchor(anchor)
    }

    pub(crate) fn shutdown(&mut self) {
        self.0.shutdown()
    }
}

/// Pull the per-tick tracking snapshot into [`FrameState`].
///
/// Runs first in the update chain; everything downstream reads the snapshot
/// instead of talking to the source directly.
pub(crate) fn sample_frame(
    mut frame: ResMut<FrameState>,
    session: Res<ArSession>,
    source: Option<ResMut<PoseSourceHandle>>,
    mut surface: MessageWriter<SurfaceDetected>,
) {
    if !session.active {
        frame.available = false;
        frame.hit = None;
        return;
    }
    let Some(mut source) = source else {
        frame.available = false;
        frame.hit = None;
        return;
    };

    match source.next_frame() {
        Some(snapshot) => {
            frame.available = true;
            frame.hit = snapshot.hit;
            if let Some(hit) = snapshot.hit {
                frame.last_hit = Some(hit);
                if !frame.surface_seen {
                    frame.surface_seen = true;
                    bevy::log::info!("surface detected");
                    surface.write(SurfaceDetected);
                }
            }
        }
        None => {
            frame.available = false;
            frame.hit = None;
        }
    }
}

#[derive(Default)]
struct SimState {
    hit: Option<Pose>,
    tracking: bool,
    anchors_visible: bool,
    anchor_latency: u32,
    fail_next: bool,
    next_id: u64,
    requests: HashMap<u64, PendingRequest>,
    anchors: HashMap<u64, Pose>,
    requests_made: u32,
    anchors_released: u32,
    shut_down: bool,
}

struct PendingRequest {
    remaining: u32,
    pose: Pose,
    fail: bool,
}

/// Deterministic in-process [`PoseSource`] for desktop previews and tests.
///
/// The backend is driven through a [`SimController`] handle: set the current
/// hit-test pose, inject anchor failures, or blind anchor tracking to
/// exercise the hold-last-known-good path.
pub struct SimulatedPoseSource {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedPoseSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPoseSource {
    /// Create a source with tracking up, no hit pose, and instant anchors.
    pub fn new() -> Self {
        let state = SimState {
            tracking: true,
            anchors_visible: true,
            next_id: 1,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Control handle sharing this source's state.
    pub fn controller(&self) -> SimController {
        SimController {
            state: Arc::clone(&self.state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        // A poisoned lock means a panicking test thread; the sim state is
        // still coherent for reads.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PoseSource for SimulatedPoseSource {
    fn next_frame(&mut self) -> Option<PoseFrame> {
        let state = self.lock();
        if state.shut_down || !state.tracking {
            return None;
        }
        Some(PoseFrame { hit: state.hit })
    }

    fn create_anchor(&mut self, pose: Pose) -> AnchorRequest {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.requests_made += 1;
        let fail = std::mem::take(&mut state.fail_next);
        let remaining = state.anchor_latency;
        state.requests.insert(
            id,
            PendingRequest {
                remaining,
                pose,
                fail,
            },
        );
        AnchorRequest(id)
    }

    fn poll_request(&mut self, request: AnchorRequest) -> AnchorStatus {
        let mut state = self.lock();
        if state.shut_down {
            return AnchorStatus::Failed;
        }
        match state.requests.get_mut(&request.0) {
            None => return AnchorStatus::Failed,
            Some(pending) if pending.remaining > 0 => {
                pending.remaining -= 1;
                return AnchorStatus::Pending;
            }
            Some(_) => {}
        }
        let Some(pending) = state.requests.remove(&request.0) else {
            return AnchorStatus::Failed;
        };
        if pending.fail {
            AnchorStatus::Failed
        } else {
            state.anchors.insert(request.0, pending.pose);
            AnchorStatus::Ready(AnchorId(request.0))
        }
    }

    fn anchor_pose(&mut self, anchor: AnchorId) -> Option<Pose> {
        let state = self.lock();
        if !state.tracking || !state.anchors_visible {
            return None;
        }
        state.anchors.get(&anchor.0).copied()
    }

    fn release_anchor(&mut self, anchor: AnchorId) {
        let mut state = self.lock();
        if state.anchors.remove(&anchor.0).is_some() {
            state.anchors_released += 1;
        } else {
            warn!("released unknown anchor {:?}", anchor);
        }
    }

    fn shutdown(&mut self) {
        let mut state = self.lock();
        state.shut_down = true;
        state.hit = None;
        state.requests.clear();
    }
}

/// Control handle for a [`SimulatedPoseSource`].
#[derive(Clone)]
pub struct SimController {
    state: Arc<Mutex<SimState>>,
}

impl SimController {
    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set (or clear) the candidate hit-test pose reported each frame.
    pub fn set_hit(&self, hit: Option<Pose>) {
        self.lock().hit = hit;
    }

    /// Toggle overall tracking availability (frame snapshots and anchors).
    pub fn set_tracking(&self, tracking: bool) {
        self.lock().tracking = tracking;
    }

    /// Toggle anchor pose visibility while leaving frames available,
    /// simulating per-anchor tracking loss.
    pub fn set_anchors_visible(&self, visible: bool) {
        self.lock().anchors_visible = visible;
    }

    /// Number of ticks an anchor request stays pending before resolving.
    pub fn set_anchor_latency(&self, ticks: u32) {
        self.lock().anchor_latency = ticks;
    }

    /// Make the next anchor request fail.
    pub fn fail_next_request(&self) {
        self.lock().fail_next = true;
    }

    /// Move a committed anchor, simulating drift correction.
    pub fn set_anchor_pose(&self, anchor: AnchorId, pose: Pose) {
        self.lock().anchors.insert(anchor.0, pose);
    }

    /// Committed anchors currently alive.
    pub fn anchor_count(&self) -> usize {
        self.lock().anchors.len()
    }

    /// Total anchor requests ever made.
    pub fn requests_made(&self) -> u32 {
        self.lock().requests_made
    }

    /// Total anchors released by the plugin.
    pub fn anchors_released(&self) -> u32 {
        self.lock().anchors_released
    }

    /// Whether `shutdown` was called on the source.
    pub fn was_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    /// Revive a shut-down source for a fresh session: clears the shutdown
    /// latch, all anchors, and any stale hit pose.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.shut_down = false;
        state.requests.clear();
        state.anchors.clear();
        state.hit = None;
    }
}
