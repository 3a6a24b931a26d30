//! Core types for the AR placement plugin.
//!
//! This module contains the public resources, components, and messages used
//! to configure and interact with the placement system.

use std::fmt;
use std::time::Duration;

use bevy::prelude::*;

use crate::catalog::CatalogListing;
use crate::pose::{AnchorId, AnchorRequest, Pose};

/// Marker component for the camera whose view drives touch hit testing.
///
/// Add this to the camera rendering the AR view. Touch rays for pan
/// engagement are cast through it.
///
/// # Example
///
/// ```ignore
/// commands.spawn((
///     Camera3d::default(),
///     Transform::from_xyz(0.0, 1.6, 0.0),
///     ArCamera,
/// ));
/// ```
#[derive(Component)]
pub struct ArCamera;

/// Marker component for the placement root entity.
///
/// Spawned by the plugin when an anchor commits; its transform follows the
/// anchor (or the live candidate pose while a pan gesture is active). The
/// selected catalog item is attached underneath it.
#[derive(Component)]
pub struct PlacedRoot;

/// Marker component for the gesture-controlled item node.
///
/// Child of [`PlacedRoot`]; pinch/twist gestures write its uniform scale and
/// yaw. The loaded model sits one level below, offset so it rests on the
/// surface.
#[derive(Component)]
pub struct PlacedItem;

/// Marker for a model node whose fit transform has not been computed yet.
///
/// Removed once the scene's meshes are available and the recenter/ground/
/// scale transform has been applied.
#[derive(Component)]
pub struct NeedsFit;

/// Bounding sphere of a fitted model, in the model node's local space.
///
/// Used for the touch-ray test that gates pan engagement.
#[derive(Component, Debug, Clone, Copy)]
pub struct ItemBounds {
    /// Sphere center in local space.
    pub center: Vec3,
    /// Sphere radius in local units.
    pub radius: f32,
}

/// Lifecycle and interaction commands sent by the host application.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub enum ArCommand {
    /// Start an AR session: reset state and begin consuming the pose source.
    BeginSession,
    /// End the session: tear down the placement and cancel tracking.
    EndSession,
    /// The user tapped to place an object at the current candidate pose.
    TapPlace,
    /// The user picked a catalog entry by key.
    SelectItem(String),
}

/// Emitted once per session when the first surface candidate is found.
///
/// Hosts typically hide their "scanning" indicator on this.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceDetected;

/// Gesture lifecycle notifications for host UI (e.g. suppressing buttons
/// while a manipulation is in flight).
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureNotice {
    /// A gesture mode engaged.
    Started(GestureMode),
    /// A gesture mode ended.
    Ended(GestureMode),
}

/// Narrow UI contract: everything the core ever asks of the host interface.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub enum UiDirective {
    /// Replace the info panel title and description.
    SetItemInfo {
        /// Panel title text.
        title: String,
        /// Panel body text.
        description: String,
    },
    /// Show or hide the info panel.
    SetInfoPanelVisible(bool),
    /// Show or hide the catalog selection list.
    SetCatalogVisible(bool),
    /// Fill the catalog selection list. Selecting an entry should send
    /// [`ArCommand::SelectItem`] with the listed key.
    PopulateCatalog(Vec<CatalogListing>),
}

/// Which manipulation a touch sequence is currently performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureMode {
    /// No gesture in progress.
    #[default]
    None,
    /// Single-finger reposition: the item follows the live candidate pose.
    Pan,
    /// Two-finger uniform scale plus yaw rotation.
    ScaleRotate,
}

impl fmt::Display for GestureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GestureMode::None => f.write_str("None"),
            GestureMode::Pan => f.write_str("Pan"),
            GestureMode::ScaleRotate => f.write_str("ScaleRotate"),
        }
    }
}

/// Where the single allowed placement currently stands.
///
/// `Pending` is entered synchronously with the accepted tap, before the
/// asynchronous anchor request resolves; together with the tap cooldown this
/// closes the window where two taps could both observe "nothing placed".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PlacementPhase {
    /// Nothing placed.
    #[default]
    Empty,
    /// A tap was accepted; the anchor is materializing.
    Pending {
        /// The in-flight anchor request.
        request: AnchorRequest,
        /// Pose the request was made at; the root spawns here.
        pose: Pose,
    },
    /// Placed and world-locked to a committed anchor.
    Anchored(AnchorId),
    /// Placed but anchor-less: a pan gesture took over, or re-anchoring
    /// failed and the last transform is held.
    Detached,
    /// A pan ended; the replacement anchor is materializing while the
    /// transform already shows the release pose.
    Reanchoring(AnchorRequest),
}

/// The currently attached catalog selection.
#[derive(Debug, Clone)]
pub struct ActiveItem {
    /// Catalog key this item was selected from.
    pub key: String,
    /// Gesture-controlled node (child of the placement root).
    pub entity: Entity,
    /// Model node carrying the scene and fit transform.
    pub fit_entity: Entity,
    /// Loaded scene handle (shared with the model cache).
    pub handle: Handle<Scene>,
}

/// Single source of truth for "is an object placed, and where".
///
/// At most one placement exists at a time; the invariant is enforced here
/// and checked synchronously before any asynchronous anchor work starts.
#[derive(Resource, Default)]
pub struct PlacementState {
    /// Current phase of the placement state machine.
    pub phase: PlacementPhase,
    /// Root entity whose transform is world-locked, if spawned.
    pub root: Option<Entity>,
    /// Currently attached catalog item, if any.
    pub item: Option<ActiveItem>,
    /// Timestamp of the last accepted tap, for the placement cooldown.
    pub(crate) last_place: Option<Duration>,
    /// Requests whose results must be dropped (owner moved on before they
    /// resolved). Any anchor they produce is released immediately.
    pub(crate) discarded: Vec<AnchorRequest>,
}

/// Transient gesture-interpretation state, reset after every interaction.
#[derive(Resource, Debug, Default)]
pub struct GestureState {
    /// Active manipulation mode.
    pub mode: GestureMode,
    /// Touch count observed last tick, for edge detection.
    pub touch_count: usize,
    /// Whether the first touch's screen ray currently intersects the item.
    pub touch_on_item: bool,
    /// True from the first engaged mode until all touches lift.
    pub interaction_live: bool,
    /// True once pan engaged during this interaction (re-grab semantics).
    pub pan_engaged: bool,
    /// Inter-touch distance captured when scale-rotate engaged.
    pub base_span: f32,
    /// Inter-touch angle captured when scale-rotate engaged.
    pub base_angle: f32,
    /// Item uniform scale captured when scale-rotate engaged.
    pub base_scale: f32,
    /// Item yaw captured when scale-rotate engaged.
    pub base_yaw: f32,
}

impl GestureState {
    /// Reset everything after an interaction ends.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Per-tick tracking snapshot shared by every downstream system.
#[derive(Resource, Debug, Default)]
pub struct FrameState {
    /// Whether tracking data was available this tick.
    pub available: bool,
    /// Candidate placement pose from hit testing, this tick.
    pub hit: Option<Pose>,
    /// Most recent non-empty candidate pose (re-anchor target on release).
    pub last_hit: Option<Pose>,
    /// Whether any surface has been detected since the session started.
    pub surface_seen: bool,
}

/// Reticle visibility and pose for this tick. `None` means hidden.
#[derive(Resource, Debug, Default)]
pub struct ReticleState {
    /// Pose to draw the reticle at, if visible.
    pub pose: Option<Pose>,
}

/// Session context; resetting it is the single teardown operation.
#[derive(Resource, Debug, Default)]
pub struct ArSession {
    /// Whether an AR session is running.
    pub active: bool,
}

/// Behavior tunables for placement and gestures.
#[derive(Resource, Clone, Debug)]
pub struct ArPlacementConfig {
    /// Minimum interval between accepted placement taps. Duplicate
    /// select/tap events commonly fire within this window on mobile
    /// browsers and controllers.
    pub placement_cooldown: Duration,
    /// Largest dimension of a fitted model, in world units.
    pub target_size: f32,
    /// Uniform scale bounds applied to pinch gestures; `None` disables
    /// clamping.
    pub scale_bounds: Option<(f32, f32)>,
    /// Whether the first touch must hit the item to start a pan.
    pub pan_requires_hit: bool,
    /// Whether re-engaging pan mid-interaction (two fingers dropping back
    /// to one) also requires a hit. Off by default: the second test feels
    /// like a dropped grab on device.
    pub regrab_requires_hit: bool,
    /// Grab sphere radius used before the model's real bounds are known.
    pub fallback_grab_radius: f32,
}

impl Default for ArPlacementConfig {
    fn default() -> Self {
        Self {
            placement_cooldown: Duration::from_millis(160),
            target_size: 0.5,
            scale_bounds: Some((0.05, 20.0)),
            pan_requires_hit: true,
            regrab_requires_hit: false,
            fallback_grab_radius: 0.4,
        }
    }
}

/// Visual style for the placement reticle.
#[derive(Resource, Clone, Debug)]
pub struct ReticleStyle {
    /// Inner ring radius (world units).
    pub inner_radius: f32,
    /// Outer ring radius (world units).
    pub outer_radius: f32,
    /// Circle resolution in segments.
    pub segments: u32,
    /// Ring color.
    pub color: Color,
    /// Line width for gizmo rendering (in pixels).
    pub line_width: f32,
}

impl Default for ReticleStyle {
    fn default() -> Self {
        Self {
            inner_radius: 0.15,
            outer_radius: 0.20,
            segments: 32,
            color: Color::srgb(0.0, 1.0, 0.0),
            line_width: 4.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_observed_behavior() {
        let config = ArPlacementConfig::default();
        assert_eq!(config.placement_cooldown, Duration::from_millis(160));
        assert_eq!(config.target_size, 0.5);
        assert!(config.pan_requires_hit);
        assert!(!config.regrab_requires_hit);

        let style = ReticleStyle::default();
        assert!(style.inner_radius < style.outer_radius);
    }

    #[test]
    fn gesture_reset_clears_baselines() {
        let mut gesture = GestureState {
            mode: GestureMode::ScaleRotate,
            touch_count: 2,
            base_span: 120.0,
            interaction_live: true,
            pan_engaged: true,
            ..Default::default()
        };
        gesture.reset();
        assert_eq!(gesture.mode, GestureMode::None);
        assert_eq!(gesture.touch_count, 0);
        assert!(!gesture.interaction_live);
        assert!(!gesture.pan_engaged);
    }
}
