//! Surface-anchored AR placement plugin for Bevy.
//!
//! This crate lets a user scan a floor surface with a tracked camera, tap to
//! anchor a virtual object to it, pick a model from a catalog to display at
//! the anchor, and manipulate it with touch gestures: a one-finger pan that
//! repositions the object along the tracked surface, and a two-finger
//! pinch/twist that scales and rotates it.
//!
//! Platform hit testing and anchoring plug in through the [`PoseSource`]
//! trait; a deterministic [`SimulatedPoseSource`] is included for desktop
//! previews and tests. The host application drives the plugin with
//! [`ArCommand`] messages and renders its interface from [`UiDirective`]
//! messages.
//!
//! # Quick Start
//!
//! ```ignore
//! use bevy::prelude::*;
//! use bevy_ar_placement::{ArCamera, ArCommand, ArPlacementPlugin, PoseSourceHandle,
//!     SimulatedPoseSource};
//!
//! fn main() {
//!     let source = SimulatedPoseSource::new();
//!     App::new()
//!         .add_plugins(DefaultPlugins)
//!         .add_plugins(ArPlacementPlugin)
//!         .insert_resource(PoseSourceHandle::new(source))
//!         .add_systems(Startup, setup)
//!         .run();
//! }
//!
//! fn setup(mut commands: Commands, mut ar: MessageWriter<ArCommand>) {
//!     // Camera whose view drives touch hit testing
//!     commands.spawn((
//!         Camera3d::default(),
//!         Transform::from_xyz(0.0, 1.6, 0.0),
//!         ArCamera,
//!     ));
//!     ar.write(ArCommand::BeginSession);
//! }
//! ```
//!
//! # Behavior
//!
//! - **Tap to place**: a tap lands on the current hit-test pose; the
//!   placement commits once the platform anchor materializes. Taps without a
//!   detected surface, taps inside the 160 ms cooldown, and taps while
//!   something is already placed are quietly dropped.
//! - **Pan**: a touch on the placed item detaches it from its anchor and it
//!   follows the live hit-test pose; on release it snaps to a freshly
//!   created anchor.
//! - **Pinch/twist**: two fingers scale the item uniformly and rotate it
//!   about the vertical axis.
//! - **Catalog**: selections load each model once, normalize it to a common
//!   size, and rest it on the surface.
//!
//! # Configuration
//!
//! - [`ArPlacementConfig`]: cooldown, target model size, scale bounds, and
//!   gesture engagement rules.
//! - [`ReticleStyle`]: ring radii, color, and line width.
//! - [`Catalog`]: the item table (a built-in medical instrument set by
//!   default).

#![warn(missing_docs)]

use bevy::ecs::schedule::common_conditions::resource_exists;
use bevy::gizmos::config::GizmoConfigStore;
use bevy::prelude::*;

mod catalog;
mod error;
mod gesture;
mod item;
mod math;
mod placement;
mod pose;
mod reticle;
mod session;
mod types;

// Re-export all public types
pub use catalog::{Catalog, CatalogEntry, CatalogListing};
pub use error::{CatalogError, PlaceError};
pub use item::ModelCache;
pub use pose::{
    AnchorId, AnchorRequest, AnchorStatus, Pose, PoseFrame, PoseSource, PoseSourceHandle,
    SimController, SimulatedPoseSource,
};
pub use types::{
    ActiveItem, ArCamera, ArCommand, ArPlacementConfig, ArSession, FrameState, GestureMode,
    GestureNotice, GestureState, ItemBounds, NeedsFit, PlacedItem, PlacedRoot, PlacementPhase,
    PlacementState, ReticleState, ReticleStyle, SurfaceDetected, UiDirective,
};

/// Plugin wiring the placement, gesture, and reticle systems into `Update`.
///
/// The host must insert a [`PoseSourceHandle`] (the plugin idles without
/// one) and send [`ArCommand::BeginSession`] to start tracking.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_ar_placement::ArPlacementPlugin;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(ArPlacementPlugin)
///     .run();
/// ```
pub struct ArPlacementPlugin;

impl Plugin for ArPlacementPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ArSession>()
            .init_resource::<ArPlacementConfig>()
            .init_resource::<ReticleStyle>()
            .init_resource::<Catalog>()
            .init_resource::<ModelCache>()
            .init_resource::<PlacementState>()
            .init_resource::<GestureState>()
            .init_resource::<FrameState>()
            .init_resource::<ReticleState>()
            .add_message::<ArCommand>()
            .add_message::<SurfaceDetected>()
            .add_message::<GestureNotice>()
            .add_message::<UiDirective>()
            .add_systems(Startup, reticle::configure_gizmos)
            .add_systems(
                Update,
                (
                    session::apply_lifecycle,
                    pose::sample_frame,
                    gesture::update_touch_target,
                    gesture::begin_gesture,
                    gesture::update_gesture,
                    gesture::end_gesture,
                    placement::apply_taps,
                    item::apply_selection,
                    placement::poll_anchor_requests,
                    placement::apply_tracking,
                    item::fit_loaded_models,
                    item::report_load_failures,
                    reticle::update_reticle,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                reticle::draw_reticle
                    .after(reticle::update_reticle)
                    .run_if(resource_exists::<GizmoConfigStore>),
            );
    }
}
