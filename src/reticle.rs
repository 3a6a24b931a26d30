//! Placement reticle.
//!
//! The reticle is a flat ring drawn at the candidate placement pose. It is
//! visible only while there is something to aim at and nothing placed: a
//! candidate pose exists, the placement is empty, and no gesture is active.

use bevy::gizmos::config::{DefaultGizmoConfigGroup, GizmoConfigStore};
use bevy::prelude::*;

use crate::types::{
    ArSession, FrameState, GestureMode, GestureState, PlacementPhase, PlacementState, ReticleState,
    ReticleStyle,
};

/// Configure Bevy's built-in gizmo renderer using our style resource.
pub(crate) fn configure_gizmos(
    config_store: Option<ResMut<GizmoConfigStore>>,
    style: Res<ReticleStyle>,
) {
    let Some(mut config_store) = config_store else {
        return;
    };
    let (config, _) = config_store.config_mut::<DefaultGizmoConfigGroup>();
    config.line.width = style.line_width;
}

/// Decide reticle visibility and pose for this tick.
pub(crate) fn update_reticle(
    mut reticle: ResMut<ReticleState>,
    frame: Res<FrameState>,
    placement: Res<PlacementState>,
    gesture: Res<GestureState>,
    session: Res<ArSession>,
) {
    let aiming = session.active
        && frame.available
        && matches!(placement.phase, PlacementPhase::Empty)
        && gesture.mode == GestureMode::None;
    reticle.pose = if aiming { frame.hit } else { None };
}

/// Draw the reticle ring at its current pose.
pub(crate) fn draw_reticle(reticle: Res<ReticleState>, style: Res<ReticleStyle>, mut gizmos: Gizmos) {
    let Some(pose) = reticle.pose else {
        return;
    };

    // The circle primitive lies in the XY plane; tip it onto the surface the
    // way the candidate pose is oriented.
    let rotation = pose.rotation * Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2);
    let isometry = Isometry3d::new(pose.translation, rotation);

    gizmos
        .circle(isometry, style.inner_radius, style.color)
        .resolution(style.segments);
    gizmos
        .circle(isometry, style.outer_radius, style.color)
        .resolution(style.segments);
}
