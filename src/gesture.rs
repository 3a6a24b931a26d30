//! Touch gesture interpretation.
//!
//! Raw touch points become one of two exclusive manipulations: a
//! single-finger pan that detaches the placement from its anchor and lets it
//! ride the live candidate pose, or a two-finger pinch/twist that writes
//! uniform scale and yaw onto the item node. Engagement, per-move updates,
//! and release are handled by separate systems so each reads like the edge
//! it responds to.

use bevy::log::debug;
use bevy::prelude::*;

use crate::math::{pinch_scale, ray_sphere_intersection, touch_span_angle, wrap_angle, yaw_of};
use crate::pose::PoseSourceHandle;
use crate::types::{
    ArCamera, ArPlacementConfig, ArSession, FrameState, GestureMode, GestureNotice, GestureState,
    ItemBounds, PlacedItem, PlacedRoot, PlacementPhase, PlacementState,
};

/// Pressed touch points in a stable order (by touch id).
///
/// `Touches` iterates in hash order; pinch angle math needs the same pairing
/// every tick.
fn ordered_points(touches: &Touches) -> Vec<(u64, Vec2)> {
    let mut points: Vec<(u64, Vec2)> = touches
        .iter()
        .map(|touch| (touch.id(), touch.position()))
        .collect();
    points.sort_by_key(|(id, _)| *id);
    points
}

/// Determine whether the first touch's screen ray intersects the item.
///
/// Written every tick while touches are down; `begin_gesture` consumes the
/// flag on engagement edges. Falls back to a configured grab sphere around
/// the placement root until the model's real bounds are known.
pub(crate) fn update_touch_target(
    mut gesture: ResMut<GestureState>,
    touches: Res<Touches>,
    placement: Res<PlacementState>,
    config: Res<ArPlacementConfig>,
    cameras: Query<(&Camera, &GlobalTransform), With<ArCamera>>,
    bounds: Query<(&ItemBounds, &GlobalTransform)>,
    roots: Query<&GlobalTransform, With<PlacedRoot>>,
) {
    gesture.touch_on_item = false;

    let Some(item) = placement.item.as_ref() else {
        return;
    };
    let Some(touch) = touches.iter().next() else {
        return;
    };
    let Some((camera, camera_transform)) = cameras.iter().next() else {
        return;
    };
    let Ok(ray) = camera.viewport_to_world(camera_transform, touch.position()) else {
        return;
    };

    let sphere = match bounds.get(item.fit_entity) {
        Ok((item_bounds, transform)) => {
            let (scale, _, _) = transform.to_scale_rotation_translation();
            Some((
                transform.transform_point(item_bounds.center),
                item_bounds.radius * scale.max_element(),
            ))
        }
        Err(_) => placement.root.and_then(|root| {
            roots
                .get(root)
                .ok()
                .map(|transform| (transform.translation(), config.fallback_grab_radius))
        }),
    };

    if let Some((center, radius)) = sphere {
        gesture.touch_on_item = ray_sphere_intersection(&ray, center, radius).is_some();
    }
}

/// Engage and switch gesture modes on touch-count edges.
pub(crate) fn begin_gesture(
    touches: Res<Touches>,
    mut gesture: ResMut<GestureState>,
    mut placement: ResMut<PlacementState>,
    session: Res<ArSession>,
    config: Res<ArPlacementConfig>,
    source: Option<ResMut<PoseSourceHandle>>,
    items: Query<&Transform, With<PlacedItem>>,
    mut notices: MessageWriter<GestureNotice>,
) {
    if !session.active {
        return;
    }
    let points = ordered_points(&touches);
    let count = points.len();
    let previous = gesture.touch_count;
    gesture.touch_count = count;
    if count == previous {
        return;
    }

    let has_item = placement.item.is_some() && placement.root.is_some();

    // First finger down: pan, gated on actually touching the item.
    if previous == 0 && count == 1 {
        if !has_item {
            return;
        }
        if config.pan_requires_hit && !gesture.touch_on_item {
            debug!("touch missed the item, pan not engaged");
            return;
        }
        engage_pan(&mut gesture, &mut placement, source, &mut notices);
        return;
    }

    // Second finger down: scale-rotate, intentional by assumption.
    if count == 2 {
        let Some(item) = placement.item.as_ref() else {
            return;
        };
        if gesture.mode == GestureMode::Pan {
            notices.write(GestureNotice::Ended(GestureMode::Pan));
        }
        let Ok(transform) = items.get(item.entity) else {
            return;
        };
        let (span, angle) = touch_span_angle(points[0].1, points[1].1);
        gesture.mode = GestureMode::ScaleRotate;
        gesture.interaction_live = true;
        gesture.base_span = span;
        gesture.base_angle = angle;
        gesture.base_scale = transform.scale.x;
        gesture.base_yaw = yaw_of(transform.rotation);
        notices.write(GestureNotice::Started(GestureMode::ScaleRotate));
        return;
    }

    // Dropped back to one finger: the pan resumes without a fresh ray test
    // unless configured otherwise.
    if previous >= 2 && count == 1 {
        if gesture.mode == GestureMode::ScaleRotate {
            notices.write(GestureNotice::Ended(GestureMode::ScaleRotate));
            gesture.mode = GestureMode::None;
        }
        if !has_item || !gesture.pan_engaged {
            return;
        }
        if config.regrab_requires_hit && !gesture.touch_on_item {
            debug!("re-grab missed the item, pan not resumed");
            return;
        }
        engage_pan(&mut gesture, &mut placement, source, &mut notices);
    }
}

fn engage_pan(
    gesture: &mut GestureState,
    placement: &mut PlacementState,
    source: Option<ResMut<PoseSourceHandle>>,
    notices: &mut MessageWriter<GestureNotice>,
) {
    if let Some(anchor) = placement.detach_for_gesture() {
        if let Some(mut source) = source {
            source.release_anchor(anchor);
        }
    }
    gesture.mode = GestureMode::Pan;
    gesture.interaction_live = true;
    gesture.pan_engaged = true;
    notices.write(GestureNotice::Started(GestureMode::Pan));
}

/// Apply pinch/twist deltas while exactly two touches are down.
///
/// Pan performs no math here; the tracking system streams the candidate pose
/// into the root for as long as pan mode is active.
pub(crate) fn update_gesture(
    touches: Res<Touches>,
    gesture: Res<GestureState>,
    config: Res<ArPlacementConfig>,
    placement: Res<PlacementState>,
    mut items: Query<&mut Transform, With<PlacedItem>>,
) {
    if gesture.mode != GestureMode::ScaleRotate {
        return;
    }
    let points = ordered_points(&touches);
    if points.len() != 2 {
        return;
    }
    let Some(item) = placement.item.as_ref() else {
        return;
    };
    let Ok(mut transform) = items.get_mut(item.entity) else {
        return;
    };

    let (span, angle) = touch_span_angle(points[0].1, points[1].1);

    let mut scale = pinch_scale(gesture.base_scale, gesture.base_span, span);
    if let Some((min, max)) = config.scale_bounds {
        scale = scale.clamp(min, max);
    }

    // Screen space is y-down, so a counter-clockwise twist on screen is a
    // clockwise yaw in world space.
    let yaw = gesture.base_yaw - wrap_angle(angle - gesture.base_angle);

    transform.scale = Vec3::splat(scale);
    transform.rotation = Quat::from_rotation_y(yaw);
}

/// End the interaction when the last touch lifts.
///
/// A detached placement re-anchors at the most recent candidate pose; with
/// no pose sample available it simply holds its transform.
pub(crate) fn end_gesture(
    touches: Res<Touches>,
    mut gesture: ResMut<GestureState>,
    mut placement: ResMut<PlacementState>,
    frame: Res<FrameState>,
    source: Option<ResMut<PoseSourceHandle>>,
    mut roots: Query<&mut Transform, With<PlacedRoot>>,
    mut notices: MessageWriter<GestureNotice>,
) {
    if !gesture.interaction_live || touches.iter().next().is_some() {
        return;
    }

    if gesture.mode != GestureMode::None {
        notices.write(GestureNotice::Ended(gesture.mode));
    }

    if matches!(placement.phase, PlacementPhase::Detached) {
        if let (Some(pose), Some(mut source)) = (frame.last_hit, source) {
            // Move the root immediately so there is no visible lag, then
            // let the committed anchor correct it when it arrives.
            if let Some(root) = placement.root {
                if let Ok(mut transform) = roots.get_mut(root) {
                    *transform = pose.to_transform();
                }
            }
            let request = source.create_anchor(pose);
            placement.phase = PlacementPhase::Reanchoring(request);
            debug!("re-anchoring at {:?}", pose.translation);
        } else {
            debug!("no pose sample to re-anchor at, holding transform");
        }
    }

    gesture.reset();
}
