//! Placement state machine.
//!
//! A tap on a detected surface starts an asynchronous anchor request; the
//! placement root spawns once the anchor commits and then follows its
//! tracked pose every tick. Pan gestures detach the placement from its
//! anchor and a fresh anchor is requested when the gesture ends. At most one
//! placement exists at a time, enforced synchronously before any request is
//! issued.

use std::time::Duration;

use bevy::log::{debug, info};
use bevy::prelude::*;

use crate::error::PlaceError;
use crate::pose::{AnchorId, AnchorStatus, Pose, PoseSourceHandle};
use crate::types::{
    ArCommand, ArPlacementConfig, ArSession, FrameState, GestureMode, GestureState, PlacedRoot,
    PlacementPhase, PlacementState, UiDirective,
};

impl PlacementState {
    /// Validate a tap against the current state and, if accepted, stamp the
    /// cooldown clock. The caller completes the transition to
    /// [`PlacementPhase::Pending`] with the anchor request it mints.
    pub(crate) fn try_place(
        &mut self,
        now: Duration,
        cooldown: Duration,
        hit: Option<Pose>,
        gesture_idle: bool,
    ) -> Result<Pose, PlaceError> {
        if !gesture_idle {
            return Err(PlaceError::GestureActive);
        }
        if !matches!(self.phase, PlacementPhase::Empty) {
            return Err(PlaceError::AlreadyPlaced);
        }
        let Some(pose) = hit else {
            return Err(PlaceError::NoSurface);
        };
        if let Some(last) = self.last_place {
            if now.saturating_sub(last) < cooldown {
                return Err(PlaceError::Cooldown);
            }
        }
        self.last_place = Some(now);
        Ok(pose)
    }

    /// Drop the anchor binding without touching the scene graph. Returns the
    /// anchor to release, if one was committed; an in-flight re-anchor
    /// request is moved to the discard list instead.
    pub(crate) fn detach_for_gesture(&mut self) -> Option<AnchorId> {
        match self.phase {
            PlacementPhase::Anchored(anchor) => {
                self.phase = PlacementPhase::Detached;
                Some(anchor)
            }
            PlacementPhase::Reanchoring(request) => {
                self.discarded.push(request);
                self.phase = PlacementPhase::Detached;
                None
            }
            _ => None,
        }
    }

    /// Tear down to [`PlacementPhase::Empty`]. Returns the root entity to
    /// despawn and the anchor to release, if any. In-flight requests are
    /// dropped wholesale; the pose source is shut down separately by the
    /// session teardown, which cancels them.
    pub(crate) fn clear(&mut self) -> (Option<Entity>, Option<AnchorId>) {
        let root = self.root.take();
        let anchor = match self.phase {
            PlacementPhase::Anchored(anchor) => Some(anchor),
            _ => None,
        };
        *self = Self::default();
        (root, anchor)
    }
}

/// Apply `TapPlace` commands: debounce, validate, and open an anchor request.
pub(crate) fn apply_taps(
    mut commands_in: MessageReader<ArCommand>,
    mut placement: ResMut<PlacementState>,
    gesture: Res<GestureState>,
    frame: Res<FrameState>,
    config: Res<ArPlacementConfig>,
    session: Res<ArSession>,
    time: Res<Time>,
    source: Option<ResMut<PoseSourceHandle>>,
) {
    let taps = commands_in
        .read()
        .filter(|command| matches!(command, ArCommand::TapPlace))
        .count();
    if taps == 0 || !session.active {
        return;
    }
    let Some(mut source) = source else {
        return;
    };

    let gesture_idle = gesture.mode == GestureMode::None && !gesture.interaction_live;
    for _ in 0..taps {
        match placement.try_place(
            time.elapsed(),
            config.placement_cooldown,
            frame.hit,
            gesture_idle,
        ) {
            Ok(pose) => {
                // Phase moves to Pending in the same tick as the check so a
                // second tap can never pass the "nothing placed" test while
                // the request is in flight.
                let request = source.create_anchor(pose);
                placement.phase = PlacementPhase::Pending { request, pose };
                debug!("placement requested at {:?}", pose.translation);
            }
            Err(err) => debug!("tap ignored: {err}"),
        }
    }
}

/// Poll in-flight anchor requests and advance the placement phase.
pub(crate) fn poll_anchor_requests(
    mut commands: Commands,
    mut placement: ResMut<PlacementState>,
    session: Res<ArSession>,
    source: Option<ResMut<PoseSourceHandle>>,
    mut ui: MessageWriter<UiDirective>,
) {
    let Some(mut source) = source else {
        return;
    };

    // Requests whose owner moved on: release whatever they produce.
    placement
        .discarded
        .retain(|request| match source.poll_request(*request) {
            AnchorStatus::Pending => true,
            AnchorStatus::Ready(anchor) => {
                source.release_anchor(anchor);
                false
            }
            AnchorStatus::Failed => false,
        });

    if !session.active {
        return;
    }

    match placement.phase {
        PlacementPhase::Pending { request, pose } => match source.poll_request(request) {
            AnchorStatus::Pending => {}
            AnchorStatus::Ready(anchor) => {
                let root = commands
                    .spawn((
                        PlacedRoot,
                        pose.to_transform(),
                        Visibility::default(),
                        Name::new("placement-root"),
                    ))
                    .id();
                placement.root = Some(root);
                placement.phase = PlacementPhase::Anchored(anchor);
                info!("placement anchored at {:?}", pose.translation);
                ui.write(UiDirective::SetCatalogVisible(true));
            }
            AnchorStatus::Failed => {
                // Fail quiet: the user taps again.
                placement.phase = PlacementPhase::Empty;
                debug!("anchor creation failed, placement dropped");
            }
        },
        PlacementPhase::Reanchoring(request) => match source.poll_request(request) {
            AnchorStatus::Pending => {}
            AnchorStatus::Ready(anchor) => {
                placement.phase = PlacementPhase::Anchored(anchor);
                debug!("placement re-anchored");
            }
            AnchorStatus::Failed => {
                // Keep the placement; it simply holds its last transform.
                placement.phase = PlacementPhase::Detached;
                debug!("re-anchoring failed, holding last pose");
            }
        },
        _ => {}
    }
}

/// Write tracked poses into the placement root.
///
/// While a pan is active the root streams the live candidate pose; otherwise
/// it follows the committed anchor, holding the last transform whenever the
/// anchor pose is momentarily unavailable.
pub(crate) fn apply_tracking(
    frame: Res<FrameState>,
    gesture: Res<GestureState>,
    placement: Res<PlacementState>,
    source: Option<ResMut<PoseSourceHandle>>,
    mut roots: Query<&mut Transform, With<PlacedRoot>>,
) {
    if !frame.available {
        return;
    }
    let Some(root) = placement.root else {
        return;
    };
    let Ok(mut transform) = roots.get_mut(root) else {
        return;
    };

    if gesture.mode == GestureMode::Pan {
        if let Some(hit) = frame.hit {
            *transform = hit.to_transform();
        }
        return;
    }

    if let PlacementPhase::Anchored(anchor) = placement.phase {
        let Some(mut source) = source else {
            return;
        };
        if let Some(pose) = source.anchor_pose(anchor) {
            *transform = pose.to_transform();
        }
    }
}
