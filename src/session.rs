//! Session lifecycle.
//!
//! Everything session-scoped lives in explicit resources, so starting a
//! session is one reset and ending it is one teardown: despawn the placement
//! subtree, release anchors, shut down the pose source, and hide the host
//! panels. Anchor results that resolve after teardown are cancelled by the
//! source, never processed.

use bevy::log::{debug, info};
use bevy::prelude::*;

use crate::catalog::Catalog;
use crate::pose::PoseSourceHandle;
use crate::types::{
    ArCommand, ArSession, FrameState, GestureState, PlacementState, ReticleState, UiDirective,
};

/// Apply `BeginSession` / `EndSession` commands.
pub(crate) fn apply_lifecycle(
    mut commands: Commands,
    mut commands_in: MessageReader<ArCommand>,
    mut session: ResMut<ArSession>,
    mut placement: ResMut<PlacementState>,
    mut gesture: ResMut<GestureState>,
    mut frame: ResMut<FrameState>,
    mut reticle: ResMut<ReticleState>,
    catalog: Res<Catalog>,
    source: Option<ResMut<PoseSourceHandle>>,
    mut ui: MessageWriter<UiDirective>,
) {
    let mut source = source;
    for command in commands_in.read() {
        match command {
            ArCommand::BeginSession => {
                if session.active {
                    debug!("session already active");
                    continue;
                }
                session.active = true;
                *frame = FrameState::default();
                gesture.reset();
                info!("session started");

                ui.write(UiDirective::PopulateCatalog(catalog.listings()));
                ui.write(UiDirective::SetItemInfo {
                    title: "Scan the floor".to_owned(),
                    description: "Point the camera at the floor and tap to place an item."
                        .to_owned(),
                });
                ui.write(UiDirective::SetInfoPanelVisible(true));
            }
            ArCommand::EndSession => {
                if !session.active {
                    debug!("no session to end");
                    continue;
                }
                session.active = false;

                let (root, anchor) = placement.clear();
                if let Some(root) = root {
                    commands.entity(root).despawn();
                }
                if let Some(source) = source.as_deref_mut() {
                    if let Some(anchor) = anchor {
                        source.release_anchor(anchor);
                    }
                    source.shutdown();
                }

                gesture.reset();
                *frame = FrameState::default();
                reticle.pose = None;

                ui.write(UiDirective::SetCatalogVisible(false));
                ui.write(UiDirective::SetInfoPanelVisible(false));
                info!("session ended");
            }
            _ => {}
        }
    }
}
