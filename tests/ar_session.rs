//! End-to-end flows driven through a headless app: session lifecycle,
//! tap-to-place, catalog selection, and touch gestures against a simulated
//! pose source.

use approx::assert_relative_eq;
use bevy::asset::{AssetApp, AssetPlugin};
use bevy::input::touch::{TouchInput, TouchPhase};
use bevy::input::InputPlugin;
use bevy::prelude::*;
use bevy::scene::Scene;
use std::f32::consts::FRAC_PI_2;

use bevy_ar_placement::{
    AnchorId, ArCommand, ArPlacementConfig, ArPlacementPlugin, ArSession, GestureMode,
    GestureNotice, GestureState, ModelCache, PlacementPhase, PlacementState, Pose,
    PoseSourceHandle, ReticleState, SimController, SimulatedPoseSource, SurfaceDetected,
    UiDirective,
};

#[derive(Resource, Default)]
struct SeenDirectives(Vec<UiDirective>);

#[derive(Resource, Default)]
struct SeenNotices(Vec<GestureNotice>);

#[derive(Resource, Default)]
struct SeenSurface(usize);

fn capture_directives(mut seen: ResMut<SeenDirectives>, mut reader: MessageReader<UiDirective>) {
    seen.0.extend(reader.read().cloned());
}

fn capture_notices(mut seen: ResMut<SeenNotices>, mut reader: MessageReader<GestureNotice>) {
    seen.0.extend(reader.read().copied());
}

fn capture_surface(mut seen: ResMut<SeenSurface>, mut reader: MessageReader<SurfaceDetected>) {
    seen.0 += reader.read().count();
}

struct Harness {
    app: App,
    ctl: SimController,
}

impl Harness {
    fn new() -> Self {
        let source = SimulatedPoseSource::new();
        let ctl = source.controller();

        let mut app = App::new();
        app.add_plugins((MinimalPlugins, InputPlugin, AssetPlugin::default()));
        app.init_asset::<Scene>();
        app.add_plugins(ArPlacementPlugin);
        app.insert_resource(PoseSourceHandle::new(source));
        app.init_resource::<SeenDirectives>();
        app.init_resource::<SeenNotices>();
        app.init_resource::<SeenSurface>();
        app.add_systems(
            Update,
            (capture_directives, capture_notices, capture_surface),
        );
        Self { app, ctl }
    }

    fn send(&mut self, command: ArCommand) {
        self.app.world_mut().write_message(command);
    }

    fn touch(&mut self, phase: TouchPhase, id: u64, position: Vec2) {
        self.app.world_mut().write_message(TouchInput {
            phase,
            position,
            window: Entity::PLACEHOLDER,
            force: None,
            id,
        });
    }

    fn begin(&mut self) {
        self.send(ArCommand::BeginSession);
        self.app.update();
    }

    /// Begin a session with a surface under the reticle and place an object.
    fn place_at(&mut self, pose: Pose) {
        self.begin();
        self.ctl.set_hit(Some(pose));
        self.app.update();
        self.send(ArCommand::TapPlace);
        self.app.update();
        assert!(matches!(
            self.placement().phase,
            PlacementPhase::Anchored(_)
        ));
    }

    fn select(&mut self, key: &str) {
        self.send(ArCommand::SelectItem(key.to_owned()));
        self.app.update();
    }

    fn placement(&self) -> &PlacementState {
        self.app.world().resource::<PlacementState>()
    }

    fn gesture(&self) -> &GestureState {
        self.app.world().resource::<GestureState>()
    }

    fn reticle_visible(&self) -> bool {
        self.app.world().resource::<ReticleState>().pose.is_some()
    }

    fn anchor_id(&self) -> AnchorId {
        match self.placement().phase {
            PlacementPhase::Anchored(anchor) => anchor,
            ref phase => panic!("expected an anchored placement, got {phase:?}"),
        }
    }

    fn root_translation(&self) -> Vec3 {
        let root = self.placement().root.expect("placement root");
        self.app
            .world()
            .get::<Transform>(root)
            .expect("root transform")
            .translation
    }

    fn item_transform(&self) -> Transform {
        let item = self.placement().item.as_ref().expect("active item");
        *self
            .app
            .world()
            .get::<Transform>(item.entity)
            .expect("item transform")
    }

    fn directives(&self) -> &[UiDirective] {
        &self.app.world().resource::<SeenDirectives>().0
    }

    fn notices(&self) -> &[GestureNotice] {
        &self.app.world().resource::<SeenNotices>().0
    }
}

fn pose(x: f32, y: f32, z: f32) -> Pose {
    Pose::from_translation(Vec3::new(x, y, z))
}

#[test]
fn tap_without_surface_places_nothing() {
    let mut h = Harness::new();
    h.begin();

    h.send(ArCommand::TapPlace);
    h.app.update();
    h.send(ArCommand::TapPlace);
    h.app.update();

    assert!(matches!(h.placement().phase, PlacementPhase::Empty));
    assert!(h.placement().root.is_none());
    assert_eq!(h.ctl.requests_made(), 0);
    assert!(!h.reticle_visible());
}

#[test]
fn tap_on_surface_places_exactly_once() {
    let mut h = Harness::new();
    h.begin();
    h.ctl.set_hit(Some(pose(1.0, 0.0, -2.0)));
    h.app.update();
    assert!(h.reticle_visible());

    // Two taps land in the same frame; set-then-confirm must accept one.
    h.send(ArCommand::TapPlace);
    h.send(ArCommand::TapPlace);
    h.app.update();

    assert!(matches!(h.placement().phase, PlacementPhase::Anchored(_)));
    assert_eq!(h.ctl.requests_made(), 1);
    assert_eq!(h.root_translation(), Vec3::new(1.0, 0.0, -2.0));
    assert!(!h.reticle_visible());

    h.app.update();
    assert!(h
        .directives()
        .contains(&UiDirective::SetCatalogVisible(true)));
}

#[test]
fn anchor_failure_silently_drops_the_tap() {
    let mut h = Harness::new();
    h.begin();
    h.ctl.set_hit(Some(pose(0.0, 0.0, -1.0)));
    h.app.update();

    h.ctl.fail_next_request();
    h.send(ArCommand::TapPlace);
    h.app.update();

    assert!(matches!(h.placement().phase, PlacementPhase::Empty));
    assert!(h.placement().root.is_none());
    // The reticle comes back; the user can just tap again.
    assert!(h.reticle_visible());
}

#[test]
fn pending_placement_hides_reticle_until_committed() {
    let mut h = Harness::new();
    h.begin();
    h.ctl.set_hit(Some(pose(0.0, 0.0, -1.0)));
    h.ctl.set_anchor_latency(2);
    h.app.update();

    h.send(ArCommand::TapPlace);
    h.app.update();
    assert!(matches!(
        h.placement().phase,
        PlacementPhase::Pending { .. }
    ));
    assert!(!h.reticle_visible());
    assert!(h.placement().root.is_none());

    h.app.update();
    h.app.update();
    assert!(matches!(h.placement().phase, PlacementPhase::Anchored(_)));
    assert!(h.placement().root.is_some());
}

#[test]
fn surface_detected_fires_once_per_session() {
    let mut h = Harness::new();
    h.begin();
    h.ctl.set_hit(Some(pose(0.0, 0.0, -1.0)));
    h.app.update();
    h.app.update();
    h.app.update();

    assert_eq!(h.app.world().resource::<SeenSurface>().0, 1);
}

#[test]
fn selection_loads_once_per_key_and_replaces_wholesale() {
    let mut h = Harness::new();
    h.place_at(pose(0.0, 0.0, -1.0));

    h.select("stethoscope");
    let first = h.placement().item.as_ref().unwrap().entity;
    assert_eq!(h.placement().item.as_ref().unwrap().key, "stethoscope");
    assert_eq!(h.app.world().resource::<ModelCache>().len(), 1);

    h.select("penlight");
    assert_eq!(h.placement().item.as_ref().unwrap().key, "penlight");
    assert_eq!(h.app.world().resource::<ModelCache>().len(), 2);
    // The previous item subtree is gone.
    assert!(h.app.world().get::<Transform>(first).is_none());

    h.select("stethoscope");
    assert_eq!(h.placement().item.as_ref().unwrap().key, "stethoscope");
    assert_eq!(h.app.world().resource::<ModelCache>().len(), 2);
    let item = h.placement().item.as_ref().unwrap();
    let cached = h
        .app
        .world()
        .resource::<ModelCache>()
        .get("models/stethoscope.glb")
        .cloned()
        .unwrap();
    assert_eq!(item.handle, cached);

    h.app.update();
    assert!(h.directives().iter().any(|d| matches!(
        d,
        UiDirective::SetItemInfo { title, .. } if title == "Stethoscope"
    )));
}

#[test]
fn selection_without_placement_is_ignored() {
    let mut h = Harness::new();
    h.begin();

    h.select("stethoscope");

    assert!(h.placement().item.is_none());
    assert!(h.app.world().resource::<ModelCache>().is_empty());
}

#[test]
fn unknown_key_is_ignored() {
    let mut h = Harness::new();
    h.place_at(pose(0.0, 0.0, -1.0));

    h.select("tricorder");

    assert!(h.placement().item.is_none());
    assert!(h.app.world().resource::<ModelCache>().is_empty());
}

#[test]
fn pan_detaches_follows_and_reanchors() {
    let mut h = Harness::new();
    // Headless: no camera to cast rays through, so disable the hit gate.
    h.app
        .world_mut()
        .resource_mut::<ArPlacementConfig>()
        .pan_requires_hit = false;
    h.place_at(pose(1.0, 0.0, -2.0));
    h.select("stethoscope");
    let first_anchor = h.anchor_id();

    h.touch(TouchPhase::Started, 0, Vec2::new(400.0, 300.0));
    h.app.update();
    assert_eq!(h.gesture().mode, GestureMode::Pan);
    assert!(matches!(h.placement().phase, PlacementPhase::Detached));
    assert_eq!(h.ctl.anchors_released(), 1);

    // The item rides the live candidate pose while panning.
    h.ctl.set_hit(Some(pose(3.0, 0.0, -4.0)));
    h.touch(TouchPhase::Moved, 0, Vec2::new(500.0, 320.0));
    h.app.update();
    assert_eq!(h.root_translation(), Vec3::new(3.0, 0.0, -4.0));
    assert!(matches!(h.placement().phase, PlacementPhase::Detached));

    // Release: snap to a freshly created anchor at the latest pose.
    h.touch(TouchPhase::Ended, 0, Vec2::new(500.0, 320.0));
    h.app.update();
    assert_eq!(h.gesture().mode, GestureMode::None);
    let second_anchor = h.anchor_id();
    assert_ne!(first_anchor, second_anchor);
    assert_eq!(h.root_translation(), Vec3::new(3.0, 0.0, -4.0));

    h.app.update();
    assert!(h.notices().contains(&GestureNotice::Started(GestureMode::Pan)));
    assert!(h.notices().contains(&GestureNotice::Ended(GestureMode::Pan)));
}

#[test]
fn pinch_and_twist_apply_and_return_to_baseline() {
    let mut h = Harness::new();
    h.place_at(pose(0.0, 0.0, -1.0));
    h.select("stethoscope");

    h.touch(TouchPhase::Started, 0, Vec2::new(300.0, 300.0));
    h.touch(TouchPhase::Started, 1, Vec2::new(500.0, 300.0));
    h.app.update();
    assert_eq!(h.gesture().mode, GestureMode::ScaleRotate);
    // A two-finger gesture never detaches the anchor.
    assert!(matches!(h.placement().phase, PlacementPhase::Anchored(_)));

    // Pinch out to double the span.
    h.touch(TouchPhase::Moved, 0, Vec2::new(200.0, 300.0));
    h.touch(TouchPhase::Moved, 1, Vec2::new(600.0, 300.0));
    h.app.update();
    assert_relative_eq!(h.item_transform().scale.x, 2.0, epsilon = 1e-4);

    // Same span, rotated a quarter turn on screen.
    h.touch(TouchPhase::Moved, 0, Vec2::new(400.0, 200.0));
    h.touch(TouchPhase::Moved, 1, Vec2::new(400.0, 400.0));
    h.app.update();
    assert_relative_eq!(h.item_transform().scale.x, 1.0, epsilon = 1e-4);
    let yaw = h.item_transform().rotation.to_euler(EulerRot::YXZ).0;
    assert_relative_eq!(yaw, -FRAC_PI_2, epsilon = 1e-4);

    // Back to the exact starting points: scale and yaw restore.
    h.touch(TouchPhase::Moved, 0, Vec2::new(300.0, 300.0));
    h.touch(TouchPhase::Moved, 1, Vec2::new(500.0, 300.0));
    h.app.update();
    assert_relative_eq!(h.item_transform().scale.x, 1.0, epsilon = 1e-4);
    let yaw = h.item_transform().rotation.to_euler(EulerRot::YXZ).0;
    assert_relative_eq!(yaw, 0.0, epsilon = 1e-4);

    h.touch(TouchPhase::Ended, 0, Vec2::new(300.0, 300.0));
    h.touch(TouchPhase::Ended, 1, Vec2::new(500.0, 300.0));
    h.app.update();
    assert_eq!(h.gesture().mode, GestureMode::None);
    assert!(matches!(h.placement().phase, PlacementPhase::Anchored(_)));
}

#[test]
fn pinch_scale_respects_configured_bounds() {
    let mut h = Harness::new();
    h.app
        .world_mut()
        .resource_mut::<ArPlacementConfig>()
        .scale_bounds = Some((0.5, 2.0));
    h.place_at(pose(0.0, 0.0, -1.0));
    h.select("stethoscope");

    h.touch(TouchPhase::Started, 0, Vec2::new(300.0, 300.0));
    h.touch(TouchPhase::Started, 1, Vec2::new(500.0, 300.0));
    h.app.update();

    h.touch(TouchPhase::Moved, 0, Vec2::new(0.0, 300.0));
    h.touch(TouchPhase::Moved, 1, Vec2::new(2000.0, 300.0));
    h.app.update();

    assert_relative_eq!(h.item_transform().scale.x, 2.0, epsilon = 1e-4);
}

#[test]
fn tracking_loss_holds_the_last_transform() {
    let mut h = Harness::new();
    h.place_at(pose(0.0, 0.0, -1.0));
    let anchor = h.anchor_id();

    // The anchor drifts; the root follows.
    h.ctl.set_anchor_pose(anchor, pose(0.2, 0.0, -1.1));
    h.app.update();
    assert_eq!(h.root_translation(), Vec3::new(0.2, 0.0, -1.1));

    // Tracking loss: the pose moves but is not visible; hold last known good.
    h.ctl.set_anchors_visible(false);
    h.ctl.set_anchor_pose(anchor, pose(9.0, 9.0, 9.0));
    h.app.update();
    assert_eq!(h.root_translation(), Vec3::new(0.2, 0.0, -1.1));

    h.ctl.set_anchors_visible(true);
    h.app.update();
    assert_eq!(h.root_translation(), Vec3::new(9.0, 9.0, 9.0));
}

#[test]
fn ending_the_session_tears_everything_down() {
    let mut h = Harness::new();
    h.place_at(pose(0.0, 0.0, -1.0));
    h.select("stethoscope");
    let root = h.placement().root.unwrap();
    let item = h.placement().item.as_ref().unwrap().entity;

    h.send(ArCommand::EndSession);
    h.app.update();

    assert!(!h.app.world().resource::<ArSession>().active);
    assert!(matches!(h.placement().phase, PlacementPhase::Empty));
    assert!(h.placement().root.is_none());
    assert!(h.placement().item.is_none());
    assert!(h.app.world().get::<Transform>(root).is_none());
    assert!(h.app.world().get::<Transform>(item).is_none());
    assert!(h.ctl.was_shut_down());
    assert_eq!(h.ctl.anchor_count(), 0);
    assert!(!h.reticle_visible());

    h.app.update();
    assert!(h
        .directives()
        .contains(&UiDirective::SetCatalogVisible(false)));
}

#[test]
fn session_restarts_cleanly_after_teardown() {
    let mut h = Harness::new();
    h.place_at(pose(0.0, 0.0, -1.0));

    h.send(ArCommand::EndSession);
    h.app.update();

    // A fresh session against a revived source places again from scratch.
    h.ctl.reset();
    h.begin();
    h.ctl.set_hit(Some(pose(2.0, 0.0, -3.0)));
    h.app.update();
    assert!(h.reticle_visible());

    h.send(ArCommand::TapPlace);
    h.app.update();
    assert!(matches!(h.placement().phase, PlacementPhase::Anchored(_)));
    assert_eq!(h.root_translation(), Vec3::new(2.0, 0.0, -3.0));
    assert_eq!(h.app.world().resource::<SeenSurface>().0, 2);
}
