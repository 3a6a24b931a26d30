//! Desktop preview of the placement flow.
//!
//! The mouse cursor plays the role of the device camera: its ray against a
//! virtual floor feeds the simulated pose source, so the reticle tracks the
//! cursor. Enter taps to place, digits pick catalog items, and mouse drags
//! are bridged to synthetic touches (hold Shift while dragging for a
//! two-finger pinch/twist).

use bevy::input::touch::{TouchInput, TouchPhase};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_ar_placement::{
    ArCamera, ArCommand, ArPlacementPlugin, ArSession, Catalog, GestureState, PlacementState,
    Pose, PoseSourceHandle, SimController, SimulatedPoseSource, UiDirective,
};

#[derive(Resource)]
struct Sim(SimController);

#[derive(Resource, Default)]
struct MouseTouch {
    active: bool,
    pinch: bool,
    pivot: Vec2,
}

#[derive(Component)]
struct Hud;

fn main() {
    let source = SimulatedPoseSource::new();
    let sim = source.controller();

    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(ArPlacementPlugin)
        .insert_resource(PoseSourceHandle::new(source))
        .insert_resource(Sim(sim))
        .init_resource::<MouseTouch>()
        .add_systems(Startup, setup)
        .add_systems(
            Update,
            (feed_hit_pose, bridge_mouse_touch, keyboard_controls, update_hud),
        )
        .run();
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // Camera
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 2.2, 3.5).looking_at(Vec3::new(0.0, 0.0, -0.5), Vec3::Y),
        ArCamera,
    ));

    // Light
    commands.spawn((
        DirectionalLight {
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // Floor standing in for the scanned surface
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::new(Vec3::Y, Vec2::splat(6.0)))),
        MeshMaterial3d(materials.add(Color::srgb(0.25, 0.3, 0.35))),
    ));

    // HUD
    commands
        .spawn((
            Node {
                position_type: PositionType::Absolute,
                top: Val::Px(10.0),
                left: Val::Px(10.0),
                ..default()
            },
            BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.7)),
        ))
        .with_children(|p| {
            p.spawn((
                Text::new(""),
                TextFont {
                    font_size: 14.0,
                    ..default()
                },
                TextColor(Color::WHITE),
                Hud,
            ));
        });
}

/// Cursor ray against the floor plane stands in for surface hit testing.
fn feed_hit_pose(
    sim: Res<Sim>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<ArCamera>>,
) {
    let hit = cursor_floor_point(&windows, &cameras);
    sim.0.set_hit(hit.map(Pose::from_translation));
}

fn cursor_floor_point(
    windows: &Query<&Window, With<PrimaryWindow>>,
    cameras: &Query<(&Camera, &GlobalTransform), With<ArCamera>>,
) -> Option<Vec3> {
    let window = windows.iter().next()?;
    let cursor = window.cursor_position()?;
    let (camera, camera_transform) = cameras.iter().next()?;
    let ray = camera.viewport_to_world(camera_transform, cursor).ok()?;

    let denom = Vec3::Y.dot(*ray.direction);
    if denom.abs() < 1e-5 {
        return None;
    }
    let t = -ray.origin.y / denom;
    if t < 0.0 {
        return None;
    }
    Some(ray.origin + *ray.direction * t)
}

/// Bridge mouse drags to synthetic touches. A plain drag is one finger;
/// holding Shift pins a second finger next to the press point so the drag
/// pinches and twists against it.
fn bridge_mouse_touch(
    buttons: Res<ButtonInput<MouseButton>>,
    keys: Res<ButtonInput<KeyCode>>,
    windows: Query<(Entity, &Window), With<PrimaryWindow>>,
    mut state: ResMut<MouseTouch>,
    mut touches_out: MessageWriter<TouchInput>,
) {
    let Some((window_entity, window)) = windows.iter().next() else {
        return;
    };
    let cursor = window.cursor_position();

    let mut write = |phase: TouchPhase, id: u64, position: Vec2| {
        touches_out.write(TouchInput {
            phase,
            position,
            window: window_entity,
            force: None,
            id,
        });
    };

    if buttons.just_pressed(MouseButton::Left) {
        if let Some(cursor) = cursor {
            state.active = true;
            state.pinch = keys.pressed(KeyCode::ShiftLeft);
            state.pivot = cursor;
            write(TouchPhase::Started, 0, cursor);
            if state.pinch {
                write(TouchPhase::Started, 1, cursor + Vec2::new(140.0, 0.0));
            }
        }
        return;
    }

    if state.active && buttons.pressed(MouseButton::Left) {
        if let Some(cursor) = cursor {
            write(TouchPhase::Moved, 0, cursor);
        }
        return;
    }

    if state.active && buttons.just_released(MouseButton::Left) {
        let position = cursor.unwrap_or(state.pivot);
        write(TouchPhase::Ended, 0, position);
        if state.pinch {
            write(TouchPhase::Ended, 1, state.pivot + Vec2::new(140.0, 0.0));
        }
        state.active = false;
        state.pinch = false;
    }
}

fn keyboard_controls(
    keys: Res<ButtonInput<KeyCode>>,
    session: Res<ArSession>,
    sim: Res<Sim>,
    catalog: Res<Catalog>,
    mut ar: MessageWriter<ArCommand>,
) {
    if keys.just_pressed(KeyCode::Space) {
        if session.active {
            ar.write(ArCommand::EndSession);
        } else {
            sim.0.reset();
            ar.write(ArCommand::BeginSession);
        }
    }
    if keys.just_pressed(KeyCode::Enter) {
        ar.write(ArCommand::TapPlace);
    }

    const DIGITS: [KeyCode; 9] = [
        KeyCode::Digit1,
        KeyCode::Digit2,
        KeyCode::Digit3,
        KeyCode::Digit4,
        KeyCode::Digit5,
        KeyCode::Digit6,
        KeyCode::Digit7,
        KeyCode::Digit8,
        KeyCode::Digit9,
    ];
    for (key, entry) in DIGITS.iter().zip(catalog.entries()) {
        if keys.just_pressed(*key) {
            ar.write(ArCommand::SelectItem(entry.key.clone()));
        }
    }
}

fn update_hud(
    session: Res<ArSession>,
    placement: Res<PlacementState>,
    gesture: Res<GestureState>,
    catalog: Res<Catalog>,
    mut directives: MessageReader<UiDirective>,
    mut info: Local<String>,
    mut query: Query<&mut Text, With<Hud>>,
) {
    for directive in directives.read() {
        if let UiDirective::SetItemInfo { title, description } = directive {
            *info = format!("{title} - {description}");
        }
    }

    let Ok(mut text) = query.single_mut() else {
        return;
    };

    let items: String = catalog
        .entries()
        .iter()
        .take(9)
        .enumerate()
        .map(|(i, entry)| format!("[{}] {}  ", i + 1, entry.display_name))
        .collect();

    text.0 = format!(
        "Session: {} | Placement: {:?} | Gesture: {}\n{}\n\n\
         [Space] Start/End session [Enter] Tap to place\n\
         Drag to pan, Shift+Drag to pinch/twist\n{}",
        if session.active { "active" } else { "idle" },
        placement.phase,
        gesture.mode,
        *info,
        items,
    );
}
