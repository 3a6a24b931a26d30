//! Catalog item loading, attachment, and normalization.
//!
//! Selected models are loaded at most once per asset path and cached as
//! scene templates; every selection spawns a fresh instance under the
//! placement root. Once a model's meshes are available it is normalized:
//! recentered horizontally, grounded so its lowest point sits at the local
//! origin, and scaled uniformly so its largest dimension matches the
//! configured target size.

use std::collections::{HashMap, HashSet};

use bevy::asset::LoadState;
use bevy::gltf::GltfAssetLabel;
use bevy::log::{debug, info, warn};
use bevy::prelude::*;
use bevy::mesh::VertexAttributeValues;

use crate::catalog::Catalog;
use crate::types::{
    ActiveItem, ArCommand, ArPlacementConfig, ArSession, GestureState, ItemBounds, NeedsFit,
    PlacedItem, PlacementState, UiDirective,
};

/// Cache of loaded scene templates, one per distinct asset path.
#[derive(Resource, Default)]
pub struct ModelCache {
    entries: HashMap<String, Handle<Scene>>,
}

impl ModelCache {
    /// Handle for `path`, loading it on first use and cloning the cached
    /// handle afterwards.
    pub(crate) fn handle_for(&mut self, path: &str, asset_server: &AssetServer) -> Handle<Scene> {
        if let Some(handle) = self.entries.get(path) {
            return handle.clone();
        }
        debug!("loading model {path}");
        let handle: Handle<Scene> =
            asset_server.load(GltfAssetLabel::Scene(0).from_asset(path.to_owned()));
        self.entries.insert(path.to_owned(), handle.clone());
        handle
    }

    /// Cached handle for `path`, if it was ever loaded.
    pub fn get(&self, path: &str) -> Option<&Handle<Scene>> {
        self.entries.get(path)
    }

    /// Number of distinct assets loaded so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been loaded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Apply `SelectItem` commands: swap the attached model wholesale.
pub(crate) fn apply_selection(
    mut commands: Commands,
    mut commands_in: MessageReader<ArCommand>,
    mut placement: ResMut<PlacementState>,
    gesture: Res<GestureState>,
    session: Res<ArSession>,
    catalog: Res<Catalog>,
    mut cache: ResMut<ModelCache>,
    asset_server: Option<Res<AssetServer>>,
    mut ui: MessageWriter<UiDirective>,
) {
    for command in commands_in.read() {
        let ArCommand::SelectItem(key) = command else {
            continue;
        };
        if !session.active {
            debug!("selection outside a session ignored");
            continue;
        }
        if gesture.interaction_live {
            debug!("selection suppressed during gesture");
            continue;
        }
        // The item is a child of the placement; nothing to attach to yet.
        let Some(root) = placement.root else {
            debug!("selection before placement ignored");
            continue;
        };
        let Some(entry) = catalog.get(key) else {
            warn!("unknown catalog key {key:?}");
            continue;
        };
        let Some(asset_server) = asset_server.as_deref() else {
            warn!("no asset server, cannot load {key:?}");
            continue;
        };

        let handle = cache.handle_for(&entry.asset_path, asset_server);

        if let Some(old) = placement.item.take() {
            commands.entity(old.entity).despawn();
        }

        let item = commands
            .spawn((
                PlacedItem,
                Transform::default(),
                Visibility::default(),
                Name::new(format!("item:{}", entry.key)),
                ChildOf(root),
            ))
            .id();
        let fit = commands
            .spawn((
                SceneRoot(handle.clone()),
                Transform::default(),
                Visibility::default(),
                NeedsFit,
                ChildOf(item),
            ))
            .id();

        placement.item = Some(ActiveItem {
            key: entry.key.clone(),
            entity: item,
            fit_entity: fit,
            handle,
        });

        info!("selected {}", entry.key);
        ui.write(UiDirective::SetItemInfo {
            title: entry.display_name.clone(),
            description: entry.description.clone(),
        });
        ui.write(UiDirective::SetInfoPanelVisible(true));
    }
}

/// Compute the normalization transform and grab sphere for model bounds.
pub(crate) fn fit_with_bounds(min: Vec3, max: Vec3, target: f32) -> (Transform, ItemBounds) {
    let size = (max - min).max(Vec3::ZERO);
    let max_dim = size.max_element().max(1e-5);
    let scale = target / max_dim;
    let center = (min + max) * 0.5;

    let transform = Transform {
        translation: Vec3::new(-center.x, -min.y, -center.z) * scale,
        rotation: Quat::IDENTITY,
        scale: Vec3::splat(scale),
    };
    let bounds = ItemBounds {
        center: Vec3::new(0.0, (center.y - min.y) * scale, 0.0),
        radius: size.length() * 0.5 * scale,
    };
    (transform, bounds)
}

/// Min/max corners of a mesh's vertex positions.
fn mesh_bounds(mesh: &Mesh) -> Option<(Vec3, Vec3)> {
    let positions = match mesh.attribute(Mesh::ATTRIBUTE_POSITION)? {
        VertexAttributeValues::Float32x3(values) => values,
        _ => return None,
    };
    if positions.is_empty() {
        return None;
    }
    let mut min = Vec3::MAX;
    let mut max = Vec3::MIN;
    for p in positions {
        let p = Vec3::from_array(*p);
        min = min.min(p);
        max = max.max(p);
    }
    Some((min, max))
}

/// Transform from `entity`'s local space into `ancestor`'s local space.
fn transform_relative_to(
    entity: Entity,
    ancestor: Entity,
    parents: &Query<&ChildOf>,
    transforms: &Query<&Transform>,
) -> Option<Transform> {
    let mut chain = Vec::new();
    let mut current = entity;
    while current != ancestor {
        if let Ok(transform) = transforms.get(current) {
            chain.push(*transform);
        }
        current = parents.get(current).ok()?.parent();
    }
    let mut accumulated = Transform::IDENTITY;
    for transform in chain.iter().rev() {
        accumulated = accumulated.mul_transform(*transform);
    }
    Some(accumulated)
}

/// Normalize freshly instantiated models.
///
/// Waits until the spawned scene exposes mesh geometry, then merges the
/// vertex bounds of every descendant mesh (composed through intermediate
/// node transforms) and applies the recenter/ground/scale fit.
pub(crate) fn fit_loaded_models(
    mut commands: Commands,
    config: Res<ArPlacementConfig>,
    meshes: Res<Assets<Mesh>>,
    pending: Query<Entity, With<NeedsFit>>,
    children: Query<&Children>,
    parents: Query<&ChildOf>,
    transforms: Query<&Transform>,
    mesh_nodes: Query<&Mesh3d>,
) {
    for fit_entity in pending.iter() {
        let mut min = Vec3::MAX;
        let mut max = Vec3::MIN;
        let mut any = false;

        for descendant in children.iter_descendants(fit_entity) {
            let Ok(mesh_handle) = mesh_nodes.get(descendant) else {
                continue;
            };
            let Some(mesh) = meshes.get(&mesh_handle.0) else {
                continue;
            };
            let Some((mesh_min, mesh_max)) = mesh_bounds(mesh) else {
                continue;
            };
            let Some(local) = transform_relative_to(descendant, fit_entity, &parents, &transforms)
            else {
                continue;
            };
            for corner in [
                Vec3::new(mesh_min.x, mesh_min.y, mesh_min.z),
                Vec3::new(mesh_min.x, mesh_min.y, mesh_max.z),
                Vec3::new(mesh_min.x, mesh_max.y, mesh_min.z),
                Vec3::new(mesh_min.x, mesh_max.y, mesh_max.z),
                Vec3::new(mesh_max.x, mesh_min.y, mesh_min.z),
                Vec3::new(mesh_max.x, mesh_min.y, mesh_max.z),
                Vec3::new(mesh_max.x, mesh_max.y, mesh_min.z),
                Vec3::new(mesh_max.x, mesh_max.y, mesh_max.z),
            ] {
                let p = local.transform_point(corner);
                min = min.min(p);
                max = max.max(p);
            }
            any = true;
        }

        if !any {
            // Scene not instantiated yet; try again next tick.
            continue;
        }

        let (fit, bounds) = fit_with_bounds(min, max, config.target_size);
        debug!(
            "fitted model: scale {:.3}, grab radius {:.3}",
            fit.scale.x, bounds.radius
        );
        commands
            .entity(fit_entity)
            .insert((fit, bounds))
            .remove::<NeedsFit>();
    }
}

/// Surface model load failures in the info panel.
pub(crate) fn report_load_failures(
    placement: Res<PlacementState>,
    catalog: Res<Catalog>,
    asset_server: Option<Res<AssetServer>>,
    mut reported: Local<HashSet<AssetId<Scene>>>,
    mut ui: MessageWriter<UiDirective>,
) {
    let Some(item) = placement.item.as_ref() else {
        return;
    };
    let Some(asset_server) = asset_server else {
        return;
    };
    let id = item.handle.id();
    if reported.contains(&id) {
        return;
    }
    if let Some(LoadState::Failed(err)) = asset_server.get_load_state(id) {
        reported.insert(id);
        warn!("model load failed for {}: {err}", item.key);
        let name = catalog
            .get(&item.key)
            .map(|entry| entry.display_name.clone())
            .unwrap_or_else(|| item.key.clone());
        ui.write(UiDirective::SetItemInfo {
            title: name.clone(),
            description: format!("The 3D model for {name} could not be loaded."),
        });
        ui.write(UiDirective::SetInfoPanelVisible(true));
    }
}
