//! starfield.rs
//!
//! Parallax star clouds. Each group spins slowly as a whole (later groups
//! faster) while the pointer pushes nearby points aside on the xy plane.
//! Pushed points are never pulled back, they drift for as long as the
//! pointer keeps nudging them.

use bevy::prelude::*;
use bevy::render::mesh::PrimitiveTopology;
use bevy::render::render_asset::RenderAssetUsages;
use rand::Rng;

use crate::config::{
    POINTER_WORLD_SCALE, STAR_OPACITY, STAR_PITCH_RATE, STAR_REPEL_FORCE, STAR_REPEL_RADIUS,
    STAR_SIZE_MAX, STAR_SIZE_MIN, STAR_VOLUME, STAR_YAW_RATE,
};
use crate::systems::backdrop::{Backdrop, BackdropSet, SceneAssets};
use crate::systems::pointer::PointerState;

pub struct StarfieldPlugin;

impl Plugin for StarfieldPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (
            drift.in_set(BackdropSet::Simulate),
            upload_positions.in_set(BackdropSet::Present),
        ));
    }
}

/// One point cloud. Point count is fixed at creation, only positions move.
#[derive(Component, Debug, Clone)]
pub struct StarGroup {
    index: usize,
    positions: Vec<Vec3>,
    sizes: Vec<f32>,
    pub yaw: f32,
    pub pitch: f32,
}

impl StarGroup {
    /// Scatters `count` points uniformly through the star volume
    pub fn scatter(index: usize, count: usize, rng: &mut impl Rng) -> Self {
        let half = STAR_VOLUME / 2.0;
        let mut positions = Vec::with_capacity(count);
        let mut sizes = Vec::with_capacity(count);

        for _ in 0..count {
            positions.push(Vec3::new(
                rng.random_range(-half..half),
                rng.random_range(-half..half),
                rng.random_range(-half..half),
            ));
            sizes.push(rng.random_range(STAR_SIZE_MIN..STAR_SIZE_MAX));
        }

        Self::from_points(index, positions, sizes)
    }

    pub fn from_points(index: usize, positions: Vec<Vec3>, sizes: Vec<f32>) -> Self {
        debug_assert_eq!(positions.len(), sizes.len());
        Self {
            index,
            positions,
            sizes,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    // later groups turn faster
    fn phase(&self) -> f32 {
        (self.index + 1) as f32
    }

    pub fn update(&mut self, pointer: PointerState) {
        let phase = self.phase();
        self.yaw += STAR_YAW_RATE * phase;
        self.pitch += STAR_PITCH_RATE * phase;

        let target = pointer.world_xy(POINTER_WORLD_SCALE);
        for position in self.positions.iter_mut() {
            let offset = position.truncate() - target;
            let distance = offset.length();

            if distance < STAR_REPEL_RADIUS {
                // push along pointer -> point, depth untouched
                let force = (STAR_REPEL_RADIUS - distance) * STAR_REPEL_FORCE;
                position.x += offset.x * force;
                position.y += offset.y * force;
            }
        }
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.pitch, self.yaw, 0.0)
    }

    // bigger stars read brighter, point primitives are all one pixel
    fn colors(&self) -> Vec<[f32; 4]> {
        self.sizes
            .iter()
            .map(|size| {
                let intensity = size / STAR_SIZE_MAX;
                [intensity, intensity, intensity, STAR_OPACITY]
            })
            .collect()
    }

    fn position_attribute(&self) -> Vec<[f32; 3]> {
        self.positions.iter().map(|p| p.to_array()).collect()
    }

    pub fn build_mesh(&self) -> Mesh {
        // keep a main world copy so positions can be rewritten every frame
        let mut mesh = Mesh::new(
            PrimitiveTopology::PointList,
            RenderAssetUsages::RENDER_WORLD | RenderAssetUsages::MAIN_WORLD,
        );
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.position_attribute());
        mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, self.colors());
        mesh
    }

    pub fn write_positions(&self, mesh: &mut Mesh) {
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.position_attribute());
    }
}

// shared by every group
pub fn star_material() -> StandardMaterial {
    StandardMaterial {
        base_color: Color::WHITE,
        alpha_mode: AlphaMode::Blend,
        unlit: true,
        ..default()
    }
}

/// Spawns `groups` star clouds of `per_group` points under `root`
pub fn spawn(
    world: &mut World,
    root: Entity,
    assets: &mut SceneAssets,
    groups: usize,
    per_group: usize,
    rng: &mut impl Rng,
) -> Vec<Entity> {
    let material = assets.add_material(world, star_material());

    (0..groups)
        .map(|index| {
            let group = StarGroup::scatter(index, per_group, rng);
            let mesh = assets.add_mesh(world, group.build_mesh());
            let transform = Transform::from_rotation(group.orientation());

            world
                .spawn((
                    group,
                    Mesh3d(mesh),
                    MeshMaterial3d(material.clone()),
                    transform,
                    ChildOf(root),
                ))
                .id()
        })
        .collect()
}

fn drift(
    backdrops: Query<&Backdrop>,
    mut groups: Query<(&mut StarGroup, &ChildOf)>,
) {
    for (mut group, child_of) in groups.iter_mut() {
        let Ok(backdrop) = backdrops.get(child_of.parent()) else {
            continue;
        };
        if backdrop.frames().is_running() {
            group.update(backdrop.pointer());
        }
    }
}

// push moved points to the gpu mesh and apply the group spin
fn upload_positions(
    mut backdrops: Query<&mut Backdrop>,
    mut groups: Query<(&StarGroup, &Mesh3d, &mut Transform, &ChildOf), Changed<StarGroup>>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    for (group, mesh_handle, mut transform, child_of) in groups.iter_mut() {
        let Ok(mut backdrop) = backdrops.get_mut(child_of.parent()) else {
            continue;
        };
        if !backdrop.frames().is_running() {
            continue;
        }

        transform.rotation = group.orientation();

        match meshes.get_mut(&mesh_handle.0) {
            Some(mesh) => group.write_positions(mesh),
            None => {
                error!(
                    "star group {} lost its mesh, halting backdrop {:?}",
                    group.index(),
                    child_of.parent()
                );
                backdrop.halt();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn single_point(position: Vec3) -> StarGroup {
        StarGroup::from_points(0, vec![position], vec![1.0])
    }

    #[test]
    fn test_scatter_fills_volume() {
        let mut rng = StdRng::seed_from_u64(42);
        let group = StarGroup::scatter(0, 800, &mut rng);
        assert_eq!(group.len(), 800);
        assert_eq!(group.sizes.len(), 800);

        for (i, p) in group.positions().iter().enumerate() {
            assert!(
                p.abs().max_element() <= STAR_VOLUME / 2.0,
                "Star {i} spawned outside the volume: {p}"
            );
        }
        for size in &group.sizes {
            assert!((STAR_SIZE_MIN..STAR_SIZE_MAX).contains(size));
        }
    }

    #[test]
    fn test_point_count_never_changes() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut group = StarGroup::scatter(2, 800, &mut rng);

        for step in 0..200 {
            let t = step as f32 * 0.05;
            group.update(PointerState::new(t.sin(), t.cos()));
            assert_eq!(group.len(), 800);
        }
    }

    #[test]
    fn test_near_point_is_pushed_away_on_plane_only() {
        // pointer at centre maps to world origin
        let mut group = single_point(Vec3::new(1.0, 0.0, 3.0));
        group.update(PointerState::default());

        let moved = group.positions()[0];
        // distance 1 -> force (5 - 1) * 0.01 = 0.04
        assert!((moved.x - 1.04).abs() < 1e-6);
        assert_eq!(moved.y, 0.0);
        assert_eq!(moved.z, 3.0);
    }

    #[test]
    fn test_pointer_is_projected_into_world() {
        // pointer (0.5, 0.5) sits at (5, 5) in world space
        let mut group = single_point(Vec3::new(5.0, 6.0, 0.0));
        group.update(PointerState::new(0.5, 0.5));

        let moved = group.positions()[0];
        assert_eq!(moved.x, 5.0);
        assert!(moved.y > 6.0);
    }

    #[test]
    fn test_far_point_is_untouched() {
        let start = Vec3::new(12.0, -9.0, 4.0);
        let mut group = single_point(start);
        group.update(PointerState::default());
        assert_eq!(group.positions()[0], start);
    }

    #[test]
    fn test_repeated_push_settles_at_radius_edge() {
        let mut group = single_point(Vec3::new(0.5, 0.0, 0.0));
        for _ in 0..10_000 {
            group.update(PointerState::default());
        }
        // pushed out to the repulsion edge and left there
        let x = group.positions()[0].x;
        assert!(x > 4.0 && x <= STAR_REPEL_RADIUS + 1e-3, "x = {x}");
    }

    #[test]
    fn test_later_groups_spin_faster() {
        let mut first = StarGroup::from_points(0, Vec::new(), Vec::new());
        let mut third = StarGroup::from_points(2, Vec::new(), Vec::new());
        first.update(PointerState::default());
        third.update(PointerState::default());

        assert!((first.yaw - STAR_YAW_RATE).abs() < 1e-9);
        assert!((third.yaw - 3.0 * STAR_YAW_RATE).abs() < 1e-9);
        assert!((third.pitch - 3.0 * STAR_PITCH_RATE).abs() < 1e-9);
    }

    #[test]
    fn test_mesh_tracks_positions() {
        let mut group = single_point(Vec3::new(1.0, 1.0, 1.0));
        let mut mesh = group.build_mesh();
        group.update(PointerState::default());
        group.write_positions(&mut mesh);

        let Some(bevy::render::mesh::VertexAttributeValues::Float32x3(values)) =
            mesh.attribute(Mesh::ATTRIBUTE_POSITION)
        else {
            panic!("position attribute missing");
        };
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], group.positions()[0].to_array());
    }
}
