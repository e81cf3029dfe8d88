use bevy::prelude::*;

pub mod materials;

use materials::{glow_material, surface_material, surface_texture};
use crate::config::{
    GLOBE_BASE_YAW_RATE, GLOBE_POINTER_PITCH_GAIN, GLOBE_POINTER_YAW_GAIN, GLOBE_RADIUS,
    GLOBE_SEGMENTS, GLOW_RADIUS,
};
use crate::systems::backdrop::{Backdrop, BackdropSet, SceneAssets};
use crate::systems::pointer::PointerState;

pub struct GlobePlugin;

impl Plugin for GlobePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (
            rotate.in_set(BackdropSet::Simulate),
            sync_transforms.in_set(BackdropSet::Present),
        ));
    }
}

/// The textured sphere at the centre of the scene.
/// Rotation is accumulated every frame, never reset.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Globe {
    pub yaw: f32,
    pub pitch: f32,
    pub radius: f32,
}

impl Default for Globe {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            radius: GLOBE_RADIUS,
        }
    }
}

impl Globe {
    // constant spin plus a small pointer-driven nudge
    pub fn update(&mut self, pointer: PointerState) {
        self.yaw += GLOBE_BASE_YAW_RATE + pointer.x * GLOBE_POINTER_YAW_GAIN;
        self.pitch += pointer.y * GLOBE_POINTER_PITCH_GAIN;
    }

    // pitch about x first, then yaw about y
    pub fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.pitch, self.yaw, 0.0)
    }
}

// lit overlay shell, inherits the globe's orientation
#[derive(Component)]
pub struct GlowShell;

/// Builds the globe and its glow shell under `root`
pub fn spawn(world: &mut World, root: Entity, assets: &mut SceneAssets) -> Entity {
    let globe = Globe::default();

    let texture = assets.add_image(world, surface_texture());
    let surface = assets.add_material(world, surface_material(texture));
    let glow = assets.add_material(world, glow_material());
    let globe_mesh = assets.add_mesh(
        world,
        Sphere::new(globe.radius).mesh().uv(GLOBE_SEGMENTS, GLOBE_SEGMENTS),
    );
    let glow_mesh = assets.add_mesh(
        world,
        Sphere::new(GLOW_RADIUS).mesh().uv(GLOBE_SEGMENTS, GLOBE_SEGMENTS),
    );

    let transform = Transform::from_rotation(globe.orientation());
    let entity = world
        .spawn((
            globe,
            Mesh3d(globe_mesh),
            MeshMaterial3d(surface),
            transform,
            ChildOf(root),
        ))
        .id();

    world.spawn((
        GlowShell,
        Mesh3d(glow_mesh),
        MeshMaterial3d(glow),
        Transform::default(),
        ChildOf(entity),
    ));

    entity
}

fn rotate(
    backdrops: Query<&Backdrop>,
    mut globes: Query<(&mut Globe, &ChildOf)>,
) {
    for (mut globe, child_of) in globes.iter_mut() {
        let Ok(backdrop) = backdrops.get(child_of.parent()) else {
            continue;
        };
        if backdrop.frames().is_running() {
            globe.update(backdrop.pointer());
        }
    }
}

fn sync_transforms(mut globes: Query<(&Globe, &mut Transform), Changed<Globe>>) {
    for (globe, mut transform) in globes.iter_mut() {
        transform.rotation = globe.orientation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_pointer_only_applies_base_rate() {
        let mut globe = Globe::default();
        for _ in 0..60 {
            globe.update(PointerState::default());
        }
        assert!((globe.yaw - 60.0 * 0.001).abs() < 1e-5);
        assert_eq!(globe.pitch, 0.0);
    }

    #[test]
    fn test_single_step_stays_within_envelope() {
        let corners = [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0), (0.0, 0.0)];

        for (x, y) in corners {
            let mut globe = Globe::default();
            globe.update(PointerState::new(x, y));

            let yaw_low = GLOBE_BASE_YAW_RATE - GLOBE_POINTER_YAW_GAIN;
            let yaw_high = GLOBE_BASE_YAW_RATE + GLOBE_POINTER_YAW_GAIN;
            assert!(
                globe.yaw >= yaw_low - 1e-7 && globe.yaw <= yaw_high + 1e-7,
                "yaw step {} out of range for pointer ({x}, {y})",
                globe.yaw
            );
            assert!(
                globe.pitch.abs() <= GLOBE_POINTER_PITCH_GAIN + 1e-7,
                "pitch step {} out of range for pointer ({x}, {y})",
                globe.pitch
            );
        }
    }

    #[test]
    fn test_pointer_right_spins_faster() {
        let mut idle = Globe::default();
        let mut pushed = Globe::default();
        idle.update(PointerState::default());
        pushed.update(PointerState::new(1.0, 0.0));
        assert!(pushed.yaw > idle.yaw);
    }

    #[test]
    fn test_orientation_matches_angles() {
        let globe = Globe {
            yaw: 0.5,
            ..default()
        };
        let expected = Quat::from_rotation_y(0.5);
        assert!(globe.orientation().abs_diff_eq(expected, 1e-6));
    }
}
