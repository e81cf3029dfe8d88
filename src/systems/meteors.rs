use bevy::prelude::*;
use rand::Rng;

use crate::config::{
    METEOR_ATTRACT_FORCE, METEOR_ATTRACT_RADIUS, METEOR_BOUNDARY, METEOR_MAX_SPEED,
    METEOR_OPACITY, METEOR_RADIUS, METEOR_SPAWN_VOLUME, POINTER_WORLD_SCALE,
};
use crate::systems::backdrop::{Backdrop, BackdropSet, SceneAssets};
use crate::systems::pointer::PointerState;

pub struct MeteorPlugin;

impl Plugin for MeteorPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (
            fly.in_set(BackdropSet::Simulate),
            sync_transforms.in_set(BackdropSet::Present),
        ));
    }
}

/// A small body drifting at constant velocity.
/// Velocity is fixed for the meteor's lifetime, a respawn only moves it.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Meteor {
    pub position: Vec3,
    velocity: Vec3,
}

impl Meteor {
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self { position, velocity }
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        let velocity = Vec3::new(
            rng.random_range(-METEOR_MAX_SPEED..METEOR_MAX_SPEED),
            rng.random_range(-METEOR_MAX_SPEED..METEOR_MAX_SPEED),
            rng.random_range(-METEOR_MAX_SPEED..METEOR_MAX_SPEED),
        );
        Self::new(spawn_point(rng), velocity)
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn is_out_of_bounds(&self) -> bool {
        self.position.abs().max_element() > METEOR_BOUNDARY
    }

    /// Advances one frame. Returns true if the meteor left the scene and was respawned.
    pub fn update(&mut self, pointer: PointerState, rng: &mut impl Rng) -> bool {
        self.position += self.velocity;

        // pulled toward the pointer on the xy plane
        let target = pointer.world_xy(POINTER_WORLD_SCALE);
        let offset = self.position.truncate() - target;
        let distance = offset.length();
        if distance < METEOR_ATTRACT_RADIUS {
            let force = (METEOR_ATTRACT_RADIUS - distance) * METEOR_ATTRACT_FORCE;
            self.position.x -= offset.x * force;
            self.position.y -= offset.y * force;
        }

        if self.is_out_of_bounds() {
            self.position = spawn_point(rng);
            return true;
        }

        false
    }
}

// uniform inside the spawn cube
fn spawn_point(rng: &mut impl Rng) -> Vec3 {
    let half = METEOR_SPAWN_VOLUME / 2.0;
    Vec3::new(
        rng.random_range(-half..half),
        rng.random_range(-half..half),
        rng.random_range(-half..half),
    )
}

/// Spawns `count` meteors under `root`, sharing one mesh and material
pub fn spawn(
    world: &mut World,
    root: Entity,
    assets: &mut SceneAssets,
    count: usize,
    rng: &mut impl Rng,
) -> Vec<Entity> {
    let mesh = assets.add_mesh(world, Sphere::new(METEOR_RADIUS).mesh().uv(8, 8));
    let material = assets.add_material(world, StandardMaterial {
        base_color: Color::srgba(1.0, 1.0, 0xaa as f32 / 255.0, METEOR_OPACITY),
        alpha_mode: AlphaMode::Blend,
        unlit: true,
        ..default()
    });

    (0..count)
        .map(|_| {
            let meteor = Meteor::random(rng);
            let transform = Transform::from_translation(meteor.position);

            world
                .spawn((
                    meteor,
                    Mesh3d(mesh.clone()),
                    MeshMaterial3d(material.clone()),
                    transform,
                    ChildOf(root),
                ))
                .id()
        })
        .collect()
}

fn fly(
    mut backdrops: Query<&mut Backdrop>,
    mut meteors: Query<(&mut Meteor, &ChildOf)>,
) {
    for (mut meteor, child_of) in meteors.iter_mut() {
        let Ok(mut backdrop) = backdrops.get_mut(child_of.parent()) else {
            continue;
        };
        if !backdrop.frames().is_running() {
            continue;
        }

        let pointer = backdrop.pointer();
        if meteor.update(pointer, backdrop.rng()) {
            trace!("meteor respawned at {}", meteor.position);
        }
    }
}

fn sync_transforms(mut meteors: Query<(&Meteor, &mut Transform), Changed<Meteor>>) {
    for (meteor, mut transform) in meteors.iter_mut() {
        transform.translation = meteor.position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_meteor_starts_in_spawn_volume() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let meteor = Meteor::random(&mut rng);
            assert!(meteor.position.abs().max_element() <= METEOR_SPAWN_VOLUME / 2.0);
            assert!(meteor.velocity().abs().max_element() <= METEOR_MAX_SPEED);
        }
    }

    #[test]
    fn test_constant_velocity_away_from_pointer() {
        let mut rng = StdRng::seed_from_u64(2);
        // well outside the attraction radius of a centred pointer
        let mut meteor = Meteor::new(Vec3::new(15.0, 15.0, 0.0), Vec3::new(0.01, -0.01, 0.005));

        for _ in 0..10 {
            meteor.update(PointerState::default(), &mut rng);
        }

        let expected = Vec3::new(15.1, 14.9, 0.05);
        assert!(meteor.position.abs_diff_eq(expected, 1e-4), "got {}", meteor.position);
    }

    #[test]
    fn test_pointer_attracts_nearby_meteor() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut meteor = Meteor::new(Vec3::new(2.0, 0.0, 1.0), Vec3::ZERO);
        meteor.update(PointerState::default(), &mut rng);

        // distance 2 -> force (8 - 2) * 0.002 = 0.012, pulled toward origin
        assert!((meteor.position.x - (2.0 - 2.0 * 0.012)).abs() < 1e-6);
        assert_eq!(meteor.position.y, 0.0);
        assert_eq!(meteor.position.z, 1.0);
    }

    #[test]
    fn test_out_of_bounds_meteor_respawns_with_same_velocity() {
        let mut rng = StdRng::seed_from_u64(4);
        let velocity = Vec3::new(0.013, -0.002, 0.0071);
        let mut meteor = Meteor::new(Vec3::new(30.0, 0.0, 0.0), velocity);

        assert!(meteor.update(PointerState::default(), &mut rng));

        assert!(meteor.position.abs().max_element() < 20.0);
        assert_eq!(meteor.velocity().to_array(), velocity.to_array());
        assert_eq!(meteor.velocity().x.to_bits(), velocity.x.to_bits());
    }

    #[test]
    fn test_meteors_never_stay_outside_boundary() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut meteors: Vec<Meteor> = (0..8)
            .map(|_| {
                // fast enough to cross the boundary many times
                let mut meteor = Meteor::random(&mut rng);
                meteor.velocity *= 40.0;
                meteor
            })
            .collect();
        let velocities: Vec<Vec3> = meteors.iter().map(Meteor::velocity).collect();

        for step in 0..2_000 {
            let t = step as f32 * 0.01;
            let pointer = PointerState::new(t.cos(), t.sin());
            for meteor in meteors.iter_mut() {
                meteor.update(pointer, &mut rng);
                assert!(
                    !meteor.is_out_of_bounds(),
                    "meteor at {} after step {step}",
                    meteor.position
                );
            }
        }

        for (meteor, velocity) in meteors.iter().zip(velocities) {
            assert_eq!(meteor.velocity(), velocity);
        }
    }
}
