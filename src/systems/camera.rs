use bevy::prelude::*;
use bevy::render::camera::RenderTarget;
use bevy::window::WindowRef;

use crate::config::{
    AMBIENT_LIGHT_BRIGHTNESS, AMBIENT_LIGHT_HEX, CAMERA_DISTANCE, CAMERA_FAR, CAMERA_FOV_DEGREES,
    CAMERA_NEAR, KEY_LIGHT_ILLUMINANCE, KEY_LIGHT_POSITION,
};
use crate::systems::backdrop::{Backdrop, BackdropSet};
use crate::systems::pointer::ViewportState;

pub struct BackdropCameraPlugin;

impl Plugin for BackdropCameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, sync_activity.in_set(BackdropSet::Present));
    }
}

// camera tag
#[derive(Component)]
pub struct BackdropCamera;

// directional light tag
#[derive(Component)]
pub struct KeyLight;

/// Entities making up the render side of one mount
#[derive(Debug, Clone, Copy)]
pub struct CameraRig {
    pub camera: Entity,
    pub key_light: Entity,
}

pub fn perspective(viewport: &ViewportState) -> PerspectiveProjection {
    PerspectiveProjection {
        fov: CAMERA_FOV_DEGREES.to_radians(),
        aspect_ratio: viewport.aspect_ratio(),
        near: CAMERA_NEAR,
        far: CAMERA_FAR,
        ..default()
    }
}

pub fn ambient_light() -> AmbientLight {
    AmbientLight {
        color: Color::srgb_u8(AMBIENT_LIGHT_HEX, AMBIENT_LIGHT_HEX, AMBIENT_LIGHT_HEX),
        brightness: AMBIENT_LIGHT_BRIGHTNESS,
        ..default()
    }
}

/// Spawns the camera (rendering into `host`) and the key light under `root`,
/// and installs the ambient light.
pub fn spawn_rig(
    world: &mut World,
    root: Entity,
    host: Entity,
    viewport: &ViewportState,
) -> CameraRig {
    // camera sits on +z looking back at the globe
    let camera = world
        .spawn((
            BackdropCamera,
            Camera3d::default(),
            Camera {
                target: RenderTarget::Window(WindowRef::Entity(host)),
                ..default()
            },
            Projection::Perspective(perspective(viewport)),
            Transform::from_xyz(0.0, 0.0, CAMERA_DISTANCE).looking_at(Vec3::ZERO, Vec3::Y),
            ChildOf(root),
        ))
        .id();

    let key_light = world
        .spawn((
            KeyLight,
            DirectionalLight {
                illuminance: KEY_LIGHT_ILLUMINANCE,
                ..default()
            },
            Transform::from_translation(KEY_LIGHT_POSITION).looking_at(Vec3::ZERO, Vec3::Y),
            ChildOf(root),
        ))
        .id();

    world.insert_resource(ambient_light());

    CameraRig { camera, key_light }
}

/// Recomputes the aspect ratio. Returns whether anything changed, so a
/// repeated resize to the same size is a no-op.
pub fn apply_viewport(projection: &mut Projection, viewport: &ViewportState) -> bool {
    let Projection::Perspective(perspective) = projection else {
        return false;
    };

    let aspect_ratio = viewport.aspect_ratio();
    if perspective.aspect_ratio == aspect_ratio {
        return false;
    }

    perspective.aspect_ratio = aspect_ratio;
    true
}

// stops rendering into the host window
pub fn detach_surface(world: &mut World, rig: &CameraRig) {
    match world.get_entity_mut(rig.camera) {
        Ok(camera) => camera.despawn(),
        Err(_) => debug!("backdrop camera {:?} already gone", rig.camera),
    }
}

// light entities are released together with the rest of the scene graph,
// this only covers the case where the rig outlived its root
pub fn release_lights(world: &mut World, rig: &CameraRig) {
    if let Ok(light) = world.get_entity_mut(rig.key_light) {
        light.despawn();
    }
}

// render only while the owning frame loop runs
fn sync_activity(
    backdrops: Query<&Backdrop>,
    mut cameras: Query<(&mut Camera, &ChildOf), With<BackdropCamera>>,
) {
    for (mut camera, child_of) in cameras.iter_mut() {
        let Ok(backdrop) = backdrops.get(child_of.parent()) else {
            continue;
        };

        let running = backdrop.frames().is_running();
        if camera.is_active != running {
            camera.is_active = running;
        }
    }
}
