//! backdrop.rs
//!
//! Mount lifecycle for the animated background. A mount owns one root entity
//! (the scene graph), the observers listening to its host window, and every
//! asset it created. Nothing here is global, several mounts can live in one
//! world, each with its own pointer, viewport and frame loop.

use bevy::prelude::*;
use bevy::window::WindowCloseRequested;
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;

use crate::config::BackdropConfig;
use crate::systems::camera::{self, BackdropCameraPlugin, CameraRig};
use crate::systems::globe::{self, GlobePlugin};
use crate::systems::meteors::{self, MeteorPlugin};
use crate::systems::pointer::{
    PointerMoved, PointerPlugin, PointerState, ViewportResized, ViewportState,
};
use crate::systems::starfield::{self, StarfieldPlugin};

pub struct BackdropPlugin;

impl Plugin for BackdropPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<BackdropConfig>()
            .add_event::<WindowCloseRequested>()
            .add_event::<AppExit>()
            .configure_sets(Update, (
                BackdropSet::Schedule,
                BackdropSet::Simulate,
                BackdropSet::Present,
            ).chain())
            .add_plugins((
                PointerPlugin,
                BackdropCameraPlugin,
                GlobePlugin,
                StarfieldPlugin,
                MeteorPlugin,
            ))
            .add_systems(Update, rearm_frames.in_set(BackdropSet::Schedule))
            .add_systems(Last, unmount_on_close);
    }
}

/// Per-frame ordering: re-arm loops, step simulations, then write results
/// out to transforms and meshes.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackdropSet {
    Schedule,
    Simulate,
    Present,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackdropError {
    #[error("host entity {0:?} does not exist")]
    MissingHost(Entity),
    #[error("host entity {0:?} is not a window")]
    HostIsNotAWindow(Entity),
    #[error("render context unavailable: no {0} asset store")]
    RenderContextUnavailable(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Idle,
    Running,
    // stopped after a frame fault
    Halted,
    // stopped by unmount
    Cancelled,
}

/// Frame scheduling state for one mount. Re-armed once per host frame,
/// simulations only step while it is running.
#[derive(Debug, Clone, Default)]
pub struct FrameLoop {
    state: LoopState,
    frames: u64,
}

impl FrameLoop {
    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn start(&mut self) {
        if self.state == LoopState::Idle {
            self.state = LoopState::Running;
        }
    }

    fn rearm(&mut self) -> bool {
        if self.is_running() {
            self.frames += 1;
        }
        self.is_running()
    }

    fn halt(&mut self) {
        if self.state == LoopState::Running {
            self.state = LoopState::Halted;
        }
    }

    fn cancel(&mut self) {
        self.state = LoopState::Cancelled;
    }
}

/// Every asset a mount created, released exactly once on unmount
#[derive(Debug, Default)]
pub struct SceneAssets {
    meshes: Vec<Handle<Mesh>>,
    materials: Vec<Handle<StandardMaterial>>,
    images: Vec<Handle<Image>>,
}

impl SceneAssets {
    pub fn add_mesh(&mut self, world: &mut World, mesh: Mesh) -> Handle<Mesh> {
        let handle = world.resource_mut::<Assets<Mesh>>().add(mesh);
        self.meshes.push(handle.clone());
        handle
    }

    pub fn add_material(
        &mut self,
        world: &mut World,
        material: StandardMaterial,
    ) -> Handle<StandardMaterial> {
        let handle = world.resource_mut::<Assets<StandardMaterial>>().add(material);
        self.materials.push(handle.clone());
        handle
    }

    pub fn add_image(&mut self, world: &mut World, image: Image) -> Handle<Image> {
        let handle = world.resource_mut::<Assets<Image>>().add(image);
        self.images.push(handle.clone());
        handle
    }

    pub fn len(&self) -> usize {
        self.meshes.len() + self.materials.len() + self.images.len()
    }

    // returns how many assets were actually removed
    fn release(self, world: &mut World) -> usize {
        let mut released = 0;

        if let Some(mut meshes) = world.get_resource_mut::<Assets<Mesh>>() {
            for handle in &self.meshes {
                released += meshes.remove(handle).is_some() as usize;
            }
        }
        if let Some(mut materials) = world.get_resource_mut::<Assets<StandardMaterial>>() {
            for handle in &self.materials {
                released += materials.remove(handle).is_some() as usize;
            }
        }
        if let Some(mut images) = world.get_resource_mut::<Assets<Image>>() {
            for handle in &self.images {
                released += images.remove(handle).is_some() as usize;
            }
        }

        released
    }
}

/// Root of one mounted scene graph
#[derive(Component)]
#[require(Transform, Visibility)]
pub struct Backdrop {
    host: Entity,
    rig: CameraRig,
    listeners: Vec<Entity>,
    assets: Option<SceneAssets>,
    frames: FrameLoop,
    pointer: PointerState,
    viewport: ViewportState,
    rng: StdRng,
}

impl Backdrop {
    pub fn host(&self) -> Entity {
        self.host
    }

    pub fn camera(&self) -> Entity {
        self.rig.camera
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    pub fn frames(&self) -> &FrameLoop {
        &self.frames
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Stops the frame loop after a fault. The scene stays mounted until unmount.
    pub fn halt(&mut self) {
        if self.frames.is_running() {
            warn!("backdrop on {:?} halted after {} frames", self.host, self.frames.frames());
        }
        self.frames.halt();
    }

    fn on_pointer_moved(&mut self, event: &PointerMoved) {
        if event.window != self.host {
            return;
        }
        // whole-value replace, never a half-updated pointer
        if let Some(pointer) = self.viewport.normalize(event.position) {
            self.pointer = pointer;
        }
    }

    fn on_viewport_resized(&mut self, event: &ViewportResized) -> bool {
        if event.window != self.host || self.viewport == event.viewport {
            return false;
        }
        self.viewport = event.viewport;
        true
    }
}

fn host_viewport(world: &World, host: Entity) -> Result<ViewportState, BackdropError> {
    let entity = world
        .get_entity(host)
        .map_err(|_| BackdropError::MissingHost(host))?;
    let window = entity
        .get::<Window>()
        .ok_or(BackdropError::HostIsNotAWindow(host))?;

    Ok(ViewportState::from_window(window))
}

fn ensure_render_context(world: &World) -> Result<(), BackdropError> {
    if !world.contains_resource::<Assets<Mesh>>() {
        return Err(BackdropError::RenderContextUnavailable("mesh"));
    }
    if !world.contains_resource::<Assets<StandardMaterial>>() {
        return Err(BackdropError::RenderContextUnavailable("material"));
    }
    if !world.contains_resource::<Assets<Image>>() {
        return Err(BackdropError::RenderContextUnavailable("image"));
    }
    Ok(())
}

/// Mounts the backdrop into the `host` window.
///
/// In order: camera and lights, globe, star field, meteors, window listeners,
/// then the frame loop starts. Validation happens before anything is spawned,
/// so an error leaves the world untouched.
pub fn mount(world: &mut World, host: Entity) -> Result<Entity, BackdropError> {
    let viewport = host_viewport(world, host)?;
    ensure_render_context(world)?;

    let config = world
        .get_resource::<BackdropConfig>()
        .cloned()
        .unwrap_or_default();
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let root = world
        .spawn((Name::new("Backdrop"), Transform::default(), Visibility::default()))
        .id();
    let mut assets = SceneAssets::default();

    let rig = camera::spawn_rig(world, root, host, &viewport);
    globe::spawn(world, root, &mut assets);
    starfield::spawn(
        world,
        root,
        &mut assets,
        config.star_groups,
        config.stars_per_group,
        &mut rng,
    );
    meteors::spawn(world, root, &mut assets, config.meteor_count, &mut rng);
    let listeners = register_listeners(world, root);

    let mut frames = FrameLoop::default();
    frames.start();

    info!(
        "backdrop mounted on {host:?}: {}x{} @{}x, {} star groups, {} meteors, {} assets",
        viewport.width,
        viewport.height,
        viewport.pixel_density,
        config.star_groups,
        config.meteor_count,
        assets.len()
    );

    world.entity_mut(root).insert(Backdrop {
        host,
        rig,
        listeners,
        assets: Some(assets),
        frames,
        pointer: PointerState::default(),
        viewport,
        rng,
    });

    Ok(root)
}

// one observer per signal, scoped to this mount's root
fn register_listeners(world: &mut World, root: Entity) -> Vec<Entity> {
    let pointer = world
        .spawn(Observer::new(
            move |trigger: Trigger<PointerMoved>, mut backdrops: Query<&mut Backdrop>| {
                if let Ok(mut backdrop) = backdrops.get_mut(root) {
                    backdrop.on_pointer_moved(trigger.event());
                }
            },
        ))
        .id();

    let resize = world
        .spawn(Observer::new(
            move |trigger: Trigger<ViewportResized>,
                  mut backdrops: Query<&mut Backdrop>,
                  mut projections: Query<&mut Projection>| {
                let Ok(mut backdrop) = backdrops.get_mut(root) else {
                    return;
                };
                if !backdrop.on_viewport_resized(trigger.event()) {
                    return;
                }

                let viewport = backdrop.viewport();
                if let Ok(mut projection) = projections.get_mut(backdrop.camera()) {
                    camera::apply_viewport(projection.as_mut(), &viewport);
                }
                debug!(
                    "backdrop {root:?} resized to {}x{}, surface {}",
                    viewport.width,
                    viewport.height,
                    viewport.surface_size()
                );
            },
        ))
        .id();

    vec![pointer, resize]
}

// tolerant of listeners that were never added or are already gone
fn remove_listener(world: &mut World, listener: Entity) {
    match world.get_entity_mut(listener) {
        Ok(observer) => observer.despawn(),
        Err(_) => debug!("listener {listener:?} already removed"),
    }
}

/// Tears down a mount: stops its frames, removes its listeners, detaches the
/// camera from the host and releases the scene graph and its assets.
///
/// Returns `false` when `root` is not a live mount, so calling it twice is harmless.
pub fn unmount(world: &mut World, root: Entity) -> bool {
    let backdrop = world
        .get_entity_mut(root)
        .ok()
        .and_then(|mut entity| entity.take::<Backdrop>());
    let Some(mut backdrop) = backdrop else {
        debug!("backdrop {root:?} is not mounted, nothing to tear down");
        return false;
    };

    backdrop.frames.cancel();

    for listener in backdrop.listeners.drain(..) {
        remove_listener(world, listener);
    }

    camera::detach_surface(world, &backdrop.rig);

    camera::release_lights(world, &backdrop.rig);
    if let Ok(entity) = world.get_entity_mut(root) {
        entity.despawn();
    }
    let released = backdrop
        .assets
        .take()
        .map(|assets| assets.release(world))
        .unwrap_or_default();

    // ambient light is shared by every mount in the world
    let mut remaining = world.query::<&Backdrop>();
    if remaining.iter(world).next().is_none() {
        world.remove_resource::<AmbientLight>();
    }

    info!(
        "backdrop unmounted from {:?} after {} frames, released {released} assets",
        backdrop.host,
        backdrop.frames.frames()
    );
    true
}

fn rearm_frames(mut backdrops: Query<&mut Backdrop>) {
    for mut backdrop in backdrops.iter_mut() {
        backdrop.frames.rearm();
    }
}

// tear down before the host window goes away or the app exits
fn unmount_on_close(
    mut commands: Commands,
    mut close_requests: EventReader<WindowCloseRequested>,
    mut exits: EventReader<AppExit>,
    backdrops: Query<(Entity, &Backdrop)>,
) {
    let exiting = exits.read().count() > 0;
    let closing: Vec<Entity> = close_requests.read().map(|request| request.window).collect();
    if !exiting && closing.is_empty() {
        return;
    }

    for (root, backdrop) in backdrops.iter() {
        if exiting || closing.contains(&backdrop.host) {
            commands.queue(move |world: &mut World| {
                unmount(world, root);
            });
        }
    }
}
