use bevy::prelude::*;

// Camera
pub const CAMERA_FOV_DEGREES: f32 = 60.0;
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 1000.0;
pub const CAMERA_DISTANCE: f32 = 5.0;
pub const MAX_PIXEL_DENSITY: f32 = 2.0;

// Lighting
pub const AMBIENT_LIGHT_HEX: u8 = 0x40;
pub const AMBIENT_LIGHT_BRIGHTNESS: f32 = 80.0;
pub const KEY_LIGHT_ILLUMINANCE: f32 = 1_500.0;
pub const KEY_LIGHT_POSITION: Vec3 = Vec3::new(5.0, 3.0, 5.0);

// Globe
pub const GLOBE_RADIUS: f32 = 1.5;
pub const GLOW_RADIUS: f32 = 1.51;
pub const GLOBE_SEGMENTS: u32 = 64;
pub const GLOW_OPACITY: f32 = 0.3;
pub const GLOBE_TEXTURE_SIZE: u32 = 512;

// Rotation speeds, radians per frame
pub const GLOBE_BASE_YAW_RATE: f32 = 0.001;
pub const GLOBE_POINTER_YAW_GAIN: f32 = 0.001;
pub const GLOBE_POINTER_PITCH_GAIN: f32 = 0.0005;
pub const STAR_YAW_RATE: f32 = 0.0001;
pub const STAR_PITCH_RATE: f32 = 0.00005;

// Star field
pub const STAR_GROUPS: usize = 3;
pub const STARS_PER_GROUP: usize = 800;
pub const STAR_VOLUME: f32 = 50.0;
pub const STAR_SIZE_MIN: f32 = 0.5;
pub const STAR_SIZE_MAX: f32 = 2.5;
pub const STAR_OPACITY: f32 = 0.8;
pub const STAR_REPEL_RADIUS: f32 = 5.0;
pub const STAR_REPEL_FORCE: f32 = 0.01;

// Meteors
pub const METEOR_COUNT: usize = 8;
pub const METEOR_RADIUS: f32 = 0.05;
pub const METEOR_OPACITY: f32 = 0.9;
pub const METEOR_SPAWN_VOLUME: f32 = 20.0;
pub const METEOR_MAX_SPEED: f32 = 0.01;
pub const METEOR_BOUNDARY: f32 = 25.0;
pub const METEOR_ATTRACT_RADIUS: f32 = 8.0;
pub const METEOR_ATTRACT_FORCE: f32 = 0.002;

// pointer [-1, 1] to world units on the xy plane
pub const POINTER_WORLD_SCALE: f32 = 10.0;

/// Per-mount knobs. Defaults come from the constants above.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct BackdropConfig {
    pub star_groups: usize,
    pub stars_per_group: usize,
    pub meteor_count: usize,
    /// fixed seed for reproducible scenes, random otherwise
    pub seed: Option<u64>,
}

impl Default for BackdropConfig {
    fn default() -> Self {
        Self {
            star_groups: STAR_GROUPS,
            stars_per_group: STARS_PER_GROUP,
            meteor_count: METEOR_COUNT,
            seed: None,
        }
    }
}

impl BackdropConfig {
    // BACKDROP_SEED pins the scene layout, handy for screenshots
    pub fn from_env() -> Self {
        let seed = std::env::var("BACKDROP_SEED")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok());

        Self {
            seed,
            ..default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
