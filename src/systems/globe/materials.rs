use bevy::prelude::*;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use image::{Rgba, RgbaImage};

use crate::config::{GLOBE_TEXTURE_SIZE, GLOW_OPACITY};

// ocean gradient stops, top-left to bottom-right
const GRADIENT_STOPS: [(f32, [u8; 3]); 3] = [
    (0.0, [0x1e, 0x3a, 0x8a]),
    (0.5, [0x2d, 0x5d, 0xaf]),
    (1.0, [0x1a, 0x33, 0x7e]),
];

/// Diagonal three-stop gradient used as the globe's surface texture
pub fn surface_gradient(size: u32) -> RgbaImage {
    let span = (2 * size.saturating_sub(1)).max(1) as f32;

    RgbaImage::from_fn(size, size, |x, y| {
        let t = (x + y) as f32 / span;
        let [r, g, b] = sample_gradient(t);
        Rgba([r, g, b, 255])
    })
}

fn sample_gradient(t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);

    for pair in GRADIENT_STOPS.windows(2) {
        let (start, from) = pair[0];
        let (end, to) = pair[1];
        if t <= end {
            let local = (t - start) / (end - start);
            return [
                lerp_channel(from[0], to[0], local),
                lerp_channel(from[1], to[1], local),
                lerp_channel(from[2], to[2], local),
            ];
        }
    }

    GRADIENT_STOPS[GRADIENT_STOPS.len() - 1].1
}

fn lerp_channel(from: u8, to: u8, t: f32) -> u8 {
    (from as f32 + (to as f32 - from as f32) * t).round() as u8
}

// wrap the generated gradient as a gpu texture
pub fn surface_texture() -> Image {
    let gradient = surface_gradient(GLOBE_TEXTURE_SIZE);
    let (width, height) = gradient.dimensions();

    Image::new(
        Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        gradient.into_raw(),
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::RENDER_WORLD,
    )
}

// low gloss, faint grey specular
pub fn surface_material(texture: Handle<Image>) -> StandardMaterial {
    StandardMaterial {
        base_color_texture: Some(texture),
        metallic: 0.0,
        perceptual_roughness: 0.8,
        reflectance: 0.2,
        ..default()
    }
}

// additive warm shell for the city lights look
pub fn glow_material() -> StandardMaterial {
    StandardMaterial {
        base_color: Color::srgba(1.0, 1.0, 0x88 as f32 / 255.0, GLOW_OPACITY),
        alpha_mode: AlphaMode::Add,
        unlit: true,
        ..default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_endpoints() {
        let gradient = surface_gradient(512);
        assert_eq!(gradient.dimensions(), (512, 512));
        assert_eq!(gradient.get_pixel(0, 0).0, [0x1e, 0x3a, 0x8a, 255]);
        assert_eq!(gradient.get_pixel(511, 511).0, [0x1a, 0x33, 0x7e, 255]);
    }

    #[test]
    fn test_gradient_midpoint_hits_middle_stop() {
        assert_eq!(sample_gradient(0.5), [0x2d, 0x5d, 0xaf]);
    }

    #[test]
    fn test_single_pixel_gradient() {
        let gradient = surface_gradient(1);
        assert_eq!(gradient.get_pixel(0, 0).0, [0x1e, 0x3a, 0x8a, 255]);
    }

    #[test]
    fn test_surface_texture_size() {
        let texture = surface_texture();
        assert_eq!(texture.width(), GLOBE_TEXTURE_SIZE);
        assert_eq!(texture.height(), GLOBE_TEXTURE_SIZE);
    }

    #[test]
    fn test_glow_is_additive() {
        let material = glow_material();
        assert!(matches!(material.alpha_mode, AlphaMode::Add));
        assert!(material.unlit);
    }
}
