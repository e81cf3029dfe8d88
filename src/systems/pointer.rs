//! pointer.rs
//!
//! Pointer and viewport state shared by the backdrop simulations, plus the
//! bridge that turns raw window events into backdrop triggers

use bevy::prelude::*;
use bevy::window::WindowResized;

use crate::config::MAX_PIXEL_DENSITY;

pub struct PointerPlugin;

impl Plugin for PointerPlugin {
    fn build(&self, app: &mut App) {
        // WindowPlugin registers these too, adding them again is a no-op
        app.add_event::<CursorMoved>()
            .add_event::<WindowResized>()
            .add_systems(PreUpdate, forward_window_events);
    }
}

/// Last known cursor position, normalized to [-1, 1] around the viewport centre.
/// +y points up.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
}

impl PointerState {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: x.clamp(-1.0, 1.0),
            y: y.clamp(-1.0, 1.0),
        }
    }

    // pointer projected onto the world xy plane
    pub fn world_xy(&self, scale: f32) -> Vec2 {
        Vec2::new(self.x * scale, self.y * scale)
    }
}

/// Logical viewport size and (capped) device pixel density
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub width: f32,
    pub height: f32,
    pub pixel_density: f32,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            pixel_density: 1.0,
        }
    }
}

impl ViewportState {
    pub fn new(width: f32, height: f32, scale_factor: f32) -> Self {
        Self {
            width,
            height,
            pixel_density: scale_factor.min(MAX_PIXEL_DENSITY),
        }
    }

    pub fn from_window(window: &Window) -> Self {
        Self::new(window.width(), window.height(), window.scale_factor())
    }

    // minimized windows report 0 height
    pub fn aspect_ratio(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// Physical size of the render surface
    pub fn surface_size(&self) -> UVec2 {
        UVec2::new(
            (self.width * self.pixel_density).round() as u32,
            (self.height * self.pixel_density).round() as u32,
        )
    }

    /// Converts a cursor position in logical pixels (origin top-left) into
    /// pointer space. Returns `None` for a degenerate viewport.
    pub fn normalize(&self, position: Vec2) -> Option<PointerState> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }

        let x = (position.x / self.width) * 2.0 - 1.0;
        let y = -(position.y / self.height) * 2.0 + 1.0;
        Some(PointerState::new(x, y))
    }
}

/// Cursor moved inside a host window
#[derive(Event, Debug, Clone, Copy)]
pub struct PointerMoved {
    pub window: Entity,
    pub position: Vec2,
}

/// Host window changed size or density
#[derive(Event, Debug, Clone, Copy)]
pub struct ViewportResized {
    pub window: Entity,
    pub viewport: ViewportState,
}

// re-emit window events as triggers so each mount can listen with its own observers
fn forward_window_events(
    mut commands: Commands,
    mut cursor_events: EventReader<CursorMoved>,
    mut resize_events: EventReader<WindowResized>,
    windows: Query<&Window>,
) {
    // resizes first, cursor positions in the same frame are relative to the new size
    for event in resize_events.read() {
        let scale_factor = windows
            .get(event.window)
            .map(|window| window.scale_factor())
            .unwrap_or(1.0);

        commands.trigger(ViewportResized {
            window: event.window,
            viewport: ViewportState::new(event.width, event.height, scale_factor),
        });
    }

    for event in cursor_events.read() {
        commands.trigger(PointerMoved {
            window: event.window,
            position: event.position,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_defaults_to_centre() {
        assert_eq!(PointerState::default(), PointerState { x: 0.0, y: 0.0 });
    }

    #[test]
    fn test_pointer_is_clamped() {
        let pointer = PointerState::new(3.0, -7.5);
        assert_eq!(pointer, PointerState { x: 1.0, y: -1.0 });
    }

    #[test]
    fn test_normalize_corners_and_centre() {
        let viewport = ViewportState::new(1024.0, 768.0, 1.0);

        let top_left = viewport.normalize(Vec2::ZERO).unwrap();
        assert_eq!(top_left, PointerState { x: -1.0, y: 1.0 });

        let bottom_right = viewport.normalize(Vec2::new(1024.0, 768.0)).unwrap();
        assert_eq!(bottom_right, PointerState { x: 1.0, y: -1.0 });

        let centre = viewport.normalize(Vec2::new(512.0, 384.0)).unwrap();
        assert!(centre.x.abs() < 1e-6 && centre.y.abs() < 1e-6);
    }

    #[test]
    fn test_normalize_outside_window_stays_in_range() {
        let viewport = ViewportState::new(800.0, 600.0, 1.0);
        let pointer = viewport.normalize(Vec2::new(-400.0, 1800.0)).unwrap();
        assert_eq!(pointer, PointerState { x: -1.0, y: -1.0 });
    }

    #[test]
    fn test_normalize_rejects_empty_viewport() {
        let viewport = ViewportState::new(0.0, 0.0, 1.0);
        assert!(viewport.normalize(Vec2::new(10.0, 10.0)).is_none());
        assert_eq!(viewport.aspect_ratio(), 1.0);
    }

    #[test]
    fn test_pixel_density_is_capped() {
        let viewport = ViewportState::new(1000.0, 500.0, 3.0);
        assert_eq!(viewport.pixel_density, 2.0);
        assert_eq!(viewport.surface_size(), UVec2::new(2000, 1000));
    }

    #[test]
    fn test_low_density_is_kept() {
        let viewport = ViewportState::new(1000.0, 500.0, 0.5);
        assert_eq!(viewport.pixel_density, 0.5);
        assert_eq!(viewport.surface_size(), UVec2::new(500, 250));
    }
}
