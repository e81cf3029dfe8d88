use bevy::log::{Level, LogPlugin};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

mod config;
mod systems;

use config::BackdropConfig;
use systems::backdrop::{BackdropPlugin, mount};

fn main() -> bevy::app::AppExit {
    App::new()
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "Orbit Backdrop".into(),
                        ..default()
                    }),
                    ..default()
                })
                .set(LogPlugin {
                    filter: "info,wgpu=warn,naga=warn".into(),
                    level: Level::INFO,
                    ..default()
                }),
        )
        .insert_resource(BackdropConfig::from_env())
        .add_plugins(BackdropPlugin)
        .insert_resource(ClearColor(Color::srgb(0.0, 0.0, 0.0)))
        .add_systems(Startup, mount_on_primary)
        .run()
}

// the page shell mounts the backdrop once, behind everything else
fn mount_on_primary(
    mut commands: Commands,
    primary: Query<Entity, With<PrimaryWindow>>,
) {
    let Ok(host) = primary.single() else {
        error!("no primary window to host the backdrop");
        return;
    };

    commands.queue(move |world: &mut World| {
        if let Err(e) = mount(world, host) {
            error!("Failed to mount backdrop: {}", e);
        }
    });
}
