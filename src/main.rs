//! Application entry point: composes the Bevy runtime, core plugins, and window configuration.
//!
//! The game itself lives in the `LaserTurtlePlugin` defined in `app.rs`; this file only
//! wires up the engine-level singletons (window, asset server, render backend).

mod app;
mod audio;
mod camera;
mod collision;
mod enemy;
mod level;
mod movement;
mod player;
mod state;
mod ui;
mod weapon;

#[cfg(all(target_arch = "wasm32", feature = "web"))]
mod wasm;

use app::LaserTurtlePlugin;
use bevy::asset::AssetPlugin;
use bevy::prelude::*;
use bevy::render::texture::ImagePlugin;
use bevy::window::{Window, WindowResolution};

fn main() {
    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    wasm::set_panic_hook();

    // Fixed 640x480 canvas, matching the sprite art. The world is wider (1900px) and the
    // camera scrolls across it; the window itself never resizes.
    let primary_window = Window {
        title: "Laser Turtle".to_string(),
        resolution: WindowResolution::new(640.0, 480.0),
        resizable: false,
        canvas: cfg!(all(target_arch = "wasm32", feature = "web"))
            .then(|| "#bevy-canvas".to_owned()),
        ..default()
    };

    // `DefaultPlugins` spins up rendering, input, audio, etc. Nearest-neighbor sampling keeps
    // the pixel art crisp; asset settings differ between desktop and web builds.
    let mut default_plugins = DefaultPlugins
        .set(WindowPlugin {
            primary_window: Some(primary_window),
            ..default()
        })
        .set(ImagePlugin::default_nearest());

    #[cfg(not(target_arch = "wasm32"))]
    {
        default_plugins = default_plugins.set(AssetPlugin {
            file_path: "assets".to_owned(),
            watch_for_changes_override: Some(true),
            ..default()
        });
    }

    #[cfg(all(target_arch = "wasm32", feature = "web"))]
    {
        default_plugins = default_plugins.set(AssetPlugin {
            file_path: "assets".to_owned(),
            watch_for_changes_override: Some(false),
            ..default()
        });
    }

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.36, 0.58, 0.85)))
        .add_plugins(default_plugins)
        .add_plugins(LaserTurtlePlugin)
        .run();
}
