//! High-level plugin composition.
//!
//! The `LaserTurtlePlugin` glues together all domain-specific plugins (level, player,
//! enemies, weapon, audio, camera, HUD) and sets up system ordering. Each subsystem is
//! responsible for its own state; this orchestrator merely registers them with the
//! Bevy application.

use bevy::prelude::*;

use crate::audio::GameAudioPlugin;
use crate::camera::{CameraPlugin, FollowCamera};
use crate::collision::CollisionPlugin;
use crate::enemy::EnemyPlugin;
use crate::level::LevelPlugin;
use crate::movement::MovementPlugin;
use crate::player::PlayerPlugin;
use crate::state::{toggle_pause, GameSet, GameState};
use crate::ui::UiPlugin;
use crate::weapon::WeaponPlugin;

/// Bundles every gameplay-centric plugin into a single unit that can be added to the
/// Bevy `App`.
pub struct LaserTurtlePlugin;

impl Plugin for LaserTurtlePlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<GameState>()
            .add_plugins((
                LevelPlugin,     // Manifest + CSV tile grid loading.
                PlayerPlugin,    // Turtle spawning and animation.
                EnemyPlugin,     // Rabbit wave, oscillation, damage intake.
                WeaponPlugin,    // Laser pool, cooldown, overlap pass.
                GameAudioPlugin, // Audio handle preloading.
                CameraPlugin,    // Camera follow behaviour.
                CollisionPlugin, // Tile-based collision map.
                MovementPlugin,  // Input + kinematic updates.
                UiPlugin,        // Pause overlay + rabbit counter.
            ))
            // One frame runs Input -> Movement -> Combat -> Effects in order, mirroring the
            // per-tick dispatch of the scene: poll keys, move actors, fire/advance/damage,
            // then animation and camera bookkeeping.
            .configure_sets(
                Update,
                (
                    GameSet::Input,
                    GameSet::Movement,
                    GameSet::Combat,
                    GameSet::Effects,
                )
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(Startup, setup_camera)
            .add_systems(Update, toggle_pause);
    }
}

/// Spawns the initial 2D camera tagged with `FollowCamera` so the follow system can
/// locate it.
fn setup_camera(mut commands: Commands) {
    commands.spawn((
        Name::new("MainCamera"),
        Camera2dBundle::default(),
        FollowCamera,
    ));
}
