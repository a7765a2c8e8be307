//! Player (turtle) lifecycle and animation. Handles spawning the avatar with the full
//! actor component set and picking the right two-frame clip each frame.
//!
//! The 68x68 spritesheet lays out nine frames: walk-left [0,1], climb-left [3,2],
//! neutral 4, climb-right [5,6], walk-right [8,7].

use bevy::prelude::*;

use crate::level::{LevelAssets, WorldBounds};
use crate::movement::{Collider, Facing, FlightBand, GravityScale, Health, JumpState, Velocity};
use crate::state::{GameSet, GameState};

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(GameState::Playing),
            spawn_player.run_if(player_missing),
        )
        .add_systems(OnEnter(GameState::Loading), despawn_player)
            .add_systems(
                Update,
                animate_player
                    .in_set(GameSet::Effects)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

/// Marker component used by many systems (camera follow, input, kinematics) to identify
/// the player entity.
#[derive(Component)]
pub struct Player;

#[derive(Component, Deref, DerefMut)]
pub struct AnimationTimer(pub Timer);

const FRAME_SIZE: u32 = 68;
const FRAME_COLUMNS: u32 = 9;
const NEUTRAL_FRAME: usize = 4;
const CLIP_FPS: f32 = 10.0;
const STARTING_HEALTH: i32 = 100;
/// The turtle hovers this far above ground level when at rest.
const HOVER_HEIGHT: f32 = 50.0;

/// A looping two-frame animation clip.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Clip(pub [usize; 2]);

const CLIP_LEFT: Clip = Clip([0, 1]);
const CLIP_RIGHT: Clip = Clip([8, 7]);
const CLIP_UP_LEFT: Clip = Clip([3, 2]);
const CLIP_UP_RIGHT: Clip = Clip([5, 6]);

/// Animation selection is purely a function of facing, airborne state, and whether any
/// directional key is held. `None` means stop on the neutral frame.
pub fn select_clip(facing: Facing, airborne: bool, input_active: bool) -> Option<Clip> {
    if airborne {
        return Some(match facing {
            Facing::Left => CLIP_UP_LEFT,
            Facing::Right => CLIP_UP_RIGHT,
        });
    }
    if input_active {
        return Some(match facing {
            Facing::Left => CLIP_LEFT,
            Facing::Right => CLIP_RIGHT,
        });
    }
    None
}

/// The turtle persists across pause; only a fresh level load tears it down, so
/// resuming must not spawn a duplicate.
fn player_missing(query: Query<(), With<Player>>) -> bool {
    query.is_empty()
}

fn spawn_player(
    mut commands: Commands,
    bounds: Res<WorldBounds>,
    level_assets: Res<LevelAssets>,
    asset_server: Res<AssetServer>,
    mut layouts: ResMut<Assets<TextureAtlasLayout>>,
) {
    let ground_level = level_assets
        .ground_level
        .unwrap_or(bounds.size().y * 0.5);
    let home_y = ground_level + HOVER_HEIGHT;
    let spawn_position = Vec3::new(bounds.center().x, home_y, 1.0);

    let texture = asset_server.load("img/turtle.png");
    let layout = layouts.add(TextureAtlasLayout::from_grid(
        UVec2::splat(FRAME_SIZE),
        FRAME_COLUMNS,
        1,
        None,
        None,
    ));
    let sprite_size = Vec2::splat(FRAME_SIZE as f32);

    commands.spawn((
        Name::new("Turtle"),
        Player,
        SpriteBundle {
            texture,
            sprite: Sprite {
                custom_size: Some(sprite_size),
                ..default()
            },
            transform: Transform::from_translation(spawn_position),
            ..default()
        },
        TextureAtlas {
            layout,
            index: NEUTRAL_FRAME,
        },
        AnimationTimer(Timer::from_seconds(1.0 / CLIP_FPS, TimerMode::Repeating)),
        Velocity::default(),
        Facing::default(),
        JumpState::default(),
        Health::new(STARTING_HEALTH),
        FlightBand::new(home_y),
        GravityScale(0.01),
        Collider::from_size(sprite_size),
    ));
}

fn despawn_player(mut commands: Commands, query: Query<Entity, With<Player>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}

fn animate_player(
    time: Res<Time>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mut query: Query<
        (
            &Transform,
            &Facing,
            &FlightBand,
            &mut TextureAtlas,
            &mut AnimationTimer,
        ),
        With<Player>,
    >,
) {
    let input_active = keyboard.pressed(KeyCode::ArrowLeft)
        || keyboard.pressed(KeyCode::KeyA)
        || keyboard.pressed(KeyCode::ArrowRight)
        || keyboard.pressed(KeyCode::KeyD)
        || keyboard.pressed(KeyCode::ArrowUp);

    for (transform, facing, flight, mut atlas, mut timer) in &mut query {
        let airborne = flight.is_airborne(transform.translation.y);

        let Some(clip) = select_clip(*facing, airborne, input_active) else {
            atlas.index = NEUTRAL_FRAME;
            timer.reset();
            continue;
        };

        // Entering a new clip snaps to its first frame; within a clip the timer toggles
        // between the two frames at 10 fps.
        if !clip.0.contains(&atlas.index) {
            atlas.index = clip.0[0];
            timer.reset();
            continue;
        }

        timer.tick(time.delta());
        if timer.just_finished() {
            atlas.index = if atlas.index == clip.0[0] {
                clip.0[1]
            } else {
                clip.0[0]
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn airborne_selects_up_clip_for_facing() {
        assert_eq!(select_clip(Facing::Left, true, false), Some(CLIP_UP_LEFT));
        assert_eq!(select_clip(Facing::Right, true, true), Some(CLIP_UP_RIGHT));
    }

    #[test]
    fn grounded_motion_selects_walk_clip() {
        assert_eq!(select_clip(Facing::Left, false, true), Some(CLIP_LEFT));
        assert_eq!(select_clip(Facing::Right, false, true), Some(CLIP_RIGHT));
    }

    #[test]
    fn idle_on_ground_stops_the_animation() {
        assert_eq!(select_clip(Facing::Left, false, false), None);
        assert_eq!(select_clip(Facing::Right, false, false), None);
    }
}
