//! Rabbit wave management: spawning, back-and-forth oscillation, bouncing against the
//! ground, and damage intake.
//!
//! The wave roster keeps a fixed-size slot per rabbit. A dead rabbit's slot is nulled,
//! never compacted, so every consumer iterates hole-tolerantly — cheap removal with
//! stable indices, the same shape the scene's enemy table had.

use bevy::prelude::*;
use rand::Rng;

use crate::collision::CollisionMap;
use crate::level::{LevelAssets, WorldBounds};
use crate::movement::{
    clamp_to_bounds, Collider, GravityScale, Health, MovementSettings, Velocity,
};
use crate::state::{GameSet, GameState};

pub struct EnemyPlugin;

impl Plugin for EnemyPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EnemyWave>()
            .add_event::<DamageEvent>()
            .add_systems(
                OnEnter(GameState::Playing),
                spawn_wave.run_if(wave_not_spawned),
            )
            .add_systems(OnEnter(GameState::Loading), despawn_wave)
            .add_systems(
                Update,
                (
                    (oscillate_enemies, settle_enemies)
                        .chain()
                        .in_set(GameSet::Movement),
                    apply_damage
                        .in_set(GameSet::Combat)
                        .after(crate::weapon::apply_overlap_damage),
                )
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

#[derive(Component)]
pub struct Enemy;

/// Damage request against a single actor, emitted by the weapon's overlap pass.
#[derive(Event, Debug, Clone, Copy)]
pub struct DamageEvent {
    pub target: Entity,
    pub points: i32,
}

/// Fixed-capacity wave roster. `slots[i]` is `None` once rabbit `i` died; the vector
/// never shrinks.
#[derive(Resource, Default)]
pub struct EnemyWave {
    pub slots: Vec<Option<Entity>>,
    pub alive: usize,
}

impl EnemyWave {
    pub fn total(&self) -> usize {
        self.slots.len()
    }

    /// Entities still in play, skipping the holes left by dead rabbits.
    pub fn live(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots.iter().filter_map(|slot| *slot)
    }
}

/// Linear ping-pong motion across `[origin_x - amplitude, origin_x + amplitude]`,
/// position-driven like the tween it replaces. `period` is the time of one leg; the
/// motion starts at the lower endpoint once `delay` has elapsed.
#[derive(Component, Debug, Clone)]
pub struct Oscillator {
    pub origin_x: f32,
    pub amplitude: f32,
    pub period: f32,
    pub delay: f32,
    pub elapsed: f32,
}

impl Oscillator {
    pub fn new(origin_x: f32, period: f32, delay: f32) -> Self {
        Self {
            origin_x,
            amplitude: 200.0,
            period,
            delay,
            elapsed: 0.0,
        }
    }

    pub fn offset(&self) -> f32 {
        let t = self.elapsed - self.delay;
        if t <= 0.0 {
            return 0.0;
        }
        let phase = (t / self.period) % 2.0;
        let a = self.amplitude;
        if phase < 1.0 {
            -a + 2.0 * a * phase
        } else {
            a - 2.0 * a * (phase - 1.0)
        }
    }

    pub fn x(&self) -> f32 {
        self.origin_x + self.offset()
    }
}

/// Per-index oscillation leg duration in milliseconds. The interference of the two
/// modulo terms spreads speeds across the wave for visual variety; there is no deeper
/// rationale to the constants.
pub fn oscillation_period_ms(index: usize) -> u32 {
    let fast = ((index % 2) as i32 + 1) * 1500;
    let drift = (index % 3) as i32 * 1000;
    1000 + (fast - drift).unsigned_abs()
}

/// Spawn delay alternates by index parity: {0ms, 100ms, 0ms, ...}.
pub fn spawn_delay_secs(index: usize) -> f32 {
    if index % 2 == 1 {
        0.1
    } else {
        0.0
    }
}

const SPRITE_SIZE: f32 = 48.0;
const STARTING_HEALTH: i32 = 100;
const RESTITUTION: f32 = 0.6;
/// Below this speed a bounce is absorbed instead of inverted.
const BOUNCE_CUTOFF: f32 = 20.0;

/// Pausing leaves the wave alive; only a fresh level load (re-entering `Loading`)
/// tears it down, so resuming must not spawn a second wave. A roster that is all holes
/// still counts as spawned.
fn wave_not_spawned(wave: Res<EnemyWave>) -> bool {
    wave.slots.is_empty()
}

/// Horizontal band rabbits may spawn in, keeping the whole +-200px oscillation range
/// plus the sprite inside the world. Non-empty for any world the manifest validation
/// accepts.
fn spawn_x_range(bounds: &WorldBounds) -> (f32, f32) {
    (
        bounds.min.x + 200.0 + SPRITE_SIZE,
        bounds.max.x - 200.0 - SPRITE_SIZE,
    )
}

fn spawn_wave(
    mut commands: Commands,
    bounds: Res<WorldBounds>,
    level_assets: Res<LevelAssets>,
    asset_server: Res<AssetServer>,
    mut wave: ResMut<EnemyWave>,
) {
    let total = level_assets.wave_size.unwrap_or(10);
    let ground_level = level_assets
        .ground_level
        .unwrap_or(bounds.size().y * 0.5);
    let texture = asset_server.load("img/rabbit.png");
    let sprite_size = Vec2::splat(SPRITE_SIZE);

    let (min_x, max_x) = spawn_x_range(&bounds);
    let mut rng = rand::thread_rng();

    wave.slots = Vec::with_capacity(total);
    wave.alive = total;

    for index in 0..total {
        let spawn_x = rng.gen_range(min_x..max_x);
        let period = oscillation_period_ms(index) as f32 / 1000.0;

        let entity = commands
            .spawn((
                Name::new(format!("Rabbit{index}")),
                Enemy,
                SpriteBundle {
                    texture: texture.clone(),
                    sprite: Sprite {
                        custom_size: Some(sprite_size),
                        ..default()
                    },
                    transform: Transform::from_translation(Vec3::new(
                        spawn_x,
                        ground_level,
                        1.0,
                    )),
                    ..default()
                },
                Oscillator::new(spawn_x, period, spawn_delay_secs(index)),
                Velocity::default(),
                GravityScale(1.0),
                Health::new(STARTING_HEALTH),
                Collider::from_size(sprite_size),
            ))
            .id();

        wave.slots.push(Some(entity));
    }

    info!("Spawned a wave of {total} rabbits.");
}

fn despawn_wave(
    mut commands: Commands,
    query: Query<Entity, With<Enemy>>,
    mut wave: ResMut<EnemyWave>,
) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
    wave.slots.clear();
    wave.alive = 0;
}

/// Drives the horizontal tween-equivalent. The x coordinate is authored by the
/// oscillator; vertical motion stays with the physics pass below.
fn oscillate_enemies(time: Res<Time>, mut query: Query<(&mut Transform, &mut Oscillator)>) {
    let dt = time.delta_seconds();
    for (mut transform, mut oscillator) in &mut query {
        oscillator.elapsed += dt;
        transform.translation.x = oscillator.x();
    }
}

/// Gravity plus bounce: rabbits fall with the full world pull and rebound off tiles and
/// the world floor with 0.6 restitution.
fn settle_enemies(
    time: Res<Time>,
    settings: Res<MovementSettings>,
    bounds: Res<WorldBounds>,
    collision_map: Res<CollisionMap>,
    mut query: Query<
        (&mut Transform, &mut Velocity, &GravityScale, &Collider),
        With<Enemy>,
    >,
) {
    let dt = time.delta_seconds();

    for (mut transform, mut velocity, gravity_scale, collider) in &mut query {
        let mut position = transform.translation.truncate();
        let half = collider.half_extents;

        velocity.y -= settings.gravity * gravity_scale.0 * dt;
        if velocity.y < settings.terminal_velocity {
            velocity.y = settings.terminal_velocity;
        }

        let blocked = collision_map.sweep_vertical(&mut position, half, velocity.y * dt);
        let on_floor = clamp_to_bounds(&mut position, half, &bounds);

        if blocked || on_floor {
            velocity.y = bounce(velocity.y);
        }

        transform.translation.x = position.x;
        transform.translation.y = position.y;
    }
}

fn bounce(vertical_velocity: f32) -> f32 {
    let rebound = -vertical_velocity * RESTITUTION;
    if rebound.abs() < BOUNCE_CUTOFF {
        0.0
    } else {
        rebound
    }
}

/// Consumes damage events. Non-positive points are ignored inside `Health::damage`; a
/// kill despawns the rabbit, nulls its roster slot, and decrements the live count —
/// exactly once, even when several events land on the same frame.
pub fn apply_damage(
    mut commands: Commands,
    mut events: EventReader<DamageEvent>,
    mut wave: ResMut<EnemyWave>,
    mut enemies: Query<&mut Health, With<Enemy>>,
) {
    for event in events.read() {
        let Ok(mut health) = enemies.get_mut(event.target) else {
            continue;
        };
        if health.is_dead() {
            continue;
        }

        if health.damage(event.points) {
            commands.entity(event.target).despawn_recursive();
            if let Some(slot) = wave
                .slots
                .iter_mut()
                .find(|slot| **slot == Some(event.target))
            {
                *slot = None;
            }
            wave.alive = wave.alive.saturating_sub(1);
        }
    }
}
