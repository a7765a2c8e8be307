//! The laser weapon: a fixed pool of projectile sprites cycled between inactive and
//! in-flight, a cooldown deadline compared against the clock each frame, and the
//! projectile-vs-rabbit overlap pass.
//!
//! A fire request that arrives inside the cooldown window, or when every pooled slot is
//! already in flight, is a silent no-op; callers never observe failure.

use bevy::prelude::*;

use crate::audio::{play_one_shot, AudioHandles};
use crate::enemy::{DamageEvent, Enemy, EnemyWave};
use crate::level::WorldBounds;
use crate::movement::{Collider, Facing};
use crate::player::AnimationTimer;
use crate::state::{GameSet, GameState};

pub struct WeaponPlugin;

impl Plugin for WeaponPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Weapon>()
            .add_event::<FireCommand>()
            .add_systems(
                OnEnter(GameState::Playing),
                spawn_projectile_pool.run_if(pool_missing),
            )
            .add_systems(OnEnter(GameState::Loading), despawn_projectile_pool)
            .add_systems(
                Update,
                (fire_laser, advance_projectiles, apply_overlap_damage)
                    .chain()
                    .in_set(GameSet::Combat)
                    .run_if(in_state(GameState::Playing)),
            );
    }
}

/// A request to fire from `origin` towards `facing`, relayed by the player input system
/// on every frame the fire key is held.
#[derive(Event, Debug, Clone, Copy)]
pub struct FireCommand {
    pub origin: Vec2,
    pub facing: Facing,
}

/// Weapon configuration plus the one piece of mutable state: the cooldown deadline.
#[derive(Resource, Debug, Clone)]
pub struct Weapon {
    pub cooldown_until: f32,
    pub cooldown: f32,
    pub damage: i32,
    pub speed: f32,
    pub pool_size: usize,
}

impl Default for Weapon {
    fn default() -> Self {
        Self {
            cooldown_until: 0.0,
            cooldown: 0.25,
            damage: 30,
            speed: 500.0,
            pool_size: 100,
        }
    }
}

impl Weapon {
    pub fn ready(&self, now: f32) -> bool {
        now >= self.cooldown_until
    }

    pub fn arm(&mut self, now: f32) {
        self.cooldown_until = now + self.cooldown;
    }
}

/// Fixed fire angles, one preset per facing.
pub fn fire_angle(facing: Facing) -> f32 {
    match facing {
        Facing::Right => 0.785398,
        Facing::Left => 2.35619,
    }
}

/// One pooled projectile slot. Inactive slots are hidden and skipped by every system;
/// `hits` records which rabbits this flight has already damaged, so a projectile hurts
/// each target at most once per lifetime.
#[derive(Component, Debug, Default)]
pub struct Projectile {
    pub active: bool,
    pub facing: Facing,
    pub angle: f32,
    pub hits: Vec<Entity>,
}

const BEAM_FRAME: UVec2 = UVec2::new(36, 12);
const BEAM_FRAMES: u32 = 3;
const BEAM_FPS: f32 = 12.0;

/// The pool persists across pause, cooldown state and in-flight beams included; only a
/// fresh level load tears it down.
fn pool_missing(query: Query<(), With<Projectile>>) -> bool {
    query.is_empty()
}

fn spawn_projectile_pool(
    mut commands: Commands,
    weapon: Res<Weapon>,
    asset_server: Res<AssetServer>,
    mut layouts: ResMut<Assets<TextureAtlasLayout>>,
) {
    let texture: Handle<Image> = asset_server.load("img/laser.png");
    let layout = layouts.add(TextureAtlasLayout::from_grid(
        BEAM_FRAME,
        BEAM_FRAMES,
        1,
        None,
        None,
    ));
    let sprite_size = BEAM_FRAME.as_vec2();

    for index in 0..weapon.pool_size {
        commands.spawn((
            Name::new(format!("LaserBeam{index}")),
            Projectile::default(),
            SpriteBundle {
                texture: texture.clone(),
                sprite: Sprite {
                    custom_size: Some(sprite_size),
                    ..default()
                },
                visibility: Visibility::Hidden,
                transform: Transform::from_translation(Vec3::new(0.0, 0.0, 2.0)),
                ..default()
            },
            TextureAtlas { layout: layout.clone(), index: 0 },
            AnimationTimer(Timer::from_seconds(1.0 / BEAM_FPS, TimerMode::Repeating)),
            Collider::from_size(sprite_size),
        ));
    }
}

fn despawn_projectile_pool(mut commands: Commands, query: Query<Entity, With<Projectile>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}

/// Services fire requests. A request passes when the cooldown deadline has elapsed and
/// an inactive slot exists; the slot is re-aimed at the shooter's position and the
/// deadline advances by one cooldown. Everything else falls through silently.
pub fn fire_laser(
    mut commands: Commands,
    time: Res<Time>,
    audio: Res<AudioHandles>,
    mut weapon: ResMut<Weapon>,
    mut events: EventReader<FireCommand>,
    mut pool: Query<(
        &mut Projectile,
        &mut Transform,
        &mut Sprite,
        &mut Visibility,
        &mut TextureAtlas,
        &mut AnimationTimer,
    )>,
) {
    let now = time.elapsed_seconds();

    for command in events.read() {
        if !weapon.ready(now) {
            continue;
        }

        let Some((mut projectile, mut transform, mut sprite, mut visibility, mut atlas, mut timer)) =
            pool.iter_mut().find(|(projectile, ..)| !projectile.active)
        else {
            continue;
        };

        let angle = fire_angle(command.facing);
        projectile.active = true;
        projectile.facing = command.facing;
        projectile.angle = angle;
        projectile.hits.clear();

        transform.translation.x = command.origin.x;
        transform.translation.y = command.origin.y;
        transform.rotation = Quat::from_rotation_z(angle);
        sprite.flip_x = command.facing == Facing::Left;
        atlas.index = 0;
        timer.reset();
        *visibility = Visibility::Visible;

        weapon.arm(now);
        play_one_shot(&mut commands, &audio.laser);
    }
}

/// Advances every in-flight beam: horizontal motion by direction, vertical climb scaled
/// by the sine of the fire angle, and the frame animation. Beams leaving the world are
/// returned to the pool.
fn advance_projectiles(
    time: Res<Time>,
    weapon: Res<Weapon>,
    bounds: Res<WorldBounds>,
    mut pool: Query<(
        &mut Projectile,
        &mut Transform,
        &mut Visibility,
        &mut TextureAtlas,
        &mut AnimationTimer,
    )>,
) {
    let dt = time.delta_seconds();

    for (mut projectile, mut transform, mut visibility, mut atlas, mut timer) in &mut pool {
        if !projectile.active {
            continue;
        }

        transform.translation.x += projectile.facing.sign() * weapon.speed * dt;
        transform.translation.y += weapon.speed * projectile.angle.sin() * dt;

        timer.tick(time.delta());
        if timer.just_finished() {
            atlas.index = (atlas.index + 1) % BEAM_FRAMES as usize;
        }

        if !bounds.contains(transform.translation.truncate()) {
            projectile.active = false;
            *visibility = Visibility::Hidden;
        }
    }
}

/// Axis-aligned overlap between two centered boxes.
pub fn aabb_overlap(a_center: Vec2, a_half: Vec2, b_center: Vec2, b_half: Vec2) -> bool {
    (a_center.x - b_center.x).abs() <= a_half.x + b_half.x
        && (a_center.y - b_center.y).abs() <= a_half.y + b_half.y
}

/// Tests every active beam against every live rabbit (hole-tolerant roster iteration)
/// and emits one damage event per new contact. The per-projectile hit list means a beam
/// that keeps overlapping the same rabbit across frames damages it only once.
pub fn apply_overlap_damage(
    weapon: Res<Weapon>,
    wave: Res<EnemyWave>,
    mut projectiles: Query<(&mut Projectile, &Transform, &Collider), Without<Enemy>>,
    enemies: Query<(&Transform, &Collider), With<Enemy>>,
    mut damage_events: EventWriter<DamageEvent>,
) {
    for (mut projectile, transform, collider) in &mut projectiles {
        if !projectile.active {
            continue;
        }

        let beam_center = transform.translation.truncate();
        for target in wave.live() {
            let Ok((enemy_transform, enemy_collider)) = enemies.get(target) else {
                continue;
            };

            if !aabb_overlap(
                beam_center,
                collider.half_extents,
                enemy_transform.translation.truncate(),
                enemy_collider.half_extents,
            ) {
                continue;
            }

            if projectile.hits.contains(&target) {
                continue;
            }

            projectile.hits.push(target);
            damage_events.send(DamageEvent {
                target,
                points: weapon.damage,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_gate_rejects_early_fire() {
        let mut weapon = Weapon::default();
        assert!(weapon.ready(0.0));
        weapon.arm(0.0);
        assert!(!weapon.ready(0.1));
        assert!(!weapon.ready(0.249));
        // At the deadline exactly, fire is allowed again.
        assert!(weapon.ready(0.25));
        weapon.arm(0.25);
        assert_eq!(weapon.cooldown_until, 0.5);
    }

    #[test]
    fn fire_angles_match_facing() {
        assert!((fire_angle(Facing::Right) - 0.785398).abs() < 1e-6);
        assert!((fire_angle(Facing::Left) - 2.35619).abs() < 1e-6);
        // Both presets climb at the same rate.
        assert!((fire_angle(Facing::Left).sin() - fire_angle(Facing::Right).sin()).abs() < 1e-5);
    }

    #[test]
    fn overlap_detects_touching_and_separated_boxes() {
        let half = Vec2::splat(10.0);
        assert!(aabb_overlap(Vec2::ZERO, half, Vec2::new(15.0, 0.0), half));
        assert!(aabb_overlap(Vec2::ZERO, half, Vec2::new(20.0, 0.0), half));
        assert!(!aabb_overlap(Vec2::ZERO, half, Vec2::new(20.1, 0.0), half));
        assert!(!aabb_overlap(Vec2::ZERO, half, Vec2::new(0.0, 25.0), half));
    }

    #[test]
    fn continued_overlap_damages_once_per_lifetime() {
        let mut app = App::new();
        app.init_resource::<Weapon>();
        app.init_resource::<EnemyWave>();
        app.add_event::<DamageEvent>();
        app.add_systems(Update, apply_overlap_damage);

        let rabbit = app
            .world_mut()
            .spawn((
                Enemy,
                Transform::default(),
                Collider::from_size(Vec2::splat(48.0)),
            ))
            .id();
        {
            let mut wave = app.world_mut().resource_mut::<EnemyWave>();
            wave.slots = vec![Some(rabbit)];
            wave.alive = 1;
        }
        app.world_mut().spawn((
            Projectile {
                active: true,
                ..Default::default()
            },
            Transform::default(),
            Collider::from_size(Vec2::new(36.0, 12.0)),
        ));

        // Beam and rabbit overlap on both frames; only the first contact lands.
        app.update();
        app.update();

        let events = app.world().resource::<Events<DamageEvent>>();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn held_trigger_fires_once_per_cooldown_window() {
        let mut app = App::new();
        app.init_resource::<Time>();
        app.init_resource::<Weapon>();
        app.init_resource::<AudioHandles>();
        app.add_event::<FireCommand>();
        app.add_systems(Update, fire_laser);

        // A three-slot pool is enough to show that one burst claims one slot.
        for _ in 0..3 {
            app.world_mut().spawn((
                Projectile::default(),
                Transform::default(),
                Sprite::default(),
                Visibility::Hidden,
                TextureAtlas::default(),
                AnimationTimer(Timer::from_seconds(0.1, TimerMode::Repeating)),
            ));
        }

        // Two requests land on the same frame, as a held key produces.
        for _ in 0..2 {
            app.world_mut().send_event(FireCommand {
                origin: Vec2::new(320.0, 290.0),
                facing: Facing::Right,
            });
        }
        app.update();

        let mut pool_query = app.world_mut().query::<&Projectile>();
        let active: Vec<&Projectile> = pool_query
            .iter(app.world())
            .filter(|projectile| projectile.active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].facing, Facing::Right);

        let weapon = app.world().resource::<Weapon>();
        assert_eq!(weapon.cooldown_until, weapon.cooldown);
    }
}
