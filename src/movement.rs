use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;

use crate::audio::{play_one_shot, AudioHandles};
use crate::collision::CollisionMap;
use crate::level::WorldBounds;
use crate::player::Player;
use crate::state::{GameSet, GameState};
use crate::weapon::FireCommand;

pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MovementSettings>().add_systems(
            Update,
            (
                read_player_input.in_set(GameSet::Input),
                apply_player_kinematics.in_set(GameSet::Movement),
            )
                .run_if(in_state(GameState::Playing)),
        );
    }
}

#[derive(Resource)]
pub struct MovementSettings {
    pub gravity: f32,
    pub terminal_velocity: f32,
    pub run_speed: f32,
    pub jump_speed: f32,
    pub flight_thrust: f32,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            gravity: 1400.0,
            terminal_velocity: -1800.0,
            run_speed: 350.0,
            jump_speed: 650.0,
            flight_thrust: 400.0,
        }
    }
}

#[derive(Component, Default, Deref, DerefMut)]
pub struct Velocity(pub Vec2);

/// Which way an actor is looking. Drives animation selection and projectile direction.
#[derive(Component, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Facing {
    #[default]
    Left,
    Right,
}

impl Facing {
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }
}

/// Hit points shared by every damageable actor. Damage is the only mutation; a body at
/// or below zero stays dead and absorbs nothing further.
#[derive(Component, Debug)]
pub struct Health {
    current: i32,
}

impl Health {
    pub fn new(amount: i32) -> Self {
        Self { current: amount }
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0
    }

    /// Applies `points` of damage. Non-positive amounts are ignored, as are hits on an
    /// already-dead body. Returns true exactly when this call crossed zero.
    pub fn damage(&mut self, points: i32) -> bool {
        if points <= 0 || self.current <= 0 {
            return false;
        }
        self.current -= points;
        self.current <= 0
    }
}

/// Jump bookkeeping: a cooldown deadline plus a press counter. The counter resets on any
/// rejected press, which is what makes the double jump re-arm after the window closes.
#[derive(Component, Debug, Clone, Copy)]
pub struct JumpState {
    pub cooldown_until: f32,
    pub jumps: u32,
    pub max_jumps: u32,
}

pub const JUMP_COOLDOWN_SECS: f32 = 0.75;

impl Default for JumpState {
    fn default() -> Self {
        Self {
            cooldown_until: 0.0,
            jumps: 0,
            max_jumps: 2,
        }
    }
}

impl JumpState {
    /// Grants a jump iff the cooldown deadline has passed and the press budget is not
    /// exhausted; a rejected press clears the counter.
    pub fn try_jump(&mut self, now: f32) -> bool {
        if now >= self.cooldown_until && self.jumps < self.max_jumps {
            self.cooldown_until = now + JUMP_COOLDOWN_SECS;
            self.jumps += 1;
            true
        } else {
            self.jumps = 0;
            false
        }
    }
}

/// Resting altitude of a flying actor. Dropping more than `band` below `home_y` engages
/// the passive thrust; climbing more than `band` above it counts as airborne for
/// animation purposes.
#[derive(Component, Clone, Copy)]
pub struct FlightBand {
    pub home_y: f32,
    pub band: f32,
}

impl FlightBand {
    pub fn new(home_y: f32) -> Self {
        Self { home_y, band: 30.0 }
    }

    pub fn needs_thrust(&self, y: f32) -> bool {
        y < self.home_y - self.band
    }

    pub fn is_airborne(&self, y: f32) -> bool {
        y > self.home_y + self.band
    }
}

/// Fraction of world gravity acting on a body. The turtle flies on 0.01; rabbits take
/// the full pull.
#[derive(Component, Clone, Copy)]
pub struct GravityScale(pub f32);

#[derive(Component, Copy, Clone)]
pub struct Collider {
    pub half_extents: Vec2,
}

impl Collider {
    pub fn from_size(size: Vec2) -> Self {
        Self {
            half_extents: size * 0.5,
        }
    }
}

/// Polls the keyboard once per frame. Horizontal keys set velocity and facing directly
/// (no acceleration ramp), Up runs through the jump gate, and a held Space relays a fire
/// request every frame; the weapon's own cooldown is the only debounce.
fn read_player_input(
    mut commands: Commands,
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    settings: Res<MovementSettings>,
    audio: Res<AudioHandles>,
    mut fire_events: EventWriter<FireCommand>,
    mut query: Query<(&Transform, &mut Velocity, &mut Facing, &mut JumpState), With<Player>>,
) {
    let now = time.elapsed_seconds();

    for (transform, mut velocity, mut facing, mut jump) in &mut query {
        velocity.x = 0.0;

        if keyboard.pressed(KeyCode::ArrowLeft) || keyboard.pressed(KeyCode::KeyA) {
            velocity.x = -settings.run_speed;
            if *facing != Facing::Left {
                *facing = Facing::Left;
            }
        } else if keyboard.pressed(KeyCode::ArrowRight) || keyboard.pressed(KeyCode::KeyD) {
            velocity.x = settings.run_speed;
            if *facing != Facing::Right {
                *facing = Facing::Right;
            }
        }

        if keyboard.pressed(KeyCode::ArrowUp) && jump.try_jump(now) {
            velocity.y = settings.jump_speed;
            play_one_shot(&mut commands, &audio.jump);
        }

        if keyboard.pressed(KeyCode::Space) {
            fire_events.send(FireCommand {
                origin: transform.translation.truncate(),
                facing: *facing,
            });
        }
    }
}

/// Integrates the turtle: passive flight thrust, scaled gravity, tile sweeps, and the
/// world-bounds clamp.
fn apply_player_kinematics(
    time: Res<Time>,
    settings: Res<MovementSettings>,
    bounds: Res<WorldBounds>,
    collision_map: Res<CollisionMap>,
    mut query: Query<
        (
            &mut Transform,
            &mut Velocity,
            &FlightBand,
            &GravityScale,
            &Collider,
        ),
        With<Player>,
    >,
) {
    let dt = time.delta_seconds();

    for (mut transform, mut velocity, flight, gravity_scale, collider) in &mut query {
        let mut position = transform.translation.truncate();
        let half = collider.half_extents;

        // Continuous flight: sinking below the resting band kicks the turtle back up
        // without any dedicated input.
        if flight.needs_thrust(position.y) {
            velocity.y = settings.flight_thrust;
        }

        velocity.y -= settings.gravity * gravity_scale.0 * dt;
        if velocity.y < settings.terminal_velocity {
            velocity.y = settings.terminal_velocity;
        }

        if collision_map.sweep_horizontal(&mut position, half, velocity.x * dt) {
            velocity.x = 0.0;
        }
        if collision_map.sweep_vertical(&mut position, half, velocity.y * dt) {
            velocity.y = 0.0;
        }

        if clamp_to_bounds(&mut position, half, &bounds) {
            velocity.y = velocity.y.max(0.0);
        }

        transform.translation.x = position.x;
        transform.translation.y = position.y;
    }
}

/// Keeps a body inside the world rectangle. Returns true when it was resting on the
/// world floor after clamping.
pub fn clamp_to_bounds(position: &mut Vec2, half: Vec2, bounds: &WorldBounds) -> bool {
    position.x = position
        .x
        .clamp(bounds.min.x + half.x, bounds.max.x - half.x);

    let floor = bounds.min.y + half.y;
    let ceiling = bounds.max.y - half.y;
    let on_floor = position.y <= floor;
    position.y = position.y.clamp(floor, ceiling);
    on_floor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_jump_is_granted() {
        let mut jump = JumpState::default();
        assert!(jump.try_jump(0.0));
        assert_eq!(jump.jumps, 1);
        assert_eq!(jump.cooldown_until, JUMP_COOLDOWN_SECS);
    }

    #[test]
    fn double_jump_after_cooldown() {
        let mut jump = JumpState::default();
        assert!(jump.try_jump(0.0));
        assert!(jump.try_jump(0.8));
        assert_eq!(jump.jumps, 2);
    }

    #[test]
    fn press_inside_cooldown_is_rejected_and_resets() {
        let mut jump = JumpState::default();
        assert!(jump.try_jump(0.0));
        assert!(!jump.try_jump(0.1));
        assert_eq!(jump.jumps, 0);
    }

    #[test]
    fn third_jump_is_rejected_and_resets() {
        let mut jump = JumpState::default();
        assert!(jump.try_jump(0.0));
        assert!(jump.try_jump(0.8));
        assert!(!jump.try_jump(1.6));
        assert_eq!(jump.jumps, 0);
        // The reset re-arms the gate on the next eligible press.
        assert!(jump.try_jump(1.7));
    }

    #[test]
    fn damage_ignores_non_positive_points() {
        let mut health = Health::new(100);
        assert!(!health.damage(0));
        assert!(!health.damage(-30));
        assert_eq!(health.current(), 100);
    }

    #[test]
    fn damage_accumulates_and_kills_once() {
        let mut health = Health::new(100);
        assert!(!health.damage(30));
        assert!(!health.damage(30));
        assert!(!health.damage(30));
        assert!(health.damage(30));
        assert!(health.is_dead());
        // A dead body reports the kill transition exactly once.
        assert!(!health.damage(30));
        assert_eq!(health.current(), -20);
    }

    #[test]
    fn flight_band_thresholds() {
        let flight = FlightBand::new(290.0);
        assert!(flight.needs_thrust(259.0));
        assert!(!flight.needs_thrust(261.0));
        assert!(flight.is_airborne(321.0));
        assert!(!flight.is_airborne(319.0));
        assert!(!flight.is_airborne(290.0));
    }

    fn input_app() -> App {
        let mut app = App::new();
        app.init_resource::<Time>();
        app.init_resource::<MovementSettings>();
        app.init_resource::<AudioHandles>();
        app.add_event::<FireCommand>();
        app.add_systems(Update, read_player_input);
        app
    }

    #[test]
    fn left_key_flips_facing_and_sets_velocity() {
        let mut app = input_app();
        let player = app
            .world_mut()
            .spawn((
                Player,
                Transform::default(),
                Velocity(Vec2::new(350.0, 0.0)),
                Facing::Right,
                JumpState::default(),
            ))
            .id();

        let mut input = ButtonInput::<KeyCode>::default();
        input.press(KeyCode::ArrowLeft);
        app.insert_resource(input);
        app.update();

        assert_eq!(*app.world().get::<Facing>(player).unwrap(), Facing::Left);
        assert_eq!(app.world().get::<Velocity>(player).unwrap().x, -350.0);
    }

    #[test]
    fn held_fire_key_relays_a_command_every_frame() {
        let mut app = input_app();
        app.world_mut().spawn((
            Player,
            Transform::from_translation(Vec3::new(320.0, 290.0, 1.0)),
            Velocity::default(),
            Facing::Left,
            JumpState::default(),
        ));

        let mut input = ButtonInput::<KeyCode>::default();
        input.press(KeyCode::Space);
        app.insert_resource(input);
        app.update();

        let events = app.world().resource::<Events<FireCommand>>();
        let mut cursor = events.get_reader();
        let commands: Vec<&FireCommand> = cursor.read(events).collect();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].facing, Facing::Left);
        assert_eq!(commands[0].origin, Vec2::new(320.0, 290.0));
    }

    #[test]
    fn bounds_clamp_reports_floor_contact() {
        let bounds = WorldBounds::default();
        let half = Vec2::splat(16.0);

        let mut sunk = Vec2::new(100.0, -40.0);
        assert!(clamp_to_bounds(&mut sunk, half, &bounds));
        assert_eq!(sunk.y, 16.0);

        let mut inside = Vec2::new(100.0, 100.0);
        assert!(!clamp_to_bounds(&mut inside, half, &bounds));
        assert_eq!(inside, Vec2::new(100.0, 100.0));

        let mut past_right = Vec2::new(5000.0, 100.0);
        assert!(!clamp_to_bounds(&mut past_right, half, &bounds));
        assert_eq!(past_right.x, 1900.0 - 16.0);
    }
}
