//! Camera follow system. Keeps the main 2D camera locked onto the turtle while never
//! showing anything outside the 1900x480 world.

use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::level::WorldBounds;
use crate::player::Player;
use crate::state::GameSet;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            follow_player_camera
                .in_set(GameSet::Effects)
                .run_if(has_player_and_camera),
        );
    }
}

/// Marker component so the follow system can locate the camera entity without relying
/// on names.
#[derive(Component)]
pub struct FollowCamera;

/// Run condition that only schedules the follow system when both a player and camera
/// exist; this prevents `get_single` noise while the level is still loading.
fn has_player_and_camera(
    player_query: Query<Entity, With<Player>>,
    camera_query: Query<Entity, With<FollowCamera>>,
) -> bool {
    !player_query.is_empty() && !camera_query.is_empty()
}

/// Smoothly interpolates the camera toward the player (the lock-on follow of the
/// original, expressed as exponential decay) and clamps the view rectangle inside the
/// world bounds.
fn follow_player_camera(
    mut camera_query: Query<(&mut Transform, &OrthographicProjection), With<FollowCamera>>,
    player_query: Query<&Transform, (With<Player>, Without<FollowCamera>)>,
    bounds: Res<WorldBounds>,
    window_query: Query<&Window, With<PrimaryWindow>>,
    time: Res<Time>,
) {
    let Ok(player_transform) = player_query.get_single() else {
        return;
    };

    let Ok((mut camera_transform, projection)) = camera_query.get_single_mut() else {
        return;
    };

    let target_z = camera_transform.translation.z;
    let mut desired = Vec3::new(
        player_transform.translation.x,
        player_transform.translation.y,
        target_z,
    );

    if let Ok(window) = window_query.get_single() {
        let half_width = window.resolution.width() * 0.5 * projection.scale;
        let half_height = window.resolution.height() * 0.5 * projection.scale;
        let size = bounds.size();

        if size.x > half_width * 2.0 {
            desired.x = desired
                .x
                .clamp(bounds.min.x + half_width, bounds.max.x - half_width);
        } else {
            desired.x = bounds.center().x;
        }

        if size.y > half_height * 2.0 {
            desired.y = desired
                .y
                .clamp(bounds.min.y + half_height, bounds.max.y - half_height);
        } else {
            desired.y = bounds.center().y;
        }
    }

    let follow_speed = 6.0;
    let lerp_t = 1.0 - f32::exp(-follow_speed * time.delta_seconds());
    camera_transform.translation = camera_transform.translation.lerp(desired, lerp_t);
}
