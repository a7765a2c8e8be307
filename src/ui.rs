//! HUD and pause overlay. The HUD surfaces the live rabbit count; the pause overlay is
//! a full-screen node spawned when the game enters the `Paused` state.

use bevy::prelude::*;

use crate::enemy::EnemyWave;
use crate::state::{GameSet, GameState};

/// Registers HUD and pause overlay spawn/despawn systems.
pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::Paused), spawn_pause_menu)
            .add_systems(OnExit(GameState::Paused), despawn_pause_menu)
            .add_systems(OnEnter(GameState::Playing), spawn_hud)
            .add_systems(OnExit(GameState::Playing), despawn_hud)
            .add_systems(
                Update,
                update_hud
                    .in_set(GameSet::Effects)
                    .run_if(in_state(GameState::Playing).and_then(resource_changed::<EnemyWave>)),
            );
    }
}

#[derive(Component)]
struct PauseMenu;

#[derive(Component)]
struct RabbitCounter;

fn spawn_hud(mut commands: Commands, wave: Res<EnemyWave>) {
    commands.spawn((
        RabbitCounter,
        Name::new("RabbitCounter"),
        TextBundle::from_section(
            format!("Rabbits left: {}", wave.alive),
            TextStyle {
                font_size: 24.0,
                color: Color::srgba(0.95, 0.95, 0.95, 1.0),
                ..default()
            },
        )
        .with_style(Style {
            position_type: PositionType::Absolute,
            top: Val::Px(8.0),
            left: Val::Px(8.0),
            ..default()
        }),
    ));
}

fn update_hud(wave: Res<EnemyWave>, mut query: Query<&mut Text, With<RabbitCounter>>) {
    for mut text in &mut query {
        text.sections[0].value = if wave.alive == 0 && wave.total() > 0 {
            "All rabbits down!".to_owned()
        } else {
            format!("Rabbits left: {}", wave.alive)
        };
    }
}

fn despawn_hud(mut commands: Commands, query: Query<Entity, With<RabbitCounter>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}

/// Spawns a full-screen UI node with centered text. Nodes live in the UI world and are
/// rendered by the UI camera automatically.
fn spawn_pause_menu(mut commands: Commands) {
    commands
        .spawn((
            PauseMenu,
            Name::new("PauseMenu"),
            NodeBundle {
                background_color: BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.6)),
                style: Style {
                    width: Val::Percent(100.0),
                    height: Val::Percent(100.0),
                    align_items: AlignItems::Center,
                    justify_content: JustifyContent::Center,
                    ..default()
                },
                ..default()
            },
        ))
        .with_children(|parent| {
            parent.spawn(TextBundle::from_section(
                "Paused\nPress ESC to resume",
                TextStyle {
                    font_size: 36.0,
                    color: Color::srgba(0.9, 0.9, 0.9, 1.0),
                    ..default()
                },
            ));
        });
}

/// Removes the pause menu overlay on state exit.
fn despawn_pause_menu(mut commands: Commands, query: Query<Entity, With<PauseMenu>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}
