//! Audio preloading and one-shot playback helpers.
//!
//! Bevy's asset system reference-counts handles; `AudioHandles` keeps the clips alive
//! for the whole run. Missing files degrade to silence — the load simply never
//! completes and playback entities despawn without producing sound.

use bevy::prelude::*;

use crate::state::GameState;

/// Registers the audio loading system and allocates the persistent handle cache.
pub struct GameAudioPlugin;

impl Plugin for GameAudioPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AudioHandles>()
            .add_systems(OnEnter(GameState::Loading), load_audio_handles)
            .add_systems(OnEnter(GameState::Playing), start_ambient)
            .add_systems(OnExit(GameState::Playing), stop_ambient);
    }
}

/// Game-wide audio clips. Each `Handle` is a cheap cloneable pointer into Bevy's asset
/// storage.
#[derive(Resource, Default)]
pub struct AudioHandles {
    pub laser: Option<Handle<AudioSource>>,
    pub jump: Option<Handle<AudioSource>>,
    pub ambient: Option<Handle<AudioSource>>,
}

#[derive(Component)]
struct AmbientLoop;

fn load_audio_handles(asset_server: Res<AssetServer>, mut handles: ResMut<AudioHandles>) {
    handles.laser = Some(asset_server.load("audio/laser.ogg"));
    handles.jump = Some(asset_server.load("audio/jump.ogg"));
    handles.ambient = Some(asset_server.load("audio/ambient.ogg"));
}

/// Spawns a despawn-on-finish playback entity for the given clip, if it was loaded.
pub fn play_one_shot(commands: &mut Commands, clip: &Option<Handle<AudioSource>>) {
    let Some(source) = clip.clone() else {
        return;
    };
    commands.spawn(AudioBundle {
        source,
        settings: PlaybackSettings::DESPAWN,
    });
}

fn start_ambient(mut commands: Commands, handles: Res<AudioHandles>) {
    let Some(source) = handles.ambient.clone() else {
        return;
    };
    commands.spawn((
        AmbientLoop,
        Name::new("AmbientLoop"),
        AudioBundle {
            source,
            settings: PlaybackSettings::LOOP,
        },
    ));
}

fn stop_ambient(mut commands: Commands, query: Query<Entity, With<AmbientLoop>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}
