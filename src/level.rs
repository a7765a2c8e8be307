//! Level orchestration: loads the level manifest and its CSV tile grid, spawns the
//! background and ground tiles, and caches world metadata for the other subsystems.
//!
//! The level format is deliberately simple: a JSON manifest (`*.level.json`) naming the
//! assets and world dimensions, plus a comma-separated tile grid where `-1` means empty
//! and any other value is a solid ground tile. Both are loaded through custom
//! `AssetLoader`s so the regular Bevy asset pipeline (async IO, hot reload) applies.

use std::fmt;
use std::str::Utf8Error;

use bevy::asset::io::Reader;
use bevy::asset::{AssetLoader, AsyncReadExt, LoadContext, LoadState};
use bevy::prelude::*;
use serde::Deserialize;

use crate::state::GameState;

/// Registers the asset loaders and the load-monitoring systems.
pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(LevelConfig::default())
            .init_resource::<LevelAssets>()
            .init_resource::<WorldBounds>()
            .init_asset::<LevelManifest>()
            .init_asset_loader::<LevelManifestLoader>()
            .init_asset::<TileGrid>()
            .init_asset_loader::<TileGridLoader>()
            .add_systems(OnEnter(GameState::Loading), begin_level_load)
            .add_systems(
                Update,
                monitor_level_loading.run_if(in_state(GameState::Loading)),
            );
    }
}

/// Which level to load. Kept as a resource so a future level select can swap it.
#[derive(Resource, Clone)]
pub struct LevelConfig {
    pub manifest_path: String,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            manifest_path: "maps/level1.level.json".to_owned(),
        }
    }
}

/// Playable world rectangle. Actors and projectiles are confined to it; the camera is
/// clamped against it. Updated from the manifest once it loads.
#[derive(Resource, Clone, Copy)]
pub struct WorldBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            min: Vec2::ZERO,
            max: Vec2::new(1900.0, 480.0),
        }
    }
}

impl WorldBounds {
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }
}

/// Mirror of the currently loaded level's metadata. Optional fields become `Some` once
/// assets are available; other systems (spawning, collision) read this without owning
/// the underlying assets.
#[derive(Resource, Default)]
pub struct LevelAssets {
    pub manifest: Option<Handle<LevelManifest>>,
    pub manifest_path: Option<String>,
    pub grid: Option<Handle<TileGrid>>,
    pub background: Option<Handle<Image>>,
    pub ground_tile: Option<Handle<Image>>,
    pub tile_size: f32,
    pub ground_level: Option<f32>,
    pub wave_size: Option<usize>,
    built: bool,
}

/// Marker on the level root entity so the whole tile hierarchy can be despawned before
/// loading another level.
#[derive(Component)]
pub struct LevelRoot;

/// JSON manifest describing one level: asset paths plus the world dimensions the
/// original hard-coded at scene setup.
#[derive(Asset, TypePath, Debug, Clone, Deserialize)]
pub struct LevelManifest {
    pub tilemap: String,
    pub background: String,
    pub ground_tile: String,
    pub tile_size: f32,
    pub world_width: f32,
    pub world_height: f32,
    pub wave_size: usize,
}

/// Smallest world the game will accept: one camera view. Anything narrower cannot hold
/// the actors and their oscillation ranges.
pub const MIN_WORLD_SIZE: Vec2 = Vec2::new(640.0, 480.0);

impl LevelManifest {
    /// The declared world rectangle, or `None` when it is degenerate (smaller than one
    /// camera view, or not finite) and the caller should keep the default bounds.
    pub fn world_size(&self) -> Option<Vec2> {
        let size = Vec2::new(self.world_width, self.world_height);
        let finite = size.x.is_finite() && size.y.is_finite();
        if finite && size.x >= MIN_WORLD_SIZE.x && size.y >= MIN_WORLD_SIZE.y {
            Some(size)
        } else {
            None
        }
    }
}

#[derive(Default)]
pub struct LevelManifestLoader;

#[derive(Debug)]
pub enum LevelManifestLoaderError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for LevelManifestLoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "could not read level manifest: {err}"),
            Self::Json(err) => write!(f, "could not parse level manifest: {err}"),
        }
    }
}

impl std::error::Error for LevelManifestLoaderError {}

impl From<std::io::Error> for LevelManifestLoaderError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for LevelManifestLoaderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl AssetLoader for LevelManifestLoader {
    type Asset = LevelManifest;
    type Settings = ();
    type Error = LevelManifestLoaderError;

    async fn load<'a>(
        &'a self,
        reader: &'a mut Reader<'_>,
        _settings: &'a (),
        _load_context: &'a mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn extensions(&self) -> &[&str] {
        &["level.json"]
    }
}

/// A rectangular grid of tile values parsed from CSV. `-1` is empty; any other value
/// marks a solid ground tile. Row 0 is the top of the map, as exported.
#[derive(Asset, TypePath, Debug, Clone)]
pub struct TileGrid {
    pub width: usize,
    pub height: usize,
    cells: Vec<i32>,
}

impl TileGrid {
    pub fn parse(text: &str) -> Result<Self, TileGridError> {
        let mut cells = Vec::new();
        let mut width = 0;
        let mut height = 0;

        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let row: Result<Vec<i32>, TileGridError> = line
                .split(',')
                .map(|cell| {
                    cell.trim().parse::<i32>().map_err(|_| TileGridError::BadCell {
                        line: line_no + 1,
                        cell: cell.trim().to_owned(),
                    })
                })
                .collect();
            let row = row?;

            if height == 0 {
                width = row.len();
            } else if row.len() != width {
                return Err(TileGridError::RaggedRow {
                    line: line_no + 1,
                    expected: width,
                    found: row.len(),
                });
            }

            cells.extend(row);
            height += 1;
        }

        if width == 0 || height == 0 {
            return Err(TileGridError::Empty);
        }

        Ok(Self {
            width,
            height,
            cells,
        })
    }

    pub fn value(&self, col: usize, row: usize) -> Option<i32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.cells[row * self.width + col])
    }

    pub fn is_solid(&self, col: usize, row: usize) -> bool {
        self.value(col, row).map(|value| value >= 0).unwrap_or(false)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum TileGridError {
    Empty,
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },
    BadCell {
        line: usize,
        cell: String,
    },
}

impl fmt::Display for TileGridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "tile grid is empty"),
            Self::RaggedRow {
                line,
                expected,
                found,
            } => write!(
                f,
                "row on line {line} has {found} cells, expected {expected}"
            ),
            Self::BadCell { line, cell } => {
                write!(f, "unparseable tile value '{cell}' on line {line}")
            }
        }
    }
}

impl std::error::Error for TileGridError {}

#[derive(Default)]
pub struct TileGridLoader;

#[derive(Debug)]
pub enum TileGridLoaderError {
    Io(std::io::Error),
    Utf8(Utf8Error),
    Parse(TileGridError),
}

impl fmt::Display for TileGridLoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "could not read tile grid: {err}"),
            Self::Utf8(err) => write!(f, "tile grid is not valid UTF-8: {err}"),
            Self::Parse(err) => write!(f, "invalid tile grid: {err}"),
        }
    }
}

impl std::error::Error for TileGridLoaderError {}

impl From<std::io::Error> for TileGridLoaderError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl AssetLoader for TileGridLoader {
    type Asset = TileGrid;
    type Settings = ();
    type Error = TileGridLoaderError;

    async fn load<'a>(
        &'a self,
        reader: &'a mut Reader<'_>,
        _settings: &'a (),
        _load_context: &'a mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let text = std::str::from_utf8(&bytes).map_err(TileGridLoaderError::Utf8)?;
        TileGrid::parse(text).map_err(TileGridLoaderError::Parse)
    }

    fn extensions(&self) -> &[&str] {
        &["csv"]
    }
}

fn begin_level_load(
    mut commands: Commands,
    world: Query<Entity, With<LevelRoot>>,
    asset_server: Res<AssetServer>,
    config: Res<LevelConfig>,
    mut level_assets: ResMut<LevelAssets>,
) {
    // Despawn any previously spawned level hierarchy before loading another one.
    for entity in &world {
        commands.entity(entity).despawn_recursive();
    }

    let manifest: Handle<LevelManifest> = asset_server.load(config.manifest_path.clone());
    *level_assets = LevelAssets {
        manifest: Some(manifest),
        manifest_path: Some(config.manifest_path.clone()),
        ..default()
    };
}

/// Drives the two-stage load: manifest first, then the tile grid and textures it names.
/// When everything is in memory the ground tiles and background are spawned and the game
/// moves to `Playing`. A failed load logs a warning and proceeds with placeholder state,
/// leaving an empty world rather than aborting.
fn monitor_level_loading(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut level_assets: ResMut<LevelAssets>,
    mut bounds: ResMut<WorldBounds>,
    manifests: Res<Assets<LevelManifest>>,
    grids: Res<Assets<TileGrid>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let Some(manifest_handle) = level_assets.manifest.clone() else {
        return;
    };

    match asset_server.get_load_state(manifest_handle.id()) {
        Some(LoadState::Loaded) => {}
        Some(LoadState::Failed(_)) => {
            let path = level_assets.manifest_path.as_deref().unwrap_or("<unknown>");
            warn!("Unable to load level manifest at '{path}'; starting with an empty world.");
            next_state.set(GameState::Playing);
            return;
        }
        _ => return,
    }

    let Some(manifest) = manifests.get(&manifest_handle) else {
        return;
    };

    if level_assets.grid.is_none() {
        level_assets.grid = Some(asset_server.load(manifest.tilemap.clone()));
        level_assets.background = Some(asset_server.load(manifest.background.clone()));
        level_assets.ground_tile = Some(asset_server.load(manifest.ground_tile.clone()));
        level_assets.tile_size = manifest.tile_size;
        let world_size = match manifest.world_size() {
            Some(size) => size,
            None => {
                let fallback = WorldBounds::default().size();
                warn!(
                    "Level manifest declares a degenerate world {}x{}; keeping the default {}x{}.",
                    manifest.world_width, manifest.world_height, fallback.x, fallback.y
                );
                fallback
            }
        };
        // Matches the original scene setup: actors rest at the vertical center of the map.
        level_assets.ground_level = Some(world_size.y * 0.5);
        level_assets.wave_size = Some(manifest.wave_size);
        bounds.min = Vec2::ZERO;
        bounds.max = world_size;
        return;
    }

    if level_assets.built {
        return;
    }

    let grid_handle = level_assets.grid.clone().unwrap_or_default();
    match asset_server.get_load_state(grid_handle.id()) {
        Some(LoadState::Loaded) => {}
        Some(LoadState::Failed(_)) => {
            warn!(
                "Unable to load tile grid at '{}'; starting without ground tiles.",
                manifest.tilemap
            );
            level_assets.built = true;
            next_state.set(GameState::Playing);
            return;
        }
        _ => return,
    }

    let Some(grid) = grids.get(&grid_handle) else {
        return;
    };

    spawn_level_visuals(&mut commands, &level_assets, &bounds, manifest, grid);
    level_assets.built = true;
    next_state.set(GameState::Playing);
}

fn spawn_level_visuals(
    commands: &mut Commands,
    level_assets: &LevelAssets,
    bounds: &WorldBounds,
    manifest: &LevelManifest,
    grid: &TileGrid,
) {
    let tile = manifest.tile_size;
    let background = level_assets.background.clone().unwrap_or_default();
    let ground_tile = level_assets.ground_tile.clone().unwrap_or_default();

    commands
        .spawn((
            LevelRoot,
            Name::new("LevelRoot"),
            SpatialBundle::default(),
        ))
        .with_children(|root| {
            // Background stretched across the full scroll range, behind everything.
            root.spawn((
                Name::new("Background"),
                SpriteBundle {
                    texture: background,
                    sprite: Sprite {
                        custom_size: Some(bounds.size()),
                        ..default()
                    },
                    transform: Transform::from_translation(bounds.center().extend(-10.0)),
                    ..default()
                },
            ));

            // One ground sprite per solid cell. CSV row 0 is the top of the map; rows are
            // flipped so the grid sits on the world floor, matching the collision map.
            for row in 0..grid.height {
                for col in 0..grid.width {
                    if !grid.is_solid(col, row) {
                        continue;
                    }

                    let x = (col as f32 + 0.5) * tile;
                    let y = ((grid.height - 1 - row) as f32 + 0.5) * tile;
                    root.spawn(SpriteBundle {
                        texture: ground_tile.clone(),
                        sprite: Sprite {
                            custom_size: Some(Vec2::splat(tile)),
                            ..default()
                        },
                        transform: Transform::from_translation(Vec3::new(x, y, 0.0)),
                        ..default()
                    });
                }
            }
        });

    info!(
        "Level '{}' built: {}x{} tiles, world {}x{}.",
        level_assets.manifest_path.as_deref().unwrap_or("<unknown>"),
        grid.width,
        grid.height,
        manifest.world_width,
        manifest.world_height
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rectangular_grid() {
        let grid = TileGrid::parse("-1,-1,0\n0,0,0\n").expect("grid should parse");
        assert_eq!(grid.width, 3);
        assert_eq!(grid.height, 2);
        assert!(!grid.is_solid(0, 0));
        assert!(grid.is_solid(2, 0));
        assert!(grid.is_solid(0, 1));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let grid = TileGrid::parse("0,0\n\n0,0\n").expect("grid should parse");
        assert_eq!(grid.height, 2);
    }

    #[test]
    fn out_of_range_lookup_is_empty() {
        let grid = TileGrid::parse("0,0\n").expect("grid should parse");
        assert_eq!(grid.value(5, 0), None);
        assert!(!grid.is_solid(0, 9));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = TileGrid::parse("0,0,0\n0,0\n").unwrap_err();
        assert_eq!(
            err,
            TileGridError::RaggedRow {
                line: 2,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn garbage_cells_are_rejected() {
        let err = TileGrid::parse("0,x\n").unwrap_err();
        assert!(matches!(err, TileGridError::BadCell { line: 1, .. }));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(TileGrid::parse("\n\n").unwrap_err(), TileGridError::Empty);
    }

    fn manifest(world_width: f32, world_height: f32) -> LevelManifest {
        LevelManifest {
            tilemap: "maps/level1.csv".to_owned(),
            background: "img/background2.png".to_owned(),
            ground_tile: "img/ground1x1.png".to_owned(),
            tile_size: 64.0,
            world_width,
            world_height,
            wave_size: 10,
        }
    }

    #[test]
    fn declared_world_size_is_accepted() {
        assert_eq!(
            manifest(1900.0, 480.0).world_size(),
            Some(Vec2::new(1900.0, 480.0))
        );
        // One camera view is the smallest acceptable world.
        assert_eq!(
            manifest(640.0, 480.0).world_size(),
            Some(Vec2::new(640.0, 480.0))
        );
    }

    #[test]
    fn degenerate_world_size_is_rejected() {
        // A world narrower than the camera view cannot hold a spawn range.
        assert_eq!(manifest(400.0, 480.0).world_size(), None);
        assert_eq!(manifest(1900.0, 120.0).world_size(), None);
        assert_eq!(manifest(f32::NAN, 480.0).world_size(), None);
        assert_eq!(manifest(f32::INFINITY, 480.0).world_size(), None);
        assert_eq!(manifest(-1900.0, 480.0).world_size(), None);
    }

    #[test]
    fn world_bounds_contains_edges() {
        let bounds = WorldBounds::default();
        assert!(bounds.contains(Vec2::new(0.0, 0.0)));
        assert!(bounds.contains(Vec2::new(1900.0, 480.0)));
        assert!(!bounds.contains(Vec2::new(1900.1, 100.0)));
        assert!(!bounds.contains(Vec2::new(100.0, -0.1)));
    }
}
