use std::collections::HashSet;

use bevy::math::IVec2;
use bevy::prelude::*;

use crate::level::TileGrid;

pub struct CollisionPlugin;

impl Plugin for CollisionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CollisionMap>()
            .add_systems(PostUpdate, rebuild_collision_map);
    }
}

/// Solid-tile lookup shared by every kinematic body. Tile coordinates count up from the
/// world origin (bottom-left), so CSV rows are flipped during the rebuild.
#[derive(Resource, Default)]
pub struct CollisionMap {
    pub tile_size: Vec2,
    pub origin: Vec2,
    pub solids: HashSet<IVec2>,
}

const SKIN: f32 = 0.001;

impl CollisionMap {
    pub fn clear(&mut self) {
        self.solids.clear();
    }

    pub fn is_solid(&self, tile: IVec2) -> bool {
        self.solids.contains(&tile)
    }

    /// Moves `position` horizontally by `dx`, stopping flush against the first solid
    /// tile in the way. Returns true when the motion was blocked.
    pub fn sweep_horizontal(&self, position: &mut Vec2, half: Vec2, dx: f32) -> bool {
        if dx.abs() < f32::EPSILON {
            return false;
        }
        if self.solids.is_empty() {
            position.x += dx;
            return false;
        }

        let new_x = position.x + dx;
        let bottom = position.y - half.y + SKIN;
        let top = position.y + half.y - SKIN;

        let tile_size = self.tile_size.x;
        let min_tile_y = ((bottom - self.origin.y) / self.tile_size.y).floor() as i32;
        let max_tile_y = ((top - self.origin.y) / self.tile_size.y).floor() as i32;

        if dx > 0.0 {
            let edge = new_x + half.x;
            let tile_x = ((edge - self.origin.x) / tile_size).floor() as i32;
            for ty in min_tile_y..=max_tile_y {
                if self.is_solid(IVec2::new(tile_x, ty)) {
                    let tile_left = self.origin.x + tile_x as f32 * tile_size;
                    position.x = tile_left - half.x - SKIN;
                    return true;
                }
            }
        } else {
            let edge = new_x - half.x;
            let tile_x = ((edge - self.origin.x) / tile_size).floor() as i32;
            for ty in min_tile_y..=max_tile_y {
                if self.is_solid(IVec2::new(tile_x, ty)) {
                    let tile_right = self.origin.x + (tile_x + 1) as f32 * tile_size;
                    position.x = tile_right + half.x + SKIN;
                    return true;
                }
            }
        }

        position.x = new_x;
        false
    }

    /// Moves `position` vertically by `dy`. Returns true when the motion was blocked;
    /// callers decide what happens to the velocity (the turtle zeroes it, rabbits
    /// bounce).
    pub fn sweep_vertical(&self, position: &mut Vec2, half: Vec2, dy: f32) -> bool {
        if dy.abs() < f32::EPSILON {
            return false;
        }
        if self.solids.is_empty() {
            position.y += dy;
            return false;
        }

        let new_y = position.y + dy;
        let left = position.x - half.x + SKIN;
        let right = position.x + half.x - SKIN;
        let tile_width = self.tile_size.x;
        let tile_height = self.tile_size.y;
        let min_tile_x = ((left - self.origin.x) / tile_width).floor() as i32;
        let max_tile_x = ((right - self.origin.x) / tile_width).floor() as i32;

        if dy < 0.0 {
            let edge = new_y - half.y;
            let tile_y = ((edge - self.origin.y) / tile_height).floor() as i32;
            for tx in min_tile_x..=max_tile_x {
                if self.is_solid(IVec2::new(tx, tile_y)) {
                    let tile_top = self.origin.y + (tile_y + 1) as f32 * tile_height;
                    position.y = tile_top + half.y + SKIN;
                    return true;
                }
            }
        } else {
            let edge = new_y + half.y;
            let tile_y = ((edge - self.origin.y) / tile_height).floor() as i32;
            for tx in min_tile_x..=max_tile_x {
                if self.is_solid(IVec2::new(tx, tile_y)) {
                    let tile_bottom = self.origin.y + tile_y as f32 * tile_height;
                    position.y = tile_bottom - half.y - SKIN;
                    return true;
                }
            }
        }

        position.y = new_y;
        false
    }
}

/// Rebuilds the solid set whenever a tile grid finishes loading (including hot reloads).
fn rebuild_collision_map(
    mut events: EventReader<AssetEvent<TileGrid>>,
    grids: Res<Assets<TileGrid>>,
    level_assets: Res<crate::level::LevelAssets>,
    mut map: ResMut<CollisionMap>,
) {
    let mut changed = None;
    for event in events.read() {
        match event {
            AssetEvent::LoadedWithDependencies { id } | AssetEvent::Modified { id } => {
                changed = Some(*id);
            }
            AssetEvent::Removed { .. } => {
                map.clear();
            }
            _ => {}
        }
    }

    let Some(id) = changed else {
        return;
    };
    let Some(grid) = grids.get(id) else {
        return;
    };

    map.tile_size = Vec2::splat(level_assets.tile_size.max(1.0));
    map.origin = Vec2::ZERO;
    map.solids.clear();

    for row in 0..grid.height {
        for col in 0..grid.width {
            if grid.is_solid(col, row) {
                // Flip rows: CSV row 0 is the top of the map, tile y counts up.
                let tile_y = (grid.height - 1 - row) as i32;
                map.solids.insert(IVec2::new(col as i32, tile_y));
            }
        }
    }

    if map.solids.is_empty() {
        warn!("Collision map is empty. Check that the tile grid marks ground with values >= 0.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_map() -> CollisionMap {
        // A flat floor at tile row 0 spanning ten tiles of 64px.
        let mut map = CollisionMap {
            tile_size: Vec2::splat(64.0),
            origin: Vec2::ZERO,
            solids: HashSet::new(),
        };
        for x in 0..10 {
            map.solids.insert(IVec2::new(x, 0));
        }
        map
    }

    #[test]
    fn falling_body_lands_on_floor() {
        let map = floor_map();
        let mut position = Vec2::new(100.0, 200.0);
        let half = Vec2::splat(16.0);

        let blocked = map.sweep_vertical(&mut position, half, -200.0);
        assert!(blocked);
        // Resting flush on top of the 64px floor row.
        assert!((position.y - (64.0 + 16.0)).abs() < 0.01);
    }

    #[test]
    fn free_fall_without_obstruction() {
        let map = floor_map();
        let mut position = Vec2::new(100.0, 400.0);
        let blocked = map.sweep_vertical(&mut position, Vec2::splat(16.0), -50.0);
        assert!(!blocked);
        assert_eq!(position.y, 350.0);
    }

    #[test]
    fn horizontal_run_into_wall_stops_flush() {
        let mut map = floor_map();
        // A one-tile wall at x tile 5, at body height.
        map.solids.insert(IVec2::new(5, 1));

        let mut position = Vec2::new(64.0 * 4.0, 64.0 + 16.0 + 1.0);
        let half = Vec2::splat(16.0);
        let blocked = map.sweep_horizontal(&mut position, half, 200.0);
        assert!(blocked);
        assert!(position.x <= 64.0 * 5.0 - 16.0);
    }

    #[test]
    fn empty_map_never_blocks() {
        let map = CollisionMap::default();
        let mut position = Vec2::new(10.0, 10.0);
        assert!(!map.sweep_horizontal(&mut position, Vec2::ONE, 5.0));
        assert!(!map.sweep_vertical(&mut position, Vec2::ONE, -5.0));
        assert_eq!(position, Vec2::new(15.0, 5.0));
    }

    #[test]
    fn zero_motion_is_a_no_op() {
        let map = floor_map();
        let mut position = Vec2::new(100.0, 100.0);
        assert!(!map.sweep_horizontal(&mut position, Vec2::ONE, 0.0));
        assert!(!map.sweep_vertical(&mut position, Vec2::ONE, 0.0));
        assert_eq!(position, Vec2::new(100.0, 100.0));
    }
}
