use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use statecraft_protocol::{CityId, Hex, PlayerId, TerrainId};

use crate::rules::CompiledRules;

/// Continent id of a tile: positive for land masses, negative for oceans.
pub type Continent = i32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: TerrainId,
    pub owner: Option<PlayerId>,
    /// City standing on this tile.
    pub city: Option<CityId>,
    /// City whose citizen works this tile.
    pub worked_by: Option<CityId>,
    pub continent: Continent,
}

/// Rectangular axial map without wrapping. `q` is the column, `r` the row.
#[derive(Clone, Debug, PartialEq)]
pub struct GameMap {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl GameMap {
    pub fn new(width: u32, height: u32, terrain: TerrainId) -> Self {
        Self::from_terrains(width, height, vec![terrain; (width * height) as usize])
    }

    pub fn from_terrains(width: u32, height: u32, terrains: Vec<TerrainId>) -> Self {
        debug_assert_eq!(terrains.len(), (width * height) as usize);
        let tiles = terrains
            .into_iter()
            .map(|terrain| Tile {
                terrain,
                owner: None,
                city: None,
                worked_by: None,
                continent: 0,
            })
            .collect();
        Self {
            width,
            height,
            tiles,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, index: usize) -> &Tile {
        &self.tiles[index]
    }

    pub fn tile_mut(&mut self, index: usize) -> &mut Tile {
        &mut self.tiles[index]
    }

    pub fn index_of(&self, hex: Hex) -> Option<usize> {
        if hex.q < 0 || hex.r < 0 || hex.q >= self.width as i32 || hex.r >= self.height as i32 {
            return None;
        }
        Some(hex.r as usize * self.width as usize + hex.q as usize)
    }

    pub fn hex_at_index(&self, index: usize) -> Hex {
        let w = self.width as usize;
        Hex::new((index % w) as i32, (index / w) as i32)
    }

    pub fn neighbors_indices(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let hex = self.hex_at_index(index);
        hex.neighbors().filter_map(move |n| self.index_of(n))
    }

    /// Tiles within `radius` of `center`, nearest first.
    pub fn indices_in_radius(&self, center: Hex, radius: i32) -> Vec<usize> {
        center
            .within(radius)
            .into_iter()
            .filter_map(|h| self.index_of(h))
            .collect()
    }

    pub fn set_terrain(&mut self, index: usize, terrain: TerrainId) {
        self.tiles[index].terrain = terrain;
    }

    pub fn is_ocean(&self, index: usize, rules: &CompiledRules) -> bool {
        rules.terrain(self.tiles[index].terrain).ocean
    }

    /// Land tile with at least one adjacent ocean tile.
    pub fn is_coastal(&self, index: usize, rules: &CompiledRules) -> bool {
        !self.is_ocean(index, rules)
            && self
                .neighbors_indices(index)
                .any(|n| self.is_ocean(n, rules))
    }

    pub fn continent(&self, index: usize) -> Continent {
        self.tiles[index].continent
    }

    /// Flood-fill continent ids. Land masses get 1, 2, ...; oceans -1, -2, ...
    /// Returns the number of land masses.
    pub fn assign_continents(&mut self, rules: &CompiledRules) -> i32 {
        for tile in &mut self.tiles {
            tile.continent = 0;
        }
        let (mut land, mut sea) = (0, 0);
        for start in 0..self.tiles.len() {
            if self.tiles[start].continent != 0 {
                continue;
            }
            let ocean = self.is_ocean(start, rules);
            let id = if ocean {
                sea -= 1;
                sea
            } else {
                land += 1;
                land
            };
            let mut queue = VecDeque::from([start]);
            self.tiles[start].continent = id;
            while let Some(index) = queue.pop_front() {
                let next: Vec<usize> = self
                    .neighbors_indices(index)
                    .filter(|&n| self.tiles[n].continent == 0 && self.is_ocean(n, rules) == ocean)
                    .collect();
                for n in next {
                    self.tiles[n].continent = id;
                    queue.push_back(n);
                }
            }
        }
        land
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn continents_split_on_water() {
        let rules = testkit::rules();
        let grass = rules.terrain_id("grassland").expect("grassland");
        let ocean = rules.terrain_id("ocean").expect("ocean");
        let mut terrains = vec![grass; 5 * 3];
        for r in 0..3 {
            terrains[r * 5 + 2] = ocean;
        }
        let mut map = GameMap::from_terrains(5, 3, terrains);
        assert_eq!(map.assign_continents(&rules), 2);
        assert!(map.continent(0) > 0);
        assert!(map.continent(2) < 0);
        assert_ne!(map.continent(0), map.continent(4));
        assert!(map.is_coastal(1, &rules));
        assert!(!map.is_coastal(0, &rules));
    }

    #[test]
    fn radius_lookup_clips_at_edges() {
        let rules = testkit::rules();
        let grass = rules.terrain_id("grassland").expect("grassland");
        let map = GameMap::new(6, 6, grass);
        assert_eq!(map.indices_in_radius(Hex::new(3, 3), 1).len(), 7);
        assert!(map.indices_in_radius(Hex::new(0, 0), 2).len() < 19);
    }
}
