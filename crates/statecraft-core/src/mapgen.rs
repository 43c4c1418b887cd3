//! Deterministic hex map generation for headless games.
//!
//! Layered value noise decides elevation and moisture; latitude decides
//! temperature. The same rules, config and seed always give the same map.

use statecraft_protocol::{Hex, TerrainId};

use crate::map::GameMap;
use crate::rng::GameRng;
use crate::rules::CompiledRules;

#[derive(Clone, Debug, PartialEq)]
pub struct MapGenConfig {
    pub width: u32,
    pub height: u32,
    pub num_players: u32,
    /// Share of tiles below sea level (0.0-1.0).
    pub water_ratio: f32,
    /// How rough the land is (0.0-1.0).
    pub elevation_variance: f32,
}

impl Default for MapGenConfig {
    fn default() -> Self {
        Self {
            width: 40,
            height: 24,
            num_players: 2,
            water_ratio: 0.35,
            elevation_variance: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct TerrainPalette {
    grassland: TerrainId,
    plains: TerrainId,
    desert: TerrainId,
    tundra: TerrainId,
    forest: TerrainId,
    hills: TerrainId,
    mountains: TerrainId,
    ocean: TerrainId,
}

impl TerrainPalette {
    fn from_rules(rules: &CompiledRules) -> Self {
        let grassland = rules
            .terrain_id("grassland")
            .unwrap_or_else(|| TerrainId::new(0));
        let plains = rules.terrain_id("plains").unwrap_or(grassland);
        let hills = rules.terrain_id("hills").unwrap_or(plains);
        Self {
            grassland,
            plains,
            desert: rules.terrain_id("desert").unwrap_or(plains),
            tundra: rules.terrain_id("tundra").unwrap_or(plains),
            forest: rules.terrain_id("forest").unwrap_or(plains),
            hills,
            mountains: rules.terrain_id("mountains").unwrap_or(hills),
            ocean: rules.terrain_id("ocean").unwrap_or(grassland),
        }
    }
}

pub struct GeneratedMap {
    pub map: GameMap,
    /// One suggested city site per player, spread apart.
    pub start_positions: Vec<Hex>,
}

pub fn generate_map(rules: &CompiledRules, config: &MapGenConfig, seed: u64) -> GeneratedMap {
    let mut rng = GameRng::seed_from_u64(seed);
    let palette = TerrainPalette::from_rules(rules);
    let (width, height) = (config.width.max(1), config.height.max(1));

    let elevation = noise_layer(width, height, &mut rng, 4, 0.55);
    let moisture = noise_layer(width, height, &mut rng, 3, 0.5);
    let sea_level = percentile(&elevation, config.water_ratio.clamp(0.0, 1.0));

    let mut terrains = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        // 1 at the equator, 0 at the poles.
        let lat = (y as f32 + 0.5) / height as f32 * 2.0 - 1.0;
        let temperature = 1.0 - lat.abs();
        for x in 0..width {
            let idx = (y * width + x) as usize;
            terrains.push(pick_terrain(
                palette,
                elevation[idx],
                moisture[idx],
                temperature,
                sea_level,
                config.elevation_variance,
            ));
        }
    }

    let mut map = GameMap::from_terrains(width, height, terrains);
    map.assign_continents(rules);
    let start_positions = find_start_positions(rules, &map, config.num_players);
    GeneratedMap {
        map,
        start_positions,
    }
}

fn unit_f32(rng: &mut GameRng) -> f32 {
    (rng.next_u32() >> 8) as f32 / (1u32 << 24) as f32
}

/// Octaves of bilinearly interpolated lattice noise, normalized to 0..1.
fn noise_layer(width: u32, height: u32, rng: &mut GameRng, octaves: u32, persistence: f32) -> Vec<f32> {
    let mut result = vec![0.0f32; (width * height) as usize];
    let mut amplitude = 1.0f32;
    let mut total = 0.0f32;

    for octave in 0..octaves {
        let cells = 2u32 << octave;
        let grid_w = cells + 1;
        let grid_h = cells + 1;
        let lattice: Vec<f32> = (0..grid_w * grid_h).map(|_| unit_f32(rng)).collect();
        let at = |gx: u32, gy: u32| lattice[(gy.min(grid_h - 1) * grid_w + gx.min(grid_w - 1)) as usize];

        for y in 0..height {
            for x in 0..width {
                let fx = x as f32 / width as f32 * cells as f32;
                let fy = y as f32 / height as f32 * cells as f32;
                let (x0, y0) = (fx.floor() as u32, fy.floor() as u32);
                let (sx, sy) = (smooth(fx - x0 as f32), smooth(fy - y0 as f32));
                let top = lerp(at(x0, y0), at(x0 + 1, y0), sx);
                let bottom = lerp(at(x0, y0 + 1), at(x0 + 1, y0 + 1), sx);
                result[(y * width + x) as usize] += lerp(top, bottom, sy) * amplitude;
            }
        }
        total += amplitude;
        amplitude *= persistence;
    }

    for v in &mut result {
        *v /= total;
    }
    result
}

fn smooth(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn percentile(values: &[f32], fraction: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((fraction * sorted.len() as f32) as usize).min(sorted.len() - 1);
    sorted[idx]
}

fn pick_terrain(
    palette: TerrainPalette,
    elevation: f32,
    moisture: f32,
    temperature: f32,
    sea_level: f32,
    variance: f32,
) -> TerrainId {
    if elevation < sea_level {
        return palette.ocean;
    }
    let land = 1.0 - sea_level;
    if elevation > sea_level + land * (0.85 - variance * 0.25) {
        return palette.mountains;
    }
    if elevation > sea_level + land * (0.7 - variance * 0.2) {
        return palette.hills;
    }
    if temperature < 0.15 {
        return palette.tundra;
    }
    match (temperature > 0.75, moisture) {
        (true, m) if m < 0.35 => palette.desert,
        (_, m) if m > 0.65 => palette.forest,
        (_, m) if m > 0.45 => palette.grassland,
        _ => palette.plains,
    }
}

/// Food and shields a city could draw from around `index`.
fn site_score(rules: &CompiledRules, map: &GameMap, index: usize) -> i32 {
    let center = map.hex_at_index(index);
    map.indices_in_radius(center, rules.game.city_radius)
        .into_iter()
        .map(|t| {
            let out = rules.terrain(map.tile(t).terrain).output;
            out.food * 3 + out.shield * 2 + out.trade
        })
        .sum()
}

/// Best sites first, each at least `spacing` from the ones already taken.
/// Spacing shrinks until every player has a site or no land is left.
fn find_start_positions(rules: &CompiledRules, map: &GameMap, players: u32) -> Vec<Hex> {
    let mut candidates: Vec<(i32, usize)> = (0..map.len())
        .filter(|&i| !map.is_ocean(i, rules))
        .map(|i| (site_score(rules, map, i), i))
        .collect();
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut spacing = (map.width().max(map.height()) as i32 / players.max(1) as i32).max(3);
    loop {
        let mut picked: Vec<Hex> = Vec::new();
        for &(_, idx) in &candidates {
            if picked.len() as u32 >= players {
                break;
            }
            let hex = map.hex_at_index(idx);
            if picked.iter().all(|p| p.distance(hex) >= spacing) {
                picked.push(hex);
            }
        }
        if picked.len() as u32 >= players || spacing <= 2 {
            return picked;
        }
        spacing -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn same_seed_same_map() {
        let rules = testkit::rules();
        let config = MapGenConfig::default();
        let a = generate_map(&rules, &config, 7);
        let b = generate_map(&rules, &config, 7);
        assert_eq!(a.map, b.map);
        assert_eq!(a.start_positions, b.start_positions);
    }

    #[test]
    fn water_ratio_is_roughly_respected() {
        let rules = testkit::rules();
        let config = MapGenConfig {
            water_ratio: 0.4,
            ..MapGenConfig::default()
        };
        let generated = generate_map(&rules, &config, 3);
        let map = &generated.map;
        let water = (0..map.len()).filter(|&i| map.is_ocean(i, &rules)).count();
        let share = water as f32 / map.len() as f32;
        assert!((0.3..=0.5).contains(&share), "water share {share}");
    }

    #[test]
    fn start_positions_are_on_land_and_apart() {
        let rules = testkit::rules();
        let config = MapGenConfig {
            num_players: 4,
            ..MapGenConfig::default()
        };
        let generated = generate_map(&rules, &config, 11);
        assert_eq!(generated.start_positions.len(), 4);
        for (i, a) in generated.start_positions.iter().enumerate() {
            let idx = generated.map.index_of(*a).unwrap();
            assert!(!generated.map.is_ocean(idx, &rules));
            for b in &generated.start_positions[i + 1..] {
                assert!(a.distance(*b) >= 2);
            }
        }
    }
}
