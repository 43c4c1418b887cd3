//! Game-wide tunables loaded from the ruleset's `game.yaml`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Percent applied to every granary size.
    pub foodbox: i32,
    /// Granary sizes for the first sizes; index 0 is size 1.
    pub granary_food_ini: Vec<i32>,
    /// Granary increase per size past the end of `granary_food_ini`.
    pub granary_food_inc: i32,
    /// Percent applied to every build cost.
    pub shieldbox: i32,
    /// Percent applied to every tech cost.
    pub sciencebox: i32,
    pub base_tech_cost: i32,
    pub celebrate_size: u32,
    /// Turns between rapture growths.
    pub rapture_delay: u32,
    /// Consecutive disorder turns tolerated before a government with
    /// `RevolutionWhenUnhappy` falls.
    pub disorder_revolution_turns: u32,
    pub revolution_length: u32,
    pub city_radius: i32,
    pub angry_citizens: bool,
    /// Luxury needed to move one citizen one step up the mood ladder.
    pub happy_cost: i32,
    /// Minimum shield output of a city center tile.
    pub center_min_shield: i32,
    /// Percent of the granary kept when a city cannot grow past its size limit.
    pub aqueduct_loss: i32,
    pub start_gold: i32,
    pub start_rates: (i32, i32, i32),
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            foodbox: 100,
            granary_food_ini: vec![20],
            granary_food_inc: 10,
            shieldbox: 100,
            sciencebox: 100,
            base_tech_cost: 20,
            celebrate_size: 3,
            rapture_delay: 1,
            disorder_revolution_turns: 2,
            revolution_length: 2,
            city_radius: 2,
            angry_citizens: true,
            happy_cost: 2,
            center_min_shield: 1,
            aqueduct_loss: 0,
            start_gold: 50,
            start_rates: (40, 0, 60),
        }
    }
}

impl GameSettings {
    /// Food needed to grow from `size` to `size + 1`.
    pub fn granary_size(&self, size: u32) -> i32 {
        let size = size.max(1) as usize;
        let ini = &self.granary_food_ini;
        let base = if ini.is_empty() {
            self.granary_food_inc * size as i32
        } else if size <= ini.len() {
            ini[size - 1]
        } else {
            ini[ini.len() - 1] + self.granary_food_inc * (size - ini.len()) as i32
        };
        (base * self.foodbox / 100).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granary_grows_linearly_past_the_table() {
        let settings = GameSettings::default();
        assert_eq!(settings.granary_size(1), 20);
        assert_eq!(settings.granary_size(2), 30);
        assert_eq!(settings.granary_size(5), 60);

        let halved = GameSettings {
            foodbox: 50,
            ..GameSettings::default()
        };
        assert_eq!(halved.granary_size(3), 20);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let settings: GameSettings = serde_yaml::from_str("foodbox: 150\n").unwrap();
        assert_eq!(settings.foodbox, 150);
        assert_eq!(settings.granary_food_inc, 10);
    }
}
