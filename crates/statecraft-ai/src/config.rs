//! AI tunables.

use serde::{Deserialize, Serialize};

/// Want handed to each missing tech of a wanted building is `want / (n * TECH_REQ_DIVISOR)`.
pub const TECH_REQ_DIVISOR: i32 = 1;
/// Missing prerequisite buildings get `want / (n * BUILDING_REQ_DIVISOR)`; a
/// building requirement usually hides a whole tech subtree of its own.
pub const BUILDING_REQ_DIVISOR: i32 = 4;

/// Relative weight of each city output when scoring a city.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Priorities {
    pub food: i32,
    pub shield: i32,
    pub trade: i32,
    pub gold: i32,
    pub luxury: i32,
    pub science: i32,
    pub happy: i32,
    pub unhappy: i32,
    pub angry: i32,
    pub pollution: i32,
}

impl Default for Priorities {
    fn default() -> Self {
        Self {
            food: 19,
            shield: 17,
            trade: 12,
            gold: 12,
            luxury: 1,
            science: 12,
            happy: 1,
            unhappy: 12,
            angry: 36,
            pollution: 14,
        }
    }
}

impl Priorities {
    /// Luxury and science trade places while the empire wants to celebrate.
    pub fn celebrating(self) -> Self {
        Self {
            luxury: self.science,
            science: self.luxury,
            ..self
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Building wants are recomputed every `recalc_speed` to
    /// `2 * recalc_speed - 1` turns.
    pub recalc_speed: u32,
    /// No settler purchases once the empire has this many cities, and no
    /// more founders wanted beyond it.
    pub settler_city_limit: usize,
    /// Wants above this may override the expensive-purchase guard.
    pub very_high_want: i32,
    /// Urgency above this halves the gold reserve for emergency upgrades.
    pub extreme_urgency: u32,
    pub tech_req_divisor: i32,
    pub building_req_divisor: i32,
    pub priorities: Priorities,
    /// Cities a wonder city must reach by caravan, capped by the number of
    /// cities the player has.
    pub wonder_min_downtown: u32,
    /// Caravan turns counted when measuring downtown.
    pub cluster_turns: i32,
    /// Caravan turns searched around the wonder city for helpers.
    pub wonder_helper_turns: i32,
    /// Turns a founder may walk to reach a new city site.
    pub settler_search_turns: i32,
    /// Turns looked ahead for enemy units when assessing danger.
    pub danger_turns: i32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            recalc_speed: 5,
            settler_city_limit: 6,
            very_high_want: 200,
            extreme_urgency: 2,
            tech_req_divisor: TECH_REQ_DIVISOR,
            building_req_divisor: BUILDING_REQ_DIVISOR,
            priorities: Priorities::default(),
            wonder_min_downtown: 2,
            cluster_turns: 4,
            wonder_helper_turns: 7,
            settler_search_turns: 6,
            danger_turns: 3,
        }
    }
}

impl AiConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = AiConfig::from_yaml_str("recalc_speed: 3\npriorities:\n  food: 30\n").unwrap();
        assert_eq!(config.recalc_speed, 3);
        assert_eq!(config.priorities.food, 30);
        assert_eq!(config.priorities.shield, 17);
        assert_eq!(config.building_req_divisor, 4);
    }

    #[test]
    fn celebration_swaps_science_and_luxury() {
        let p = Priorities::default().celebrating();
        assert_eq!((p.science, p.luxury), (1, 12));
        assert_eq!(p.food, 19);
    }
}
