use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use statecraft_protocol::{BuildTarget, BuildingId, Hex, Outputs, PlayerId, TechId};

use crate::rules::CompiledRules;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citizens {
    pub happy: u32,
    pub content: u32,
    pub unhappy: u32,
    pub angry: u32,
}

impl Citizens {
    pub fn total(&self) -> u32 {
        self.happy + self.content + self.unhappy + self.angry
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specialists {
    pub entertainers: u32,
    pub taxmen: u32,
    pub scientists: u32,
}

impl Specialists {
    pub fn total(&self) -> u32 {
        self.entertainers + self.taxmen + self.scientists
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityOptions {
    /// Building a unit whose population cost equals the city size disbands
    /// the whole city into that unit.
    pub disband_on_build: bool,
}

// ============================================================================
// AI SCRATCH STATE
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceKind {
    #[default]
    None,
    Building,
    Attacker,
    Defender,
    NonMilitary,
}

impl ChoiceKind {
    pub fn is_unit(self) -> bool {
        matches!(
            self,
            ChoiceKind::Attacker | ChoiceKind::Defender | ChoiceKind::NonMilitary
        )
    }
}

/// A build recommendation. `want == 0` means no preference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiChoice {
    pub target: Option<BuildTarget>,
    pub want: i32,
    pub kind: ChoiceKind,
}

impl AiChoice {
    pub fn new(target: BuildTarget, want: i32, kind: ChoiceKind) -> Self {
        Self {
            target: Some(target),
            want,
            kind,
        }
    }

    pub fn clear(&mut self) {
        *self = AiChoice::default();
    }

    /// Keep whichever of the two has the higher want.
    pub fn copy_if_better(&mut self, other: &AiChoice) {
        if other.want > self.want {
            *self = *other;
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CityAi {
    /// Desire for each building type, indexed by building.
    pub building_want: Vec<i32>,
    pub choice: AiChoice,
    pub danger: i32,
    pub urgency: u32,
    pub grave_danger: u32,
    /// Defence strength currently in the city.
    pub defense: i32,
    pub next_recalc: u32,
    pub recalc_interval: u32,
    /// Cached output-model score of the city as it stands.
    pub worth: i32,
    /// Friendly cities a caravan could reach from here.
    pub downtown: u32,
    /// Caravan turns to the wonder city, or -1 when unreachable.
    pub distance_to_wonder_city: i32,
    /// Tech desire contributed by this city at its last recalc.
    pub tech_share: Vec<(TechId, i32)>,
    /// Best new-city site a founder from here could reach.
    pub settler_want: i32,
}

// ============================================================================
// CITY
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct City {
    pub name: String,
    pub owner: PlayerId,
    pub original_owner: PlayerId,
    pub hex: Hex,
    pub tile: usize,
    pub size: u32,
    pub food_stock: i32,
    pub shield_stock: i32,

    /// Worked tiles other than the center.
    pub worked: Vec<usize>,
    pub specialists: Specialists,
    pub citizens: Citizens,

    pub prod: Outputs,
    pub surplus: Outputs,
    pub waste: Outputs,
    pub usage: Outputs,
    pub pollution: i32,

    /// Which buildings stand here, indexed by building.
    pub built: Vec<bool>,
    pub currently_building: BuildTarget,
    pub worklist: VecDeque<BuildTarget>,
    pub options: CityOptions,

    pub before_change_shields: i32,
    pub disbanded_shields: i32,
    pub caravan_shields: i32,
    pub last_turns_shield_surplus: i32,
    pub changed_from: BuildTarget,
    pub turn_last_built: u32,
    pub turn_founded: u32,
    pub did_buy: bool,
    pub did_sell: bool,

    /// Consecutive celebration turns.
    pub rapture: u32,
    /// Consecutive disorder turns.
    pub anarchy: u32,
    pub was_happy: bool,

    pub ai: CityAi,
}

impl City {
    pub fn new(
        name: impl Into<String>,
        owner: PlayerId,
        hex: Hex,
        tile: usize,
        first_target: BuildTarget,
        rules: &CompiledRules,
        turn: u32,
    ) -> Self {
        Self {
            name: name.into(),
            owner,
            original_owner: owner,
            hex,
            tile,
            size: 1,
            food_stock: 0,
            shield_stock: 0,
            worked: Vec::new(),
            specialists: Specialists::default(),
            citizens: Citizens::default(),
            prod: Outputs::ZERO,
            surplus: Outputs::ZERO,
            waste: Outputs::ZERO,
            usage: Outputs::ZERO,
            pollution: 0,
            built: vec![false; rules.buildings.len()],
            currently_building: first_target,
            worklist: VecDeque::new(),
            options: CityOptions::default(),
            before_change_shields: 0,
            disbanded_shields: 0,
            caravan_shields: 0,
            last_turns_shield_surplus: 0,
            changed_from: first_target,
            turn_last_built: turn,
            turn_founded: turn,
            did_buy: false,
            did_sell: false,
            rapture: 0,
            anarchy: 0,
            was_happy: false,
            ai: CityAi {
                building_want: vec![0; rules.buildings.len()],
                distance_to_wonder_city: -1,
                ..CityAi::default()
            },
        }
    }

    #[inline]
    pub fn has_building(&self, id: BuildingId) -> bool {
        self.built.get(id.index()).copied().unwrap_or(false)
    }

    pub fn buildings(&self) -> impl Iterator<Item = BuildingId> + '_ {
        self.built
            .iter()
            .enumerate()
            .filter(|(_, &b)| b)
            .map(|(i, _)| BuildingId::new(i as u16))
    }

    /// Citizens working tiles (the center tile is free).
    pub fn workers(&self) -> u32 {
        self.size.saturating_sub(self.specialists.total())
    }

    /// Disorder: unhappy (angry count double) outnumber happy.
    pub fn is_unhappy(&self) -> bool {
        self.citizens.happy < self.citizens.unhappy + 2 * self.citizens.angry
    }

    /// Half or more happy, nobody unhappy, and big enough to celebrate.
    pub fn is_happy(&self, celebrate_size: u32) -> bool {
        self.size >= celebrate_size
            && self.citizens.happy >= (self.size + 1) / 2
            && self.citizens.unhappy == 0
            && self.citizens.angry == 0
    }

    pub fn is_celebrating(&self, celebrate_size: u32) -> bool {
        self.size >= celebrate_size && self.was_happy
    }

    pub fn built_last_turn(&self, turn: u32) -> bool {
        self.turn_last_built + 1 >= turn
    }

    /// Something has to give this turn: shields, food or order.
    pub fn is_emergency(&self) -> bool {
        self.surplus.shield < 0 || self.is_unhappy() || self.food_stock + self.surplus.food < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn better_choice_wins() {
        let rules = testkit::rules();
        let temple = rules.building_id("temple").unwrap();
        let warriors = rules.unit_type_id("warriors").unwrap();
        let mut choice = AiChoice::new(BuildTarget::Improvement(temple), 40, ChoiceKind::Building);
        choice.copy_if_better(&AiChoice::new(
            BuildTarget::Unit(warriors),
            30,
            ChoiceKind::Defender,
        ));
        assert_eq!(choice.want, 40);
        choice.copy_if_better(&AiChoice::new(
            BuildTarget::Unit(warriors),
            41,
            ChoiceKind::Defender,
        ));
        assert_eq!(choice.target, Some(BuildTarget::Unit(warriors)));
        assert!(choice.kind.is_unit());
    }

    #[test]
    fn disorder_counts_angry_twice() {
        let rules = testkit::rules();
        let warriors = rules.unit_type_id("warriors").unwrap();
        let mut city = City::new(
            "Test",
            PlayerId(0),
            Hex::ORIGIN,
            0,
            BuildTarget::Unit(warriors),
            &rules,
            1,
        );
        city.size = 4;
        city.citizens = Citizens {
            happy: 2,
            content: 1,
            unhappy: 0,
            angry: 1,
        };
        assert!(!city.is_unhappy());
        city.citizens.happy = 1;
        city.citizens.content = 2;
        assert!(city.is_unhappy());
    }
}
