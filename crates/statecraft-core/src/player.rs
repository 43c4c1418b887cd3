use serde::{Deserialize, Serialize};
use statecraft_protocol::{CityId, GovernmentId, PlayerId, TechId};

use crate::rules::CompiledRules;

/// Percent split of trade into gold, luxury and science. Always sums to 100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRates {
    pub tax: i32,
    pub lux: i32,
    pub sci: i32,
}

impl TaxRates {
    pub fn new(tax: i32, lux: i32, sci: i32) -> Self {
        debug_assert_eq!(tax + lux + sci, 100);
        Self { tax, lux, sci }
    }

    /// Clamp tax and science to `max_rate`, moving the excess into luxury.
    pub fn clamped(self, max_rate: i32) -> Self {
        let max_rate = max_rate.clamp(0, 100);
        let tax = self.tax.min(max_rate);
        let sci = self.sci.min(max_rate);
        Self {
            tax,
            sci,
            lux: 100 - tax - sci,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Research {
    pub researching: Option<TechId>,
    pub goal: Option<TechId>,
    pub bulbs_researched: i32,
    /// A tech was completed this turn; switching is free.
    pub got_tech: bool,
    /// Target at the start of the turn, for free switch-back.
    pub changed_from: Option<TechId>,
    pub bulbs_before_change: i32,
    pub techs_researched: u32,
}

impl Default for Research {
    fn default() -> Self {
        Self {
            researching: None,
            goal: None,
            bulbs_researched: 0,
            got_tech: false,
            changed_from: None,
            bulbs_before_change: 0,
            techs_researched: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spaceship {
    pub structurals: u32,
    pub components: u32,
    pub modules: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handicap {
    /// Player is away: keep production unless forced to change.
    Away,
    /// Cannot set tax rates freely.
    Rates,
    /// Does not see far-away threats.
    Fog,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handicaps(u32);

impl Handicaps {
    pub fn has(self, h: Handicap) -> bool {
        self.0 & (1 << h as u32) != 0
    }

    pub fn with(self, h: Handicap) -> Self {
        Self(self.0 | (1 << h as u32))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_alive: bool,
    pub ai_control: bool,
    pub barbarian: bool,
    pub gold: i32,
    pub rates: TaxRates,
    pub government: GovernmentId,
    pub target_government: Option<GovernmentId>,
    pub revolution_finishes: Option<u32>,
    pub known_techs: Vec<bool>,
    pub research: Research,
    /// Accumulated research desire per tech. Rebuilt every AI turn.
    pub tech_want: Vec<i32>,
    /// Holder of each small wonder, indexed by building.
    pub small_wonders: Vec<Option<CityId>>,
    pub spaceship: Spaceship,
    pub handicaps: Handicaps,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, rules: &CompiledRules) -> Self {
        let government = rules
            .government_id("despotism")
            .unwrap_or_else(|| GovernmentId::new(0));
        let (tax, lux, sci) = rules.game.start_rates;
        Self {
            id,
            name: name.into(),
            is_alive: true,
            ai_control: false,
            barbarian: false,
            gold: rules.game.start_gold,
            rates: TaxRates::new(tax, lux, sci),
            government,
            target_government: None,
            revolution_finishes: None,
            known_techs: vec![false; rules.techs.len()],
            research: Research::default(),
            tech_want: vec![0; rules.techs.len()],
            small_wonders: vec![None; rules.buildings.len()],
            spaceship: Spaceship::default(),
            handicaps: Handicaps::default(),
        }
    }

    #[inline]
    pub fn knows(&self, tech: TechId) -> bool {
        self.known_techs.get(tech.index()).copied().unwrap_or(false)
    }

    /// All prerequisites known and the tech itself unknown.
    pub fn can_research(&self, rules: &CompiledRules, tech: TechId) -> bool {
        !self.knows(tech) && rules.tech(tech).reqs.iter().all(|&r| self.knows(r))
    }

    pub fn known_count(&self) -> usize {
        self.known_techs.iter().filter(|&&k| k).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_clamp_into_luxury() {
        let r = TaxRates::new(30, 0, 70).clamped(60);
        assert_eq!(r, TaxRates::new(30, 10, 60));
        let anarchy = TaxRates::new(40, 0, 60).clamped(0);
        assert_eq!(anarchy, TaxRates::new(0, 100, 0));
    }

    #[test]
    fn handicap_bits_are_independent() {
        let h = Handicaps::default().with(Handicap::Away);
        assert!(h.has(Handicap::Away));
        assert!(!h.has(Handicap::Rates));
    }
}
