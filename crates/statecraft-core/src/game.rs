use std::sync::Arc;

use statecraft_protocol::{
    Audience, BuildingId, CityId, Event, Hex, PlayerId, UnitId, UnitTypeId,
};

use crate::city::City;
use crate::entities::EntityStore;
use crate::error::GameError;
use crate::map::GameMap;
use crate::player::Player;
use crate::rng::GameRng;
use crate::rules::{CompiledRules, EffectType};
use crate::unit::Unit;

/// World-wide state of one great wonder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WonderSlot {
    #[default]
    Available,
    Built { city: CityId, owner: PlayerId },
    /// Built once and then lost; can never be built again.
    Destroyed,
}

impl WonderSlot {
    pub fn owner(self) -> Option<PlayerId> {
        match self {
            WonderSlot::Built { owner, .. } => Some(owner),
            _ => None,
        }
    }

    pub fn city(self) -> Option<CityId> {
        match self {
            WonderSlot::Built { city, .. } => Some(city),
            _ => None,
        }
    }
}

/// Symmetric war and alliance flags between every pair of players.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diplomacy {
    players: usize,
    war: Vec<bool>,
    alliance: Vec<bool>,
}

impl Diplomacy {
    pub fn new(players: usize) -> Self {
        Self {
            players,
            war: vec![false; players * players],
            alliance: vec![false; players * players],
        }
    }

    fn idx(&self, a: PlayerId, b: PlayerId) -> Option<usize> {
        let (a, b) = (a.index(), b.index());
        (a < self.players && b < self.players).then_some(a * self.players + b)
    }

    fn grow(&mut self, players: usize) {
        let mut next = Diplomacy::new(players);
        for a in 0..self.players {
            for b in 0..self.players {
                next.war[a * players + b] = self.war[a * self.players + b];
                next.alliance[a * players + b] = self.alliance[a * self.players + b];
            }
        }
        *self = next;
    }

    pub fn at_war(&self, a: PlayerId, b: PlayerId) -> bool {
        self.idx(a, b).is_some_and(|i| self.war[i])
    }

    /// A player is always allied with itself.
    pub fn allied(&self, a: PlayerId, b: PlayerId) -> bool {
        a == b || self.idx(a, b).is_some_and(|i| self.alliance[i])
    }

    pub fn set_war(&mut self, a: PlayerId, b: PlayerId, war: bool) {
        if let (Some(ab), Some(ba)) = (self.idx(a, b), self.idx(b, a)) {
            self.war[ab] = war;
            self.war[ba] = war;
            if war {
                self.alliance[ab] = false;
                self.alliance[ba] = false;
            }
        }
    }

    pub fn set_alliance(&mut self, a: PlayerId, b: PlayerId, allied: bool) {
        if let (Some(ab), Some(ba)) = (self.idx(a, b), self.idx(b, a)) {
            self.alliance[ab] = allied;
            self.alliance[ba] = allied;
            if allied {
                self.war[ab] = false;
                self.war[ba] = false;
            }
        }
    }

    pub fn any_war(&self, a: PlayerId) -> bool {
        (0..self.players).any(|b| self.at_war(a, PlayerId(b as u8)))
    }
}

#[derive(Clone, Debug)]
pub struct GameState {
    pub turn: u32,
    pub map: GameMap,
    pub rules: Arc<CompiledRules>,
    pub players: Vec<Player>,
    pub cities: EntityStore<City>,
    pub units: EntityStore<Unit>,
    pub great_wonders: Vec<WonderSlot>,
    pub diplomacy: Diplomacy,
    pub rng: GameRng,
    events: Vec<(Audience, Event)>,
}

impl GameState {
    pub fn new(mut map: GameMap, rules: Arc<CompiledRules>, seed: u64) -> Self {
        map.assign_continents(&rules);
        Self {
            turn: 1,
            map,
            great_wonders: vec![WonderSlot::Available; rules.buildings.len()],
            rules,
            players: Vec::new(),
            cities: EntityStore::default(),
            units: EntityStore::default(),
            diplomacy: Diplomacy::default(),
            rng: GameRng::seed_from_u64(seed),
            events: Vec::new(),
        }
    }

    pub fn add_player(&mut self, name: impl Into<String>, ai_control: bool) -> PlayerId {
        let id = PlayerId(self.players.len() as u8);
        let mut player = Player::new(id, name, &self.rules);
        player.ai_control = ai_control;
        self.players.push(player);
        self.diplomacy.grow(self.players.len());
        id
    }

    // ========================================================================
    // NOTIFICATIONS
    // ========================================================================

    pub fn notify(&mut self, audience: Audience, event: Event) {
        self.events.push((audience, event));
    }

    pub fn notify_player(&mut self, player: PlayerId, event: Event) {
        self.notify(Audience::Player(player), event);
    }

    pub fn take_events(&mut self) -> Vec<(Audience, Event)> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[(Audience, Event)] {
        &self.events
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.index())
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id.index())
    }

    pub fn city(&self, id: CityId) -> Option<&City> {
        self.cities.get(id)
    }

    pub fn city_mut(&mut self, id: CityId) -> Option<&mut City> {
        self.cities.get_mut(id)
    }

    pub fn city_or_err(&self, id: CityId) -> Result<&City, GameError> {
        self.cities.get(id).ok_or(GameError::UnknownCity)
    }

    pub fn city_mut_or_err(&mut self, id: CityId) -> Result<&mut City, GameError> {
        self.cities.get_mut(id).ok_or(GameError::UnknownCity)
    }

    /// Cities of `player` in founding order.
    pub fn player_cities(&self, player: PlayerId) -> Vec<CityId> {
        self.cities
            .iter_ordered()
            .filter(|(_, c)| c.owner == player)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn city_count(&self, player: PlayerId) -> usize {
        self.cities
            .iter_ordered()
            .filter(|(_, c)| c.owner == player)
            .count()
    }

    /// Units whose upkeep `city` pays, oldest first.
    pub fn supported_units(&self, city: CityId) -> Vec<UnitId> {
        self.units
            .iter_ordered()
            .filter(|(_, u)| u.home == Some(city))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn units_at(&self, hex: Hex) -> impl Iterator<Item = (UnitId, &Unit)> {
        self.units.iter_ordered().filter(move |(_, u)| u.hex == hex)
    }

    pub fn city_at(&self, hex: Hex) -> Option<CityId> {
        let idx = self.map.index_of(hex)?;
        self.map.tile(idx).city
    }

    pub fn great_wonder_owner(&self, building: BuildingId) -> Option<PlayerId> {
        self.great_wonders.get(building.index()).and_then(|w| w.owner())
    }

    pub fn great_wonder_city(&self, building: BuildingId) -> Option<CityId> {
        self.great_wonders.get(building.index()).and_then(|w| w.city())
    }

    pub fn small_wonder_city(&self, player: PlayerId, building: BuildingId) -> Option<CityId> {
        self.player(player)
            .and_then(|p| p.small_wonders.get(building.index()).copied().flatten())
    }

    /// The city holding a `CapitalCity` building, if any.
    pub fn capital(&self, player: PlayerId) -> Option<CityId> {
        let capital_buildings: Vec<BuildingId> = self
            .rules
            .effects_of_type(EffectType::CapitalCity)
            .filter_map(|e| e.reqs.iter().find_map(|r| r.building()))
            .collect();
        capital_buildings
            .iter()
            .find_map(|&b| self.small_wonder_city(player, b))
            .or_else(|| {
                self.cities
                    .iter_ordered()
                    .find(|(_, c)| {
                        c.owner == player && capital_buildings.iter().any(|&b| c.has_building(b))
                    })
                    .map(|(id, _)| id)
            })
    }

    // ========================================================================
    // UNITS
    // ========================================================================

    pub fn create_unit(
        &mut self,
        owner: PlayerId,
        unit_type: UnitTypeId,
        home: Option<CityId>,
        hex: Hex,
    ) -> UnitId {
        let unit = Unit::new(unit_type, owner, home, hex, &self.rules);
        self.units.insert(unit)
    }

    pub fn wipe_unit(&mut self, id: UnitId) -> Option<Unit> {
        self.units.remove(id)
    }

    /// Count of live units of `unit_type` owned by `player`.
    pub fn unit_type_count(&self, player: PlayerId, unit_type: UnitTypeId) -> usize {
        self.units
            .iter_ordered()
            .filter(|(_, u)| u.owner == player && u.unit_type == unit_type)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alliance_and_war_are_exclusive() {
        let mut d = Diplomacy::new(3);
        d.set_alliance(PlayerId(0), PlayerId(1), true);
        assert!(d.allied(PlayerId(1), PlayerId(0)));
        d.set_war(PlayerId(0), PlayerId(1), true);
        assert!(!d.allied(PlayerId(0), PlayerId(1)));
        assert!(d.at_war(PlayerId(1), PlayerId(0)));
        assert!(d.any_war(PlayerId(0)));
        assert!(!d.any_war(PlayerId(2)));
        assert!(d.allied(PlayerId(2), PlayerId(2)));
    }

    #[test]
    fn diplomacy_grows_with_players() {
        let mut d = Diplomacy::new(1);
        d.grow(2);
        d.set_war(PlayerId(0), PlayerId(1), true);
        d.grow(3);
        assert!(d.at_war(PlayerId(0), PlayerId(1)));
        assert!(!d.at_war(PlayerId(0), PlayerId(2)));
    }

    #[test]
    fn events_drain_once() {
        let mut state = crate::testkit::state(6, 6);
        let p = state.add_player("A", false);
        state.notify_player(p, Event::TurnStarted { turn: 1 });
        assert_eq!(state.take_events().len(), 1);
        assert!(state.take_events().is_empty());
    }
}
