//! Cross-module behaviour of the AI over real game state.

use statecraft_ai::{
    accumulate_tech_want, ai_data_phase_init, ai_manage_buildings, ai_manage_tech, ai_select_tech,
    ai_spend_gold, base_want, refresh_city_worth, AiConfig, AiController, AiData, EffectRegistry,
};
use statecraft_core::{
    city_production_buy_gold_cost, run_turn, testkit, AiChoice, ChoiceKind, GameState,
};
use statecraft_protocol::{BuildTarget, CityId, PlayerId};

fn one_city(size: u32) -> (GameState, PlayerId, CityId) {
    let mut state = testkit::state(16, 16);
    let p = state.add_player("A", true);
    let city = testkit::found_city(&mut state, p, 5, 5);
    testkit::set_size(&mut state, city, size);
    (state, p, city)
}

#[test]
fn evaluating_a_building_leaves_no_trace() {
    let (mut state, p, city) = one_city(4);
    let mut data = AiData::default();
    ai_data_phase_init(&state, p, &mut data, &AiConfig::default());
    refresh_city_worth(&mut state, p, &data);

    let before_city = state.city(city).unwrap().clone();
    let before_wonders = state.great_wonders.clone();
    let before_player = state.player(p).unwrap().clone();
    for name in ["granary", "pyramids", "temple", "marketplace"] {
        let building = state.rules.building_id(name).unwrap();
        base_want(&mut state, &data, city, building);
    }
    assert_eq!(state.city(city).unwrap(), &before_city);
    assert_eq!(state.great_wonders, before_wonders);
    assert_eq!(state.player(p).unwrap(), &before_player);
}

#[test]
fn tech_want_is_per_city() {
    let pottery_want = |cities: &[(i32, i32)], share: i32| {
        let mut state = testkit::state(20, 20);
        let p = state.add_player("A", true);
        let pottery = state.rules.tech_id("pottery").unwrap();
        for &(q, r) in cities {
            let c = testkit::found_city(&mut state, p, q, r);
            state.city_mut(c).unwrap().ai.tech_share = vec![(pottery, share)];
        }
        let wants = accumulate_tech_want(&state, p, &AiData::default());
        let selection = ai_select_tech(&state, p, &wants);
        assert_eq!(selection.choice, Some(pottery));
        selection.choice_want
    };
    let single = pottery_want(&[(4, 4)], 100);
    let double = pottery_want(&[(4, 4), (12, 12)], 100);
    assert_eq!(single, 100);
    assert_eq!(single, double);
}

#[test]
fn goal_value_averages_over_prerequisites() {
    let (state, p, _) = one_city(1);
    let currency = state.rules.tech_id("currency").unwrap();
    let bronze = state.rules.tech_id("bronze_working").unwrap();
    let mut wants = vec![0; state.rules.techs.len()];
    wants[currency.index()] = 100;

    let selection = ai_select_tech(&state, p, &wants);
    assert_eq!(selection.choice, Some(bronze));
    assert_eq!(selection.choice_want, 100);
    assert_eq!(selection.goal_want, 100);
    assert!(matches!(selection.goal, Some(t) if t == bronze || t == currency));
}

fn research_switch(bulbs: i32) -> bool {
    let (mut state, p, city) = one_city(1);
    let alphabet = state.rules.tech_id("alphabet").unwrap();
    let burial = state.rules.tech_id("ceremonial_burial").unwrap();
    state.city_mut(city).unwrap().ai.tech_share = vec![(burial, 50)];
    {
        let research = &mut state.player_mut(p).unwrap().research;
        research.researching = Some(alphabet);
        research.changed_from = Some(alphabet);
        research.bulbs_researched = bulbs;
        research.got_tech = false;
    }
    ai_manage_tech(&mut state, p, &AiData::default());
    state.player(p).unwrap().research.researching == Some(burial)
}

#[test]
fn research_does_not_thrash() {
    assert!(!research_switch(50));
    assert!(research_switch(49));
}

#[test]
fn second_pass_in_a_turn_changes_nothing() {
    let mut state = testkit::state(20, 20);
    let p = state.add_player("A", true);
    let cities = [
        testkit::found_city(&mut state, p, 4, 4),
        testkit::found_city(&mut state, p, 8, 4),
        testkit::found_city(&mut state, p, 6, 8),
    ];
    for &c in &cities {
        testkit::set_size(&mut state, c, 3);
    }
    let config = AiConfig::default();
    let registry = EffectRegistry::standard();
    let mut data = AiData::default();
    ai_data_phase_init(&state, p, &mut data, &config);

    ai_manage_buildings(&mut state, p, &mut data, &config, &registry);
    let first: Vec<_> = cities.iter().map(|&c| state.city(c).unwrap().ai.clone()).collect();
    let wonder_city = data.wonder_city;
    ai_manage_buildings(&mut state, p, &mut data, &config, &registry);
    let second: Vec<_> = cities.iter().map(|&c| state.city(c).unwrap().ai.clone()).collect();
    assert_eq!(first, second);
    assert_eq!(data.wonder_city, wonder_city);
}

#[test]
fn expensive_purchase_is_remembered_not_made() {
    let (mut state, p, city) = one_city(3);
    let pyramids = state.rules.building_id("pyramids").unwrap();
    {
        let c = state.city_mut(city).unwrap();
        c.currently_building = BuildTarget::Improvement(pyramids);
        c.ai.choice = AiChoice::new(BuildTarget::Improvement(pyramids), 100, ChoiceKind::Building);
    }
    testkit::set_shield_stock(&mut state, city, 10);
    state.player_mut(p).unwrap().gold = 1000;
    let cost = city_production_buy_gold_cost(&state, city);
    assert!(cost > 1000);

    let mut data = AiData::default();
    ai_spend_gold(&mut state, p, &mut data, &AiConfig::default());
    assert!(!state.city(city).unwrap().did_buy);
    assert_eq!(state.player(p).unwrap().gold, 1000);
    assert_eq!(data.maxbuycost, cost);
}

#[test]
fn ai_players_survive_several_turns() {
    let mut state = testkit::state(20, 20);
    let a = state.add_player("A", true);
    let b = state.add_player("B", true);
    testkit::found_city(&mut state, a, 4, 4);
    testkit::found_city(&mut state, b, 14, 14);
    let mut ai = AiController::default();
    let start = state.turn;

    for _ in 0..6 {
        run_turn(&mut state, &mut ai);
    }
    assert_eq!(state.turn, start + 6);
    for p in [a, b] {
        let player = state.player(p).unwrap();
        assert!(player.is_alive);
        assert_eq!(player.tech_want.len(), state.rules.techs.len());
        assert!(player.research.researching.is_some() || player.research.techs_researched > 0);
        assert_eq!(state.city_count(p), 1);
        assert!(ai.data(p).is_some());
    }
}
