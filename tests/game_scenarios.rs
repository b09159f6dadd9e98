//! Multi-turn rules-engine scenarios.
//!
//! These drive whole games through the public `Game` API and check the
//! acceptance behaviors: collisions, step budgets, duplicate orders,
//! treasure economy, bermuda zones and end-of-game reasons.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use armada::game::{Game, GameConfig, Location, MapData, PowerupEffect};
use armada::ReplayData;
use serde_json::{json, Value};

fn build_game(map_text: &str, config: GameConfig) -> Game {
    let map = MapData::parse(map_text).expect("map parses");
    let names = vec!["bot0".to_string(), "bot1".to_string()];
    Game::new(&map, config, &names).expect("game builds")
}

fn corners_map() -> &'static str {
    "rows 10\ncols 10\nplayers 2\n\
     m a.........\nm ..........\nm ..........\nm ..........\nm ..........\n\
     m ..........\nm ..........\nm ..........\nm ..........\nm .........b\n"
}

fn move_order(pirate: usize, row: i32, col: i32) -> Value {
    json!({
        "type": "order",
        "order_type": "move",
        "acting_pirate": pirate,
        "order_args": {"destination": [row, col]},
    })
}

fn attack_order(pirate: usize, target: usize) -> Value {
    json!({
        "type": "order",
        "order_type": "attack",
        "acting_pirate": pirate,
        "order_args": {"target": target},
    })
}

#[test]
fn turn_limit_game_ends_in_tie() {
    let config = GameConfig {
        turns: 12,
        ..GameConfig::default()
    };
    let mut game = build_game(corners_map(), config);

    for _ in 0..game.max_turns() {
        game.start_turn();
        game.finish_turn();
        assert!(!game.game_over());
    }
    game.finish_game();

    let reason = game.end_of_game_reason.clone().unwrap();
    assert!(reason.starts_with("Turn limit reached"));
    assert!(reason.contains("there is no winner"));
    assert_eq!(game.scores(), vec![0, 0]);
    // both lead with equal scores: a tie, two leaders
    assert_eq!(game.get_winner().len(), 2);
}

#[test]
fn simultaneous_move_into_same_square_kills_both() {
    let mut game = build_game("rows 3\ncols 3\nplayers 2\nm a.b\nm ...\nm ...\n", GameConfig::default());
    game.start_turn();
    let report_a = game.submit_orders(0, &[move_order(0, 0, 1)]);
    let report_b = game.submit_orders(1, &[move_order(0, 0, 1)]);
    assert_eq!(report_a.valid.len(), 1);
    assert_eq!(report_b.valid.len(), 1);
    game.finish_turn();

    assert!(game.players[0].living.is_empty());
    assert!(game.players[1].living.is_empty());

    // the replay attributes both deaths to the collision
    let replay = ReplayData::from_game(&game);
    let collision_deaths = replay
        .pirates
        .iter()
        .filter(|p| p.reason_of_death == Some('c'))
        .count();
    assert_eq!(collision_deaths, 2);
}

#[test]
fn passing_through_a_square_does_not_collide() {
    // player 0 moves two steps east through (0, 1); player 1 stops at (0, 1)
    let mut game = build_game(
        "rows 2\ncols 4\nplayers 2\nm a...\nm ...b\n",
        GameConfig::default(),
    );
    game.start_turn();
    game.submit_orders(0, &[move_order(0, 0, 2)]);
    game.submit_orders(1, &[move_order(0, 0, 1)]);
    game.finish_turn();

    // destinations differ, so both survive even though paths crossed
    assert_eq!(game.players[0].living[0].location, Location::new(0, 2));
    assert_eq!(game.players[1].living[0].location, Location::new(0, 1));
}

#[test]
fn step_budget_overrun_invalidates_accepted_moves() {
    let config = GameConfig {
        actions_per_turn: 4,
        ..GameConfig::default()
    };
    let mut game = build_game(
        "rows 10\ncols 10\nplayers 2\n\
         m a........b\nm ..........\nm ..........\nm ..........\nm ..........\n\
         m ..........\nm ..........\nm ..........\nm ..........\nm a........b\n",
        config,
    );
    game.start_turn();
    let report = game.submit_orders(0, &[move_order(0, 0, 3), move_order(1, 9, 3)]);

    // 3 + 3 steps against a budget of 4: the overrun is invalid and the
    // already-accepted first move is retroactively invalidated with it
    assert!(report.valid.is_empty());
    assert_eq!(report.invalid.len(), 2);
    assert!(report.invalid.iter().all(|m| m.contains("is invalid")));
}

#[test]
fn within_budget_move_is_accepted() {
    let config = GameConfig {
        actions_per_turn: 4,
        ..GameConfig::default()
    };
    let mut game = build_game(corners_map(), config);
    game.start_turn();
    let report = game.submit_orders(0, &[move_order(0, 0, 4)]);
    assert_eq!(report.valid.len(), 1);
    assert!(report.invalid.is_empty());
}

#[test]
fn two_orders_for_one_pirate_are_both_ignored() {
    let mut game = build_game(corners_map(), GameConfig::default());
    game.start_turn();
    let report = game.submit_orders(
        0,
        &[
            move_order(0, 0, 1),
            json!({
                "type": "order",
                "order_type": "defense",
                "acting_pirate": 0,
                "order_args": {},
            }),
        ],
    );
    assert!(report.valid.is_empty());
    assert!(report.invalid.is_empty());
    assert_eq!(report.ignored.len(), 2);
}

#[test]
fn attack_while_carrying_treasure_is_ignored() {
    let mut game = build_game(
        "rows 1\ncols 4\nplayers 2\nm a$.b\n",
        GameConfig::default(),
    );

    // pick the treasure up
    game.start_turn();
    game.submit_orders(0, &[move_order(0, 0, 1)]);
    game.finish_turn();
    assert!(game.players[0].living[0].has_treasure());

    // an attack from the carrier is ignored and the treasure stays
    game.start_turn();
    let report = game.submit_orders(0, &[attack_order(0, 0)]);
    assert!(report.valid.is_empty());
    assert_eq!(report.ignored.len(), 1);
    assert!(report.ignored[0].contains("carrying a treasure"));
    game.finish_turn();
    assert!(game.players[0].living[0].has_treasure());
}

#[test]
fn drunk_pirate_cannot_act_and_sobers_up() {
    let config = GameConfig {
        turns_to_sober: 2,
        ..GameConfig::default()
    };
    let mut game = build_game("rows 1\ncols 4\nplayers 2\nm a..b\n", config);

    game.start_turn();
    game.submit_orders(0, &[attack_order(0, 0)]);
    game.finish_turn();
    assert!(game.players[1].living[0].is_drunk());

    // the drunk target's orders are invalid while intoxicated
    game.start_turn();
    let report = game.submit_orders(1, &[move_order(0, 0, 2)]);
    assert_eq!(report.invalid.len(), 1);
    assert!(report.invalid[0].contains("drunk"));
    game.finish_turn();

    game.start_turn();
    game.finish_turn();
    assert!(!game.players[1].living[0].is_drunk());
}

#[test]
fn bermuda_zone_kills_intruders_until_expired() {
    let config = GameConfig {
        required_scripts_num: 1,
        bermuda_zone_radius2: 2,
        bermuda_zone_active_turns: 2,
        spawn_turns: 30,
        ..GameConfig::default()
    };
    // enemy spawn corners are far outside the little zone's radius
    let mut game = build_game(corners_map(), config);
    game.players[0].num_scripts = 1;

    game.start_turn();
    let report = game.submit_orders(
        0,
        &[json!({
            "type": "order",
            "order_type": "bermuda",
            "acting_pirate": 0,
            "order_args": {},
        })],
    );
    assert_eq!(report.valid.len(), 1);
    game.finish_turn();

    assert_eq!(game.bermuda_zones.len(), 1);
    assert_eq!(game.players[0].num_scripts, 0);

    // walk the enemy into the zone: it dies to the zone effect
    let victim = &mut game.players[1].living[0];
    victim.location = Location::new(1, 1);
    game.start_turn();
    game.finish_turn();
    assert!(game.players[1].living.is_empty());
    assert_eq!(
        game.players[1].dead[0].reason_of_death.map(|r| r.code()),
        Some('b')
    );
}

#[test]
fn summoning_without_scripts_is_invalid() {
    let mut game = build_game(corners_map(), GameConfig::default());
    game.start_turn();
    let report = game.submit_orders(
        0,
        &[json!({
            "type": "order",
            "order_type": "bermuda",
            "acting_pirate": 0,
            "order_args": {},
        })],
    );
    assert_eq!(report.invalid.len(), 1);
    assert!(report.invalid[0].contains("not enough scripts"));
}

#[test]
fn script_pickup_raises_and_anti_script_lowers_the_counter() {
    let mut game = build_game(
        "rows 1\ncols 6\nplayers 2\nscript 0 1 0 100\nanti_script 0 2 0 100\nm a....b\n",
        GameConfig::default(),
    );

    game.start_turn();
    game.submit_orders(0, &[move_order(0, 0, 1)]);
    game.finish_turn();
    assert_eq!(game.players[0].num_scripts, 1);

    game.start_turn();
    game.submit_orders(0, &[move_order(0, 0, 2)]);
    game.finish_turn();
    assert_eq!(game.players[0].num_scripts, 0);

    // the consumed pickups are gone from the map
    assert!(!game.scripts[0].is_on_map(game.turn));
    assert!(!game.anti_scripts[0].is_on_map(game.turn));
}

#[test]
fn speed_powerup_expires_back_to_baseline() {
    let config = GameConfig {
        actions_per_turn: 10,
        ..GameConfig::default()
    };
    let mut game = build_game(
        "rows 1\ncols 8\nplayers 2\npowerup s 0 1 0 100 2 3\nm a......b\n",
        config,
    );
    assert!(matches!(
        game.powerups[0].effect,
        PowerupEffect::Speed { carry_treasure_speed: 3 }
    ));

    game.start_turn();
    game.submit_orders(0, &[move_order(0, 0, 1)]);
    game.finish_turn();
    let pirate = &game.players[0].living[0];
    assert_eq!(pirate.carry_treasure_speed, 3);
    assert!(pirate.powerups.contains(&"speed".to_string()));

    // two active turns tick down, then the boost reverts
    game.start_turn();
    game.finish_turn();
    game.start_turn();
    game.finish_turn();
    game.start_turn();
    game.finish_turn();
    let pirate = &game.players[0].living[0];
    assert_eq!(pirate.carry_treasure_speed, 1);
    assert!(!pirate.powerups.contains(&"speed".to_string()));
}

#[test]
fn cloak_rules_per_turn() {
    let cloak = |pirate: usize| {
        json!({
            "type": "order",
            "order_type": "cloak",
            "acting_pirate": pirate,
            "order_args": {},
        })
    };
    let mut game = build_game(
        "rows 1\ncols 6\nplayers 2\nm aa..bb\n",
        GameConfig::default(),
    );

    // only one cloak is accepted per player per turn
    game.start_turn();
    let report = game.submit_orders(0, &[cloak(0), cloak(1)]);
    assert_eq!(report.valid.len(), 1);
    assert_eq!(report.invalid.len(), 1);
    assert!(report.invalid[0].contains("already cloaked this turn"));
    game.finish_turn();
    // the cloak went up and ticked once
    assert_eq!(
        game.players[0].living_pirate(0).unwrap().cloak_turns,
        game.config.cloak_duration - 1
    );

    // cloaking an already invisible pirate is ignored
    game.start_turn();
    let report = game.submit_orders(0, &[cloak(0)]);
    assert!(report.valid.is_empty());
    assert_eq!(report.ignored.len(), 1);
    assert!(report.ignored[0].contains("already invisible"));
}

#[test]
fn replay_scores_reproduce_live_ranking() {
    let mut game = build_game(
        "rows 1\ncols 4\nplayers 2\nm a$.b\n",
        GameConfig::default(),
    );

    // player 0 banks one treasure
    game.start_turn();
    game.submit_orders(0, &[move_order(0, 0, 1)]);
    game.finish_turn();
    game.start_turn();
    game.submit_orders(0, &[move_order(0, 0, 0)]);
    game.finish_turn();
    game.finish_game();

    let live_scores = game.scores();
    let replay = ReplayData::from_game(&game);
    let replayed: Vec<i32> = replay
        .scores
        .iter()
        .map(|history| history.last().copied().unwrap())
        .collect();
    assert_eq!(replayed, live_scores);

    let rank_of = |scores: &[i32]| -> Vec<usize> {
        let mut sorted: Vec<i32> = scores.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        scores
            .iter()
            .map(|s| sorted.iter().position(|x| x == s).unwrap())
            .collect()
    };
    assert_eq!(rank_of(&replayed), rank_of(&live_scores));
    assert_eq!(rank_of(&live_scores), vec![0, 1]);
}

#[test]
fn wraparound_map_allows_edge_moves() {
    let mut game = build_game(
        "rows 4\ncols 4\nplayers 2\ncyclic 1\nm a...\nm ....\nm ....\nm ...b\n",
        GameConfig::default(),
    );
    game.start_turn();
    let report = game.submit_orders(0, &[move_order(0, 3, 0)]);
    assert_eq!(report.valid.len(), 1, "one wrapped step north");
    game.finish_turn();
    assert_eq!(game.players[0].living[0].location, Location::new(3, 0));
    assert!(game.rejected_moves.is_empty());
}

#[test]
fn leaving_a_bounded_map_is_rejected_with_diagnostics() {
    let mut game = build_game(corners_map(), GameConfig::default());
    game.start_turn();
    let report = game.submit_orders(0, &[move_order(0, -1, 0)]);
    assert_eq!(report.ignored.len(), 1);
    assert!(report.ignored[0].contains("can't move out of map"));
    assert_eq!(game.rejected_moves.len(), 1);
    assert_eq!(game.rejected_moves[0].direction, 'n');
}

#[test]
fn respawn_conflict_kills_the_squatter_and_defers() {
    let config = GameConfig {
        spawn_turns: 1,
        ..GameConfig::default()
    };
    let mut game = build_game("rows 1\ncols 3\nplayers 2\nm a.b\n", config);

    // both collide on the middle square and die
    game.start_turn();
    game.submit_orders(0, &[move_order(0, 0, 1)]);
    game.submit_orders(1, &[move_order(0, 0, 1)]);
    game.finish_turn();
    assert!(game.players[0].living.is_empty());

    // the countdown elapses and both revive on their own spawn squares
    game.start_turn();
    game.finish_turn();
    assert_eq!(game.players[0].living.len(), 1);
    assert_eq!(game.players[1].living.len(), 1);

    // park the enemy on player 0's spawn square, then kill player 0's
    // pirate: at respawn time the squatter dies and the revival defers
    game.players[1].living[0].location = Location::new(0, 0);
    let victim = game.players[0].remove_living(0).unwrap();
    game.players[0].dead.push({
        let mut p = victim;
        p.die_turn = Some(game.turn);
        p.turns_to_revive = 0;
        p
    });

    game.start_turn();
    game.finish_turn();
    assert!(
        game.players[1].living.is_empty(),
        "squatter killed by the respawn conflict"
    );
    assert_eq!(
        game.players[1].dead.last().unwrap().reason_of_death.map(|r| r.code()),
        Some('r')
    );

    // one more turn and the deferred respawn lands
    game.start_turn();
    game.finish_turn();
    assert!(game.players[0].living.iter().any(|p| p.location == Location::new(0, 0)));
}
