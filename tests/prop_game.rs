//! Property-based tests for the rules engine.
//!
//! These verify the standing invariants: path/distance consistency,
//! unique occupancy after collision resolution, the per-turn step budget
//! and treasure exclusivity.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use std::collections::HashSet;

use proptest::prelude::*;

use armada::game::{Game, GameConfig, Grid, Location, MapData, OrderKind};
use serde_json::{json, Value};

fn move_order(pirate: usize, row: i32, col: i32) -> Value {
    json!({
        "type": "order",
        "order_type": "move",
        "acting_pirate": pirate,
        "order_args": {"destination": [row, col]},
    })
}

fn arena() -> Game {
    let map = MapData::parse(
        "rows 8\ncols 8\nplayers 2\nm a......b\nm ........\nm ...$....\nm ........\nm ........\nm ........\nm ........\nm a......b\n",
    )
    .expect("map parses");
    let names = vec!["bot0".to_string(), "bot1".to_string()];
    Game::new(&map, GameConfig::default(), &names).expect("game builds")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// A path has exactly manhattan-distance steps, and walking it on a
    /// cyclic grid always reaches the destination.
    #[test]
    fn prop_path_matches_manhattan_distance(
        rows in 2i32..24,
        cols in 2i32..24,
        cyclic in any::<bool>(),
        from_row in 0i32..24,
        from_col in 0i32..24,
        to_row in 0i32..24,
        to_col in 0i32..24,
    ) {
        let grid = Grid::new(rows, cols, cyclic);
        let a = Location::new(from_row % rows, from_col % cols);
        let b = Location::new(to_row % rows, to_col % cols);

        let path = grid.direction_letters(a, b);
        prop_assert_eq!(path.len() as i32, grid.manhattan_distance(a, b));

        if cyclic {
            let end = grid.walk(a, &path).expect("cyclic walks never leave the map");
            prop_assert_eq!(end, b);
        }
    }

    /// Walking a straight path between two in-bounds squares on a
    /// bounded grid never tries to leave the map.
    #[test]
    fn prop_bounded_walk_between_inner_squares(
        from_row in 0i32..8,
        from_col in 0i32..8,
        to_row in 0i32..8,
        to_col in 0i32..8,
    ) {
        let grid = Grid::new(8, 8, false);
        let a = Location::new(from_row, from_col);
        let b = Location::new(to_row, to_col);
        let path = grid.direction_letters(a, b);
        prop_assert_eq!(grid.walk(a, &path), Ok(b));
    }

    /// After any turn, no two living pirates share a square.
    #[test]
    fn prop_occupancy_unique_after_resolution(
        destinations in proptest::collection::vec((0i32..8, 0i32..8), 4),
        turns in 1usize..4,
    ) {
        let mut game = arena();
        for _ in 0..turns {
            game.start_turn();
            for player in 0..2 {
                let orders: Vec<Value> = destinations
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| i % 2 == player)
                    .map(|(i, &(row, col))| move_order(i / 2, row, col))
                    .collect();
                game.submit_orders(player, &orders);
            }
            game.finish_turn();

            let mut seen = HashSet::new();
            for pirate in game.living_pirates() {
                prop_assert!(seen.insert(pirate.location), "square occupied twice");
            }
        }
    }

    /// The accepted batch never spends more steps than the budget.
    #[test]
    fn prop_step_budget_is_never_exceeded(
        destinations in proptest::collection::vec((0i32..8, 0i32..8), 1..6),
        budget in 1i32..10,
    ) {
        let map = MapData::parse(
            "rows 8\ncols 8\nplayers 2\nm a......b\nm ........\nm ........\nm ........\nm ........\nm ........\nm ........\nm a......b\n",
        )
        .expect("map parses");
        let names = vec!["bot0".to_string(), "bot1".to_string()];
        let config = GameConfig {
            actions_per_turn: budget,
            ..GameConfig::default()
        };
        let mut game = Game::new(&map, config, &names).expect("game builds");
        game.start_turn();

        // alternate orders between the player's two pirates so the batch
        // can hold several accepted moves
        let orders: Vec<Value> = destinations
            .iter()
            .enumerate()
            .map(|(i, &(row, col))| move_order(i % 2, row, col))
            .collect();
        let report = game.submit_orders(0, &orders);

        let spent: i32 = report
            .valid
            .iter()
            .map(|order| {
                let OrderKind::Move { destination } = order.kind else {
                    return 0;
                };
                let from = game
                    .living_pirate(0, order.pirate)
                    .expect("acting pirate lives")
                    .location;
                game.grid.manhattan_distance(from, destination)
            })
            .sum();
        prop_assert!(spent <= budget, "accepted {} steps against a budget of {}", spent, budget);
    }

    /// A treasure is carried by at most one pirate, and a carried
    /// treasure is never also available on the map.
    #[test]
    fn prop_treasure_exclusivity(
        destinations in proptest::collection::vec((0i32..8, 0i32..8), 8),
    ) {
        let mut game = arena();
        for chunk in destinations.chunks(2) {
            game.start_turn();
            for (player, &(row, col)) in chunk.iter().enumerate() {
                game.submit_orders(player, &[move_order(0, row, col)]);
            }
            game.finish_turn();

            let mut carried = HashSet::new();
            for pirate in game.living_pirates() {
                if let Some(id) = pirate.treasure {
                    prop_assert!(carried.insert(id), "treasure carried twice");
                    prop_assert!(!game.treasures[id].is_available);
                }
            }
        }
    }
}
