//! Integration tests for the SALVO workspace
//!
//! Tests the full stack: rules, bots, turn log codec and the match store

use salvo_core::log;
use salvo_core::{
    play_turn, selfplay, GreedyBot, Player, Position, Turn, TurnComposer, TurnReplicator,
    STANDARD_POSITION,
};
use salvo_server::store::{Credentials, MatchId, MatchSpec, Submission};
use salvo_server::MatchStore;
use std::time::Instant;

// ============================================================================
// TEST FIXTURES
// ============================================================================

fn bot_game(seed: u64, max_turns: u32) -> TurnComposer {
    let mut red = GreedyBot::with_seed(seed);
    let mut blue = GreedyBot::with_seed(seed + 1);
    selfplay(Position::standard(), &mut red, &mut blue, max_turns).unwrap()
}

fn new_match(store: &MatchStore) -> (MatchId, Credentials) {
    store
        .create(MatchSpec {
            red: "red-bot".to_string(),
            blue: "blue-bot".to_string(),
            ..MatchSpec::default()
        })
        .unwrap()
}

// ============================================================================
// Bot games through the codecs
// ============================================================================

#[test]
fn test_selfplay_log_replays() {
    let game = bot_game(11, 60);
    let text = log::serialize(game.turns());
    let parsed = log::parse(&text).unwrap();
    assert_eq!(parsed, game.turns());

    let replayed = TurnComposer::from_log(Position::standard(), &parsed).unwrap();
    assert_eq!(replayed.position(), game.position());
    assert_eq!(replayed.outcome(), game.outcome());
}

#[test]
fn test_selfplay_respects_turn_limit() {
    let game = bot_game(3, 10);
    assert!(game.turns().len() <= 10);
    for (i, turn) in game.turns().iter().enumerate() {
        assert_eq!(turn.number, i as u32 + 1);
        assert!(turn.moves.len() <= 3);
    }
}

// ============================================================================
// Bot games through the store
// ============================================================================

#[test]
fn test_store_accepts_every_bot_turn() {
    let game = bot_game(5, 80);
    let store = MatchStore::new();
    let (id, creds) = new_match(&store);

    for turn in game.turns() {
        let player = game.side_for(turn.number);
        let submission = Submission {
            player,
            secret: creds.secret(player).to_string(),
            turn: Turn::new(turn.number, turn.moves.clone()),
        };
        let receipt = store.submit_turn(id, submission).unwrap();
        assert_eq!(&receipt.turn, turn);
    }

    let snapshot = store.snapshot(id).unwrap();
    assert_eq!(snapshot.log, log::serialize(game.turns()));
}

#[test]
fn test_two_seats_play_live() {
    let store = MatchStore::new();
    let (id, creds) = new_match(&store);
    let mut bots = [GreedyBot::with_seed(21), GreedyBot::with_seed(22)];
    let mut composer = TurnComposer::new(Position::standard());
    let mut replicator = TurnReplicator::new();

    for _ in 0..30 {
        if composer.is_finished() {
            break;
        }
        let seat = composer.side_to_move();
        let bot = match seat {
            Player::Red => &mut bots[0],
            Player::Blue => &mut bots[1],
        };
        let mut scratch = composer.clone();
        let turn = play_turn(bot, &mut scratch).unwrap();
        let submission = Submission { player: seat, secret: creds.secret(seat).to_string(), turn };
        store.submit_turn(id, submission).unwrap();

        // the seat only learns about its turn from the store
        let turns = store.snapshot(id).unwrap().turns;
        replicator.receive(turns, |turn| composer.replay(&turn).unwrap());
    }

    assert_eq!(composer.turns(), store.snapshot(id).unwrap().turns.as_slice());
}

// ============================================================================
// PERFORMANCE
// ============================================================================

#[test]
fn test_legality_performance() {
    let position: Position = STANDARD_POSITION.parse().unwrap();
    let start = Instant::now();
    let mut total = 0;
    for _ in 0..1_000 {
        total += salvo_core::legal_moves(&position).len();
    }
    let elapsed = start.elapsed();
    println!("\n=== SALVO Legality Benchmark ===");
    println!("1000 move generations in {:?} ({} moves)", elapsed, total);
    assert_eq!(total, 99_000);
}
