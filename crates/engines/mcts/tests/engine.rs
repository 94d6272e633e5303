//! End-to-end searches on real chess positions.

use mcts_core::MctsConfig;
use mcts_engine::{
    CaptureFilter, ChessPosition, EngineConfig, MctsEngine, PolicyConfig, SearchLimits,
};

fn engine_with(policy: PolicyConfig) -> MctsEngine {
    MctsEngine::new(EngineConfig {
        search: MctsConfig::for_testing(),
        policy,
    })
    .unwrap()
}

fn engine() -> MctsEngine {
    engine_with(PolicyConfig::default())
}

fn position(fen: &str) -> ChessPosition {
    ChessPosition::from_fen(fen).unwrap()
}

#[test]
fn checkmated_side_has_no_move() {
    let pos = position("r1bqkbnr/pppp1Qpp/2n5/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 1");
    let result = engine().search(&pos, SearchLimits::simulations(50)).unwrap();
    assert!(result.best_move.is_none());
    assert!(result.best_move_uci.is_none());
    assert_eq!(result.simulations, 0);
    assert!(result.score < -1000);
    assert_eq!(result.mate, Some(0));
}

#[test]
fn stalemated_side_has_no_move() {
    let pos = position("k7/8/1Q6/8/8/8/8/1K6 b - - 0 1");
    let result = engine().search(&pos, SearchLimits::simulations(50)).unwrap();
    assert!(result.best_move.is_none());
    assert_eq!(result.score, 0);
    assert_eq!(result.mate, None);
}

#[test]
fn finds_back_rank_mate() {
    let pos = position("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1");
    let result = engine().search(&pos, SearchLimits::simulations(400)).unwrap();
    assert_eq!(result.best_move_uci.as_deref(), Some("a1a8"));
    assert!(result.score > 0);
    assert_eq!(result.mate, Some(1));
}

#[test]
fn only_legal_move_is_played_at_once() {
    // Black king in check with a single escape.
    let pos = position("k7/8/1K6/8/8/8/8/R7 b - - 0 1");
    let result = engine().search(&pos, SearchLimits::simulations(500)).unwrap();
    assert_eq!(result.best_move_uci.as_deref(), Some("a8b8"));
    assert_eq!(result.simulations, 1);
}

#[test]
fn hard_filter_never_plays_unsafe_capture() {
    let pos = position("4k3/8/2p5/3p4/8/8/8/3QK3 w - - 0 1");
    let mut engine = engine_with(PolicyConfig {
        capture_filter: CaptureFilter::Hard,
        ..PolicyConfig::default()
    });
    let result = engine.search(&pos, SearchLimits::simulations(300)).unwrap();
    assert_ne!(result.best_move_uci.as_deref(), Some("d1d5"));
}

#[test]
fn tree_is_reused_across_moves() {
    let mut engine = engine();
    let mut pos = ChessPosition::startpos();

    let first = engine.search(&pos, SearchLimits::simulations(300)).unwrap();
    assert!(!first.reused);
    assert!(first.principal_variation.len() >= 2);

    pos.play_uci(&first.principal_variation[0]).unwrap();
    pos.play_uci(&first.principal_variation[1]).unwrap();

    let second = engine.search(&pos, SearchLimits::simulations(100)).unwrap();
    assert!(second.reused);
    assert!(second.best_move.is_some());
}

#[test]
fn new_game_discards_tree() {
    let mut engine = engine();
    let pos = ChessPosition::startpos();
    engine.search(&pos, SearchLimits::simulations(50)).unwrap();
    engine.new_game();
    let result = engine.search(&pos, SearchLimits::simulations(50)).unwrap();
    assert!(!result.reused);
}

#[test]
fn progress_reports_reach_caller() {
    let mut engine = MctsEngine::new(EngineConfig {
        search: MctsConfig {
            progress_interval: 25,
            ..MctsConfig::for_testing()
        },
        policy: PolicyConfig::default(),
    })
    .unwrap();

    let mut reports = Vec::new();
    engine
        .search_with_info(
            &ChessPosition::startpos(),
            SearchLimits::simulations(100),
            |progress| reports.push(progress.simulations),
        )
        .unwrap();
    assert_eq!(reports.last(), Some(&100));
    assert!(reports.windows(2).all(|w| w[0] <= w[1]));
    assert!(reports.len() >= 4);
}
