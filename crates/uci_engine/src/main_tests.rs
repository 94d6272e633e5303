use super::*;
use cozy_chess::Color;

fn words(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

#[test]
fn setoption_with_spaces() {
    let parts = words("setoption name Capture Filter value hard");
    assert_eq!(
        parse_setoption(&parts),
        Some(("Capture Filter".to_string(), "hard".to_string()))
    );
    assert_eq!(parse_setoption(&words("setoption name value 3")), None);
}

#[test]
fn position_with_moves() {
    let parts = words("startpos moves e2e4 e7e5 g1f3");
    let pos = parse_position(&parts).unwrap();
    assert_eq!(pos.side_to_move(), Color::Black);

    let fen = words("fen 4k3/8/8/8/8/8/8/4K2R w K - 0 1 moves e1g1");
    let pos = parse_position(&fen).unwrap();
    assert_eq!(pos.side_to_move(), Color::Black);

    assert!(parse_position(&words("startpos moves e2e5")).is_err());
    assert!(parse_position(&words("somewhere")).is_err());
}

#[test]
fn go_limits() {
    let limits = parse_go(&words("movetime 250"), Color::White);
    assert_eq!(limits.move_time, Some(Duration::from_millis(250)));
    assert_eq!(limits.simulations, None);

    let limits = parse_go(&words("nodes 800"), Color::White);
    assert_eq!(limits, SearchLimits::simulations(800));

    let limits = parse_go(&words("infinite"), Color::Black);
    assert_eq!(limits, SearchLimits::infinite());

    let limits = parse_go(&[], Color::White);
    assert_eq!(limits.move_time, Some(DEFAULT_MOVE_TIME));
}

#[test]
fn go_uses_own_clock() {
    let parts = words("wtime 60000 btime 3000 winc 0 binc 0");
    let white = parse_go(&parts, Color::White);
    let black = parse_go(&parts, Color::Black);
    assert_eq!(white.move_time, Some(Duration::from_millis(2000)));
    assert_eq!(black.move_time, Some(Duration::from_millis(100)));
}

#[test]
fn options_come_from_cached_config() {
    let mut config = EngineConfig::default();
    config.search.batch_size = 8;
    let mut out = Vec::new();
    write_options(&mut out, "MCTS v0.1", "ML-chess", &config).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.starts_with("id name MCTS v0.1\nid author ML-chess\n"));
    assert!(text.contains("option name BatchSize type spin default 8 min 1 max 256\n"));
    assert!(text.contains("option name CaptureFilter type combo default soft"));
    assert!(text.ends_with("uciok\n"));
}

#[test]
fn score_prefers_mate() {
    let mut result = SearchResult {
        best_move: None,
        best_move_uci: Some("a1a8".to_string()),
        score: 1520,
        mate: Some(1),
        simulations: 10,
        nodes: 20,
        principal_variation: vec!["a1a8".to_string()],
        stopped: false,
        reused: false,
    };
    assert_eq!(score_text(&result), "mate 1");

    result.mate = None;
    result.score = 35;
    assert_eq!(score_text(&result), "cp 35");
}
