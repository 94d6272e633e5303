use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use mcts_core::StopSignal;
use mcts_engine::{
    line_to_uci, ChessPosition, EngineConfig, MctsEngine, SearchLimits, SearchResult,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Used when `go` carries no limit at all.
const DEFAULT_MOVE_TIME: Duration = Duration::from_millis(1000);

fn init_tracing() {
    // stdout belongs to the GUI.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn parse_args() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a file path")?;
                config = Some(PathBuf::from(path));
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(config)
}

fn main() -> Result<()> {
    init_tracing();

    let config = match parse_args()? {
        Some(path) => EngineConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let engine = MctsEngine::new(config).context("invalid engine config")?;
    let mut uci = Uci::new(engine);

    // UCI engines communicate via stdin/stdout.
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        if !uci.handle(&parts)? {
            break;
        }
    }
    uci.stop_search();
    Ok(())
}

struct Uci {
    engine: Arc<Mutex<MctsEngine>>,
    stop: StopSignal,
    // Copies for `uci`, which must answer while a search holds the engine.
    name: String,
    author: String,
    config: EngineConfig,
    position: ChessPosition,
    search: Option<JoinHandle<()>>,
}

impl Uci {
    fn new(engine: MctsEngine) -> Self {
        let stop = engine.stop_signal();
        Self {
            name: engine.name().to_string(),
            author: engine.author().to_string(),
            config: engine.config(),
            engine: Arc::new(Mutex::new(engine)),
            stop,
            position: ChessPosition::startpos(),
            search: None,
        }
    }

    /// Returns false on `quit`.
    fn handle(&mut self, parts: &[&str]) -> Result<bool> {
        let mut stdout = io::stdout();
        match parts[0] {
            "uci" => write_options(&mut stdout, &self.name, &self.author, &self.config)?,
            "isready" => writeln!(stdout, "readyok")?,
            "setoption" => {
                self.wait_for_search();
                if let Some((name, value)) = parse_setoption(parts) {
                    let updated = {
                        let mut engine = self.lock_engine();
                        engine.set_option(&name, &value).then(|| engine.config())
                    };
                    match updated {
                        Some(config) => self.config = config,
                        None => warn!(%name, %value, "ignored option"),
                    }
                }
            }
            "ucinewgame" => {
                self.wait_for_search();
                self.position = ChessPosition::startpos();
                self.lock_engine().new_game();
            }
            "position" => {
                self.wait_for_search();
                match parse_position(&parts[1..]) {
                    Ok(position) => self.position = position,
                    Err(err) => warn!("bad position command: {err:#}"),
                }
            }
            "go" => {
                self.wait_for_search();
                let limits = parse_go(&parts[1..], self.position.side_to_move());
                self.start_search(limits);
            }
            "stop" => self.stop_search(),
            "quit" => return Ok(false),
            other => debug!(command = other, "ignoring unknown command"),
        }
        stdout.flush()?;
        Ok(true)
    }

    fn lock_engine(&self) -> std::sync::MutexGuard<'_, MctsEngine> {
        // A panicked search leaves the engine usable.
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn start_search(&mut self, limits: SearchLimits) {
        self.stop.reset();
        let engine = Arc::clone(&self.engine);
        let position = self.position.clone();

        self.search = Some(thread::spawn(move || {
            let mut engine = engine.lock().unwrap_or_else(|e| e.into_inner());
            let result = engine.search_with_info(&position, limits, |progress| {
                let pv = line_to_uci(&position, &progress.principal_variation);
                let mut out = io::stdout().lock();
                writeln!(
                    out,
                    "info depth {} nodes {} nps {} time {} pv {}",
                    pv.len(),
                    progress.nodes_visited,
                    progress.nodes_per_second,
                    progress.elapsed_ms,
                    pv.join(" ")
                )
                .ok();
                out.flush().ok();
            });

            let mut out = io::stdout().lock();
            match result {
                Ok(result) => {
                    info!(
                        simulations = result.simulations,
                        score = result.score,
                        reused = result.reused,
                        "search done"
                    );
                    writeln!(
                        out,
                        "info nodes {} score {} pv {}",
                        result.nodes,
                        score_text(&result),
                        result.principal_variation.join(" ")
                    )
                    .ok();
                    let best = result.best_move_uci.as_deref().unwrap_or("0000");
                    writeln!(out, "bestmove {best}").ok();
                }
                Err(err) => {
                    warn!(%err, "search failed");
                    writeln!(out, "bestmove 0000").ok();
                }
            }
            out.flush().ok();
        }));
    }

    fn wait_for_search(&mut self) {
        if let Some(handle) = self.search.take() {
            if handle.join().is_err() {
                warn!("search thread panicked");
            }
        }
    }

    fn stop_search(&mut self) {
        self.stop.stop();
        self.wait_for_search();
    }
}

fn write_options(
    out: &mut impl Write,
    name: &str,
    author: &str,
    config: &EngineConfig,
) -> io::Result<()> {
    let search = &config.search;
    let policy = &config.policy;
    writeln!(out, "id name {name}")?;
    writeln!(out, "id author {author}")?;
    writeln!(out, "option name CPuct type string default {}", search.c_puct)?;
    writeln!(
        out,
        "option name Temperature type string default {}",
        search.temperature
    )?;
    writeln!(
        out,
        "option name BatchSize type spin default {} min 1 max 256",
        search.batch_size
    )?;
    writeln!(
        out,
        "option name NoiseEpsilon type string default {}",
        search.noise_epsilon
    )?;
    writeln!(
        out,
        "option name NoiseAlpha type string default {}",
        search.noise_alpha
    )?;
    writeln!(
        out,
        "option name ReuseDepth type spin default {} min 0 max 8",
        search.reuse_depth
    )?;
    writeln!(
        out,
        "option name ValueScale type string default {}",
        search.value_scale
    )?;
    writeln!(out, "option name Seed type string default <empty>")?;
    writeln!(
        out,
        "option name CaptureFilter type combo default {} var soft var hard var off",
        policy.capture_filter
    )?;
    writeln!(
        out,
        "option name SeeThreshold type spin default {} min -2000 max 2000",
        policy.see_threshold
    )?;
    writeln!(
        out,
        "option name UnsafeDiscount type string default {}",
        policy.unsafe_discount
    )?;
    writeln!(out, "uciok")
}

/// `mate N` when the expected line ends in checkmate, `cp N` otherwise.
fn score_text(result: &SearchResult) -> String {
    match result.mate {
        Some(moves) => format!("mate {moves}"),
        None => format!("cp {}", result.score),
    }
}

/// `setoption name <name...> value <value...>`
fn parse_setoption(parts: &[&str]) -> Option<(String, String)> {
    let name_idx = parts.iter().position(|&x| x == "name")?;
    let value_idx = parts.iter().position(|&x| x == "value");
    let name_end = value_idx.unwrap_or(parts.len());
    if name_idx + 1 >= name_end {
        return None;
    }
    let name = parts[name_idx + 1..name_end].join(" ");
    let value = value_idx
        .map(|i| parts[i + 1..].join(" "))
        .unwrap_or_default();
    Some((name, value))
}

/// `position [startpos | fen <fen>] [moves <m1> <m2> ...]`
fn parse_position(parts: &[&str]) -> Result<ChessPosition> {
    let moves_idx = parts.iter().position(|&x| x == "moves");
    let setup = &parts[..moves_idx.unwrap_or(parts.len())];

    let mut position = match setup.first() {
        Some(&"startpos") => ChessPosition::startpos(),
        Some(&"fen") => ChessPosition::from_fen(&setup[1..].join(" "))?,
        _ => bail!("expected startpos or fen"),
    };
    if let Some(i) = moves_idx {
        for mv in &parts[i + 1..] {
            position.play_uci(mv)?;
        }
    }
    Ok(position)
}

fn parse_go(parts: &[&str], side: cozy_chess::Color) -> SearchLimits {
    let mut move_time = None;
    let mut nodes = None;
    let mut infinite = false;
    let (mut wtime, mut btime, mut winc, mut binc, mut movestogo) = (None, None, 0, 0, None);

    let mut iter = parts.iter();
    while let Some(&token) = iter.next() {
        let mut number = || iter.next().and_then(|v| v.parse::<u64>().ok());
        match token {
            "movetime" => move_time = number(),
            "nodes" => nodes = number(),
            "wtime" => wtime = number(),
            "btime" => btime = number(),
            "winc" => winc = number().unwrap_or(0),
            "binc" => binc = number().unwrap_or(0),
            "movestogo" => movestogo = number(),
            "infinite" => infinite = true,
            _ => {}
        }
    }

    if infinite {
        return SearchLimits::infinite();
    }
    let (remaining, increment) = match side {
        cozy_chess::Color::White => (wtime, winc),
        cozy_chess::Color::Black => (btime, binc),
    };

    let mut limits = match (move_time, remaining) {
        (Some(ms), _) => SearchLimits::time(Duration::from_millis(ms)),
        (None, Some(ms)) => SearchLimits::from_clock(
            Duration::from_millis(ms),
            Duration::from_millis(increment),
            movestogo.map(|n| n as u32),
        ),
        (None, None) if nodes.is_some() => SearchLimits::default(),
        (None, None) => SearchLimits::time(DEFAULT_MOVE_TIME),
    };
    limits.simulations = nodes;
    limits
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
