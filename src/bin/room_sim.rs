#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
use anyhow::Context;
#[cfg(not(target_arch = "wasm32"))]
use clap::Parser;
#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;
#[cfg(not(target_arch = "wasm32"))]
use tetris_room::bot::BotDriver;
#[cfg(not(target_arch = "wasm32"))]
use tetris_room::scores::{Leaderboard, ScoreEndpoint};
#[cfg(not(target_arch = "wasm32"))]
use tetris_room::session::{SessionCoordinator, SessionPhase};
#[cfg(not(target_arch = "wasm32"))]
use tetris_room::settings::SessionSettings;
#[cfg(not(target_arch = "wasm32"))]
use tetris_room::store::MemoryStore;
#[cfg(not(target_arch = "wasm32"))]
use tetris_room::timer::TokioTicks;
#[cfg(not(target_arch = "wasm32"))]
use tokio::sync::mpsc::unbounded_channel;
#[cfg(not(target_arch = "wasm32"))]
use tracing::info;

#[cfg(not(target_arch = "wasm32"))]
const FRAME_MS: u64 = 16;

/// Headless room: bot players share one in-memory store and play until someone tops out.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Parser, Debug, Clone)]
struct Opts {
    /// Number of bot players joining the room
    #[arg(long, default_value_t = 3)]
    players: usize,
    /// Stop after this many seconds even if nobody has topped out
    #[arg(long, default_value_t = 60)]
    seconds: u64,
    /// Pieces per second each bot places
    #[arg(long, default_value_t = 2.0)]
    bot_pps: f32,
    /// Optional JSON file with session settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Give every bot its own practice game instead of the shared room
    #[arg(long)]
    practice: bool,
}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let opts = Opts::parse();
    let settings = match opts.config.as_ref() {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<SessionSettings>(&raw)
                .with_context(|| format!("invalid settings in {}", path.display()))?
        }
        None => SessionSettings::default(),
    };

    let store = MemoryStore::new();
    let scores = Leaderboard::new();
    let (timer_tx, mut timer_rx) = unbounded_channel();

    let mut clients = Vec::with_capacity(opts.players);
    for i in 0..opts.players {
        let mut session = SessionCoordinator::new(
            store.connect(),
            scores.clone(),
            settings.clone(),
            Box::new(TokioTicks::new(timer_tx.clone())),
        )?;
        session.join(&format!("bot-{}", i + 1), opts.practice)?;
        clients.push((session, BotDriver::new(opts.bot_pps)));
    }
    for (session, _) in clients.iter_mut() {
        session.pump();
    }
    if !opts.practice {
        if let Some((host, _)) = clients.first_mut() {
            host.start_round()?;
        }
        for (session, _) in clients.iter_mut() {
            session.pump();
        }
    }
    info!("{} players in {}", clients.len(), settings.room);

    let deadline = tokio::time::sleep(Duration::from_secs(opts.seconds));
    tokio::pin!(deadline);
    let mut frame = tokio::time::interval(Duration::from_millis(FRAME_MS));

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("time limit reached");
                break;
            }
            Some(fired) = timer_rx.recv() => {
                for (session, _) in clients.iter_mut() {
                    session.on_timer(fired);
                }
            }
            _ = frame.tick() => {
                for (session, bot) in clients.iter_mut() {
                    bot.update(session, FRAME_MS as f32);
                }
            }
        }
        for (session, _) in clients.iter_mut() {
            session.pump();
        }
        if clients
            .iter()
            .all(|(session, _)| session.phase() != SessionPhase::Playing)
        {
            info!("round over");
            break;
        }
    }

    println!("{:<10} {:>6} {:>6} {:>8}", "player", "lines", "level", "garbage");
    for (session, _) in &clients {
        println!(
            "{:<10} {:>6} {:>6} {:>8}",
            session.display_name(),
            session.total_lines(),
            session.level(),
            session.garbage_received()
        );
    }
    let ranking = scores.rankings()?;
    if !ranking.is_empty() {
        println!("\nranking");
        for (i, entry) in ranking.iter().enumerate() {
            println!(
                "{:>2}. {:<10} lvl {:>2} lines {:>4}",
                i + 1,
                entry.display_name,
                entry.level,
                entry.total_lines
            );
        }
    }
    Ok(())
}
