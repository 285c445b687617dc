//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p dogstory_client -- [--config client.json] [--server http://127.0.0.1:8080]
//!                                   [--name Rex] [--map map1] [--token T --player-id N]
//!
//! The client joins a game (unless a token is given), loads the map, then
//! keeps the local view in sync with the server at a fixed tick rate.
//!
//! Console commands:
//!   press <U|D|L|R>   - Hold a movement key
//!   release <U|D|L|R> - Release a movement key
//!   status            - Show client status
//!   quit              - Exit client

use std::env;
use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::Context;
use dogstory_client::{
    client::{ClientState, GameClient},
    headless::HeadlessScene,
    http::HttpBackend,
};
use dogstory_shared::{
    config::ClientConfig,
    map::TileGrid,
    net::{MoveCommand, PlayerId},
};
use tokio::sync::mpsc;
use tracing::info;

const RECORDS_PAGE: u32 = 10;

fn parse_args() -> anyhow::Result<ClientConfig> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = &args[i + 1];
            let text = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
            ClientConfig::from_json_str(&text).with_context(|| format!("parse {path}"))?
        }
        _ => ClientConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--server" if i + 1 < args.len() => {
                cfg.server_url = args[i + 1].clone();
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.user_name = args[i + 1].clone();
                i += 2;
            }
            "--map" if i + 1 < args.len() => {
                cfg.map_id = args[i + 1].clone();
                i += 2;
            }
            "--token" if i + 1 < args.len() => {
                cfg.auth_token = Some(args[i + 1].clone());
                i += 2;
            }
            "--player-id" if i + 1 < args.len() => {
                let id = args[i + 1].parse().context("parse --player-id")?;
                cfg.player_id = Some(PlayerId(id));
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

enum ConsoleCommand {
    Press(MoveCommand),
    Release(MoveCommand),
    Status,
    Quit,
}

fn parse_console(line: &str) -> Result<ConsoleCommand, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let key = || {
        tokens
            .get(1)
            .and_then(|s| MoveCommand::from_symbol(s))
            .filter(|k| *k != MoveCommand::Stop)
            .ok_or_else(|| "Usage: press|release <U|D|L|R>".to_string())
    };
    match tokens.first().copied() {
        Some("press") => key().map(ConsoleCommand::Press),
        Some("release") => key().map(ConsoleCommand::Release),
        Some("status") => Ok(ConsoleCommand::Status),
        Some("quit") | Some("exit") => Ok(ConsoleCommand::Quit),
        Some(other) => Err(format!("Unknown command: {other}")),
        None => Err(String::new()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut cfg = parse_args()?;
    info!(server = %cfg.server_url, map = %cfg.map_id, "Starting client");

    let timeout = Duration::from_millis(cfg.request_timeout_ms);
    let mut backend = HttpBackend::new(&cfg.server_url, timeout).context("build http client")?;
    match cfg.auth_token.clone() {
        Some(token) => backend = backend.with_token(token),
        None => {
            let joined = backend
                .join(&cfg.user_name, &cfg.map_id)
                .await
                .context("join game")?;
            cfg.player_id = Some(joined.player_id);
        }
    }

    let map = backend.fetch_map(&cfg.map_id).await.context("fetch map")?;
    let grid = TileGrid::derive(&map).context("derive tiles")?;
    info!(
        map = %map.name,
        width = grid.width(),
        height = grid.height(),
        roads = grid.road_tiles().count(),
        "Map loaded"
    );

    let records = backend.clone();
    let mut client = GameClient::new(backend, HeadlessScene::new(), &cfg);

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Client started. Type 'status' for info, 'quit' to exit.");
    println!();

    let tick_interval = Duration::from_secs_f64(1.0 / f64::from(cfg.tick_hz.max(1)));
    let mut ticker = tokio::time::interval(tick_interval);

    loop {
        ticker.tick().await;

        while let Ok(line) = console_rx.try_recv() {
            match parse_console(&line) {
                Ok(ConsoleCommand::Press(key)) => {
                    client.key_down(key);
                }
                Ok(ConsoleCommand::Release(key)) => {
                    client.key_up(key);
                }
                Ok(ConsoleCommand::Status) => {
                    for line in client.status_lines() {
                        println!("{}", line);
                    }
                }
                Ok(ConsoleCommand::Quit) => return Ok(()),
                Err(msg) if msg.is_empty() => {}
                Err(msg) => println!("{}", msg),
            }
        }

        client.tick();

        if client.state == ClientState::Retired {
            println!("Session ended.");
            break;
        }
    }

    let page = records
        .fetch_records(0, RECORDS_PAGE)
        .await
        .context("fetch records")?;
    println!("{:<4} {:<20} {:>8} {:>10}", "#", "Name", "Score", "Time, s");
    for (rank, entry) in page.iter().enumerate() {
        println!(
            "{:<4} {:<20} {:>8} {:>10.1}",
            rank + 1,
            entry.name,
            entry.score,
            entry.play_time
        );
    }

    Ok(())
}
