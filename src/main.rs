//! Live Todo Entry Point
//!
//! Interactive terminal front end: renders the list on every push or mode
//! change and turns typed lines into commands.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use live_todo::commands::{self, AppState};
use live_todo::config::AppConfig;
use live_todo::runtime;

const HELP: &str = "commands: add <text> | rm <number|id> | theme | list | reconnect | help | quit";

#[derive(Debug, Parser)]
#[command(name = "live-todo", version, about = "Live-synced personal task list")]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// SQLite file shared as the document store
    #[arg(long)]
    db: Option<PathBuf>,
    /// JSON file for persisted preferences
    #[arg(long)]
    prefs: Option<PathBuf>,
    #[arg(long)]
    collection: Option<String>,
    /// Directory for rolling log files
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<AppConfig> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if let Some(db) = self.db {
            config.use_sqlite(db);
        }
        if let Some(prefs) = self.prefs {
            config.preferences.path = Some(prefs);
        }
        if let Some(collection) = self.collection {
            config.collection = collection;
        }
        if let Some(log_dir) = self.log_dir {
            config.log_dir = Some(log_dir);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, PartialEq)]
enum Input {
    Add(String),
    Remove(String),
    Toggle,
    List,
    Reconnect,
    Help,
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim().to_string();
    Some(match command {
        "add" | "a" => Input::Add(rest),
        "rm" | "del" | "d" => Input::Remove(rest),
        "theme" | "t" => Input::Toggle,
        "list" | "ls" => Input::List,
        "reconnect" => Input::Reconnect,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => Input::Unknown(other.to_string()),
    })
}

/// Accept a 1-based row number from the last listing, or a raw id
fn resolve_target(state: &AppState, target: &str) -> String {
    target
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| commands::list_items(state).get(index).map(|item| item.id.to_string()))
        .unwrap_or_else(|| target.to_string())
}

fn print_frame(state: &AppState) {
    println!("{}", commands::render_frame(state, ""));
}

/// Returns false when the session should end
async fn handle(state: &AppState, input: Input) -> bool {
    match input {
        Input::Add(text) => {
            if let Err(e) = commands::create_item(state, &text).await {
                println!("! {}", e);
            }
        }
        Input::Remove(target) => {
            let id = resolve_target(state, &target);
            if let Err(e) = commands::delete_item(state, &id).await {
                println!("! {}", e);
            }
        }
        Input::Toggle => {
            commands::toggle_theme(state);
        }
        Input::List => print_frame(state),
        Input::Reconnect => {
            commands::close_sync(state);
            if let Err(e) = commands::open_sync(state).await {
                println!("! {}", e);
            }
        }
        Input::Help => println!("{}", HELP),
        Input::Quit => return false,
        Input::Unknown(command) => println!("! unknown command {:?}; {}", command, HELP),
    }
    true
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;

    let log_dir = config
        .log_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("live-todo"));
    rolling_logger::init_logger(log_dir, "LiveTodo")
        .map_err(anyhow::Error::msg)
        .context("failed to init rolling logger")?;

    let backend = runtime::init(&config)?;
    let state = AppState::from_backend(&backend, &config);

    // First pass renders before the mode is known: no controls.
    print_frame(&state);
    commands::resolve_theme(&state);
    if let Err(e) = commands::open_sync(&state).await {
        println!("! {} (type `reconnect` to retry)", e);
    }
    println!("{}", HELP);

    let mut mirror_rx = state.mirror.subscribe();
    let mut theme_rx = state.theme.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_frame(&state);

    loop {
        tokio::select! {
            changed = mirror_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                mirror_rx.borrow_and_update();
                print_frame(&state);
            }
            changed = theme_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                theme_rx.borrow_and_update();
                print_frame(&state);
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if let Some(input) = parse_input(&line) {
                    if !handle(&state, input).await {
                        break;
                    }
                }
            }
        }
    }

    commands::close_sync(&state);
    drop(state);
    runtime::shutdown();
    let _ = rolling_logger::info("session ended");
    Ok(())
}
