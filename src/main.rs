use std::fs;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

mod app;
mod config;
mod handler;
mod script;
mod tui;
mod ui;

use app::App;
use config::Config;
use script::Scenario;

#[derive(Parser)]
#[command(name = "keyper")]
#[command(about = "Scripted escape-room host in your terminal")]
struct Cli {
    /// Scenario to play (overrides the configured default)
    #[arg(short, long)]
    scenario: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in scenarios
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::List) = cli.command {
        list_scenarios();
        return Ok(());
    }

    init_logging()?;

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let name = cli
        .scenario
        .or_else(|| config.default_scenario.clone())
        .unwrap_or_else(|| "bedroom".to_string());
    let scenario = Scenario::by_name(&name).ok_or_else(|| {
        let names: Vec<&str> = Scenario::all().iter().map(|s| s.name).collect();
        anyhow!("unknown scenario {name:?} (available: {})", names.join(", "))
    })?;
    log::info!("starting scenario {}", scenario.name);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let tx = events.sender();
    let mut app = App::new(scenario, &config);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;
        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event, &tx)?,
            None => break,
        }
    }

    // A recording auto-stop timer may still be pending; abort it so
    // teardown is clean.
    if let Some(handle) = app.record_timeout.take() {
        handle.abort();
    }

    tui::restore()?;
    Ok(())
}

fn list_scenarios() {
    println!("Built-in scenarios:\n");
    for scenario in Scenario::all() {
        let mut modes = vec!["text"];
        if scenario.modalities.qr {
            modes.push("qr");
        }
        if scenario.modalities.voice {
            modes.push("voice");
        }
        if scenario.modalities.image {
            modes.push("image");
        }
        println!("  {:<10} {}", scenario.name, modes.join(" + "));
    }
}

fn init_logging() -> Result<()> {
    let dir = dirs::config_dir()
        .context("could not determine config directory")?
        .join("keyper");
    fs::create_dir_all(&dir)?;
    let file = fs::File::create(dir.join("keyper.log"))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}
