//! Adventure Advisor terminal chat

use adventure_advisor::AdvisorConfig;
use adventure_advisor::orchestration::{Orchestrator, Session, UserPreferences};
use adventure_advisor::preferences::{PreferenceStore, apply_setting};
use clap::Parser;
use crossterm::style::Stylize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use termimad::{MadSkin, crossterm::style::Color};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about = "Chat with the Adventure Advisor", long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Profile name used for saved preferences (overrides config)
    #[arg(short, long)]
    user: Option<String>,

    /// Ollama model (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Ollama API host (overrides config)
    #[arg(long)]
    ollama_host: Option<String>,

    /// Print replies character by character
    #[arg(long)]
    stream: bool,

    /// Answer a single query and exit
    #[arg(short, long)]
    query: Option<String>,

    /// Show debug logs
    #[arg(short, long)]
    verbose: bool,
}

fn create_markdown_skin() -> MadSkin {
    let mut skin = MadSkin::default();

    skin.headers[0].set_fg(Color::Cyan);
    skin.headers[1].set_fg(Color::Blue);
    skin.headers[2].set_fg(Color::Green);

    skin.code_block.set_fg(Color::Yellow);
    skin.inline_code.set_fg(Color::Yellow);

    skin.bold.set_fg(Color::White);
    skin.italic.set_fg(Color::Magenta);

    skin
}

async fn print_reply(skin: &MadSkin, reply: &str, stream: bool) -> io::Result<()> {
    println!();
    if stream {
        let mut stdout = io::stdout();
        for c in reply.chars() {
            write!(stdout, "{}", c)?;
            stdout.flush()?;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        println!();
    } else {
        skin.print_text(reply);
    }
    println!();
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  /context               show what the advisor knows so far");
    println!("  /prefs                 show your saved preferences");
    println!("  /prefs set key=value   update a preference (distance, duration, difficulty,");
    println!("                         activity, activities, location)");
    println!("  /clear                 start over");
    println!("  exit                   quit\n");
}

/// Handle a `/prefs` command, saving the profile when it changes
fn handle_prefs(
    args: &str,
    profile: &mut UserPreferences,
    session: &mut Session,
    store: &PreferenceStore,
    username: &str,
) {
    let args = args.trim();
    if args.is_empty() {
        if profile.is_empty() {
            println!("No saved preferences for {}.\n", username);
        } else {
            println!("Preferences for {}: {}\n", username, profile.describe());
        }
        return;
    }

    let Some((key, value)) = args.strip_prefix("set").and_then(|rest| rest.split_once('=')) else {
        println!("Usage: /prefs set key=value\n");
        return;
    };

    if let Err(e) = apply_setting(profile, key, value) {
        println!("{} {}\n", "Error:".red(), e);
        return;
    }
    session.context.user_preferences.merge(profile);

    match store.save(username, profile) {
        Ok(()) => println!("Saved: {}\n", profile.describe()),
        Err(e) => println!("{} {}\n", "Could not save preferences:".red(), e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("adventure_advisor={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut config = AdvisorConfig::load(args.config.as_deref())?;
    if let Some(model) = args.model {
        config.ollama.model = model;
    }
    if let Some(host) = args.ollama_host {
        config.ollama.host = host;
    }
    if let Some(user) = args.user {
        config.preferences.username = user;
    }

    let orchestrator = Orchestrator::from_config(&config)?;
    let store = PreferenceStore::new(&config.preferences.path);
    let username = config.preferences.username.clone();
    let mut profile = store.load(&username).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not read saved preferences");
        UserPreferences::default()
    });
    let mut session = Session::with_preferences(config.orchestrator.memory_window, profile.clone());
    let skin = create_markdown_skin();

    if let Some(query) = args.query {
        let reply = orchestrator.run(&mut session, &query).await;
        print_reply(&skin, &reply, args.stream).await?;
        return Ok(());
    }

    println!("Adventure Advisor v{}\n", env!("CARGO_PKG_VERSION"));
    println!("Model: {} ({})", config.ollama.model, config.ollama.host);
    println!("Agents:");
    for kind in orchestrator.registry().kinds() {
        if let Some(agent) = orchestrator.registry().get(kind) {
            println!("  {} {}: {}", "•".cyan(), kind, agent.capabilities());
        }
    }
    if !profile.is_empty() {
        println!("Profile {}: {}", username, profile.describe());
    }
    println!("Type /help for commands.\n");

    loop {
        print!("{} ", ">".green().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        match input {
            "" => continue,
            "exit" | "quit" | "q" => break,
            "/help" => {
                print_help();
                continue;
            }
            "/clear" => {
                orchestrator.reset(&mut session).await;
                println!("Conversation cleared.\n");
                continue;
            }
            "/context" => {
                println!("{}\n", serde_json::to_string_pretty(&session.summary())?);
                continue;
            }
            _ => {}
        }

        if let Some(rest) = input.strip_prefix("/prefs") {
            handle_prefs(rest, &mut profile, &mut session, &store, &username);
            continue;
        }

        session.context.user_preferences.fill_missing(&profile);
        let reply = orchestrator.run(&mut session, input).await;
        print_reply(&skin, &reply, args.stream).await?;
    }

    println!("Goodbye!");
    Ok(())
}
