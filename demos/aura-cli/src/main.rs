//! Line-oriented client for the Aura support service.
//!
//! Run with: cargo run -p aura-cli -- [config.toml]
//!
//! Type `/help` for commands; any other line is sent as a chat message.

use std::{
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use async_trait::async_trait;
use aura_core::{
    ClientConfig, ConfirmPrompt, Confirmation, GuardianFields, GuardianRecord, KeyValueStore,
    MediaError, MediaPlayer, Message, Origin, TranscriptEvent,
};
use aura_session::{AuraClient, SendOutcome};
use aura_transport::HttpApi;
use futures::StreamExt;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::Mutex,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

const HELP: &str = "\
Commands:
  /login <user> <password>      log in
  /register <user> <password>   create an account
  /logout                       end the session
  /guardians [refresh]          show guardians (refresh bypasses the cache)
  /add <name> <email>           add a guardian
  /edit <id> <name> <email>     change a guardian
  /remove <id>                  remove a guardian (asks first)
  /quit                         exit
Anything else is sent to Aura.";

/// Stdin shared by the command loop and the confirmation prompt.
type Input = Arc<Mutex<Lines<BufReader<Stdin>>>>;

async fn read_line(input: &Input) -> io::Result<Option<String>> {
    input.lock().await.next_line().await
}

struct StdinPrompt {
    input: Input,
}

#[async_trait]
impl ConfirmPrompt for StdinPrompt {
    async fn confirm_removal(&self, guardian: &GuardianRecord) -> Confirmation {
        print!("Remove {} <{}>? [y/N] ", guardian.name, guardian.email);
        let _ = io::stdout().flush();
        match read_line(&self.input).await {
            Ok(Some(answer)) => {
                Confirmation::from(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
            }
            _ => Confirmation::Withheld,
        }
    }
}

/// No audio sink in a terminal; report what would play.
struct LogPlayer;

#[async_trait]
impl MediaPlayer for LogPlayer {
    async fn play(&self, url: &Url) -> Result<(), MediaError> {
        tracing::info!(%url, "now playing supportive song");
        println!("♪ {url}");
        Ok(())
    }
}

#[cfg(feature = "sqlite")]
async fn open_store() -> anyhow::Result<Arc<dyn KeyValueStore>> {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aura");
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let store = aura_session::storage::SqliteStore::open(&dir.join("client.db")).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
#[allow(clippy::unused_async)]
async fn open_store() -> anyhow::Result<Arc<dyn KeyValueStore>> {
    Ok(Arc::new(aura_session::storage::MemoryStore::new()))
}

fn render(message: &Message) {
    if message.origin == Origin::User {
        return;
    }
    match &message.mode {
        Some(mode) => println!("aura [{mode}]> {}", message.text),
        None => println!("aura> {}", message.text),
    }
}

fn spawn_renderer(client: &AuraClient) {
    let mut events = client.chat().transcript().history_plus_stream();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                TranscriptEvent::Appended(message) => render(&message),
                TranscriptEvent::Reset(greeting) => {
                    println!();
                    render(&greeting);
                }
            }
        }
    });
}

fn print_roster(records: &[GuardianRecord]) {
    if records.is_empty() {
        println!("No guardians yet.");
        return;
    }
    for g in records {
        match &g.added_at {
            Some(added) => println!("  #{} {} <{}> (added {added})", g.id, g.name, g.email),
            None => println!("  #{} {} <{}>", g.id, g.name, g.email),
        }
    }
}

/// Split `<name words...> <email>`.
fn name_and_email(args: &[&str]) -> Option<GuardianFields> {
    let (email, name) = args.split_last()?;
    if name.is_empty() {
        return None;
    }
    Some(GuardianFields::new(name.join(" "), *email))
}

enum Flow {
    Continue,
    Quit,
}

async fn dispatch(client: &AuraClient, line: &str) -> Flow {
    let Some(command) = line.strip_prefix('/') else {
        if client.chat().send(line).await == SendOutcome::Busy {
            println!("Still waiting for the last reply.");
        }
        return Flow::Continue;
    };

    let words: Vec<&str> = command.split_whitespace().collect();
    match words.as_slice() {
        ["quit" | "exit"] => return Flow::Quit,
        ["help"] => println!("{HELP}"),
        ["login", user, password] => match client.login(user, password).await {
            Ok(()) => println!("Logged in as {user}."),
            Err(e) => println!("! {e}"),
        },
        ["register", user, password] => match client.register(user, password).await {
            Ok(()) => println!("Registered and logged in as {user}."),
            Err(e) => println!("! {e}"),
        },
        ["logout"] => match client.logout().await {
            Ok(()) => println!("Logged out."),
            Err(e) => println!("! {e}"),
        },
        ["guardians"] => match client.roster().list(false).await {
            Ok(records) => print_roster(&records),
            Err(e) => println!("! {e}"),
        },
        ["guardians", "refresh"] => match client.roster().force_refresh().await {
            Ok(records) => print_roster(&records),
            Err(e) => println!("! {e}"),
        },
        ["add", rest @ ..] => match name_and_email(rest) {
            Some(fields) => match client.roster().create(&fields.name, &fields.email).await {
                Ok(g) => println!("Added #{} {}.", g.id, g.name),
                Err(e) => println!("! {e}"),
            },
            None => println!("Usage: /add <name> <email>"),
        },
        ["edit", id, rest @ ..] => match (id.parse(), name_and_email(rest)) {
            (Ok(id), Some(fields)) => match client.roster().update(id, &fields).await {
                Ok(g) => println!("Updated #{} {}.", g.id, g.name),
                Err(e) => println!("! {e}"),
            },
            _ => println!("Usage: /edit <id> <name> <email>"),
        },
        ["remove", id] => match id.parse() {
            Ok(id) => match client.remove_guardian(id).await {
                Ok(()) => println!("Removed #{id}."),
                Err(e) => println!("! {e}"),
            },
            Err(_) => println!("Usage: /remove <id>"),
        },
        _ => println!("Unknown command. Type /help."),
    }
    Flow::Continue
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config =
        ClientConfig::load(config_path.as_deref()).context("failed to load configuration")?;
    let api = HttpApi::from_config(&config)?;
    tracing::info!(api_base = %api.base_url(), "starting aura client");

    let store = open_store().await?;
    let input: Input = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let prompt = StdinPrompt {
        input: Arc::clone(&input),
    };

    let client = AuraClient::connect(
        &config,
        Arc::new(api),
        store,
        Arc::new(LogPlayer),
        Arc::new(prompt),
    )
    .await?;

    println!("{HELP}\n");
    spawn_renderer(&client);

    while let Some(line) = read_line(&input).await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Flow::Quit = dispatch(&client, line).await {
            break;
        }
    }

    Ok(())
}
