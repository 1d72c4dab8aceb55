//! db-chat - chat with your databases in plain language.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use db_chat::backend::{AuthToken, Authenticator, ChatBackend, HttpAuthenticator, HttpBackend};
use db_chat::cli::Cli;
use db_chat::config::Config;
use db_chat::logging::{init_file_logging, init_stderr_logging};
use db_chat::persistence::{MemoryTranscriptStore, SqliteTranscriptStore, StateDb, TranscriptStore};
use db_chat::repl::{self, ReplCommand};
use db_chat::SessionContext;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    if cli.stderr_log {
        init_stderr_logging();
    } else {
        init_file_logging();
    }

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.api.apply_env_defaults();
    cli.apply_to(&mut config);

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let token = match config.api.token.clone() {
        Some(token) => {
            info!("Using configured session token");
            AuthToken::new(token)
        }
        None => login(&cli, &config, &mut input).await?,
    };

    let backend: Arc<dyn ChatBackend> = Arc::new(HttpBackend::new(&config.api, token.clone())?);
    let store = open_store(&config).await;
    let mut session = SessionContext::establish(token, backend, store).await;

    println!("{}", repl::render_connections(session.connections(), None));
    println!("Type :help for commands.");

    run_repl(&mut session, &mut input).await?;
    session.logout();
    Ok(())
}

async fn prompt(input: &mut Input, label: &str) -> anyhow::Result<Option<String>> {
    print!("{label}");
    std::io::stdout().flush()?;
    Ok(input.next_line().await?)
}

async fn login(cli: &Cli, config: &Config, input: &mut Input) -> anyhow::Result<AuthToken> {
    let authenticator = HttpAuthenticator::new(&config.api)?;

    let username = match &cli.username {
        Some(username) => username.clone(),
        None => prompt(input, "Username: ")
            .await?
            .context("No username given")?,
    };
    let password = prompt(input, "Password: ")
        .await?
        .context("No password given")?;

    let credentials = cli.credentials(username, password);
    let token = authenticator
        .authenticate(&credentials, cli.auth_mode())
        .await?;
    info!(user = %credentials.username, "Authenticated");
    Ok(token)
}

/// Opens the transcript store, falling back to memory if the state database is
/// unavailable.
async fn open_store(config: &Config) -> Arc<dyn TranscriptStore> {
    if config.storage.in_memory {
        return Arc::new(MemoryTranscriptStore::new());
    }

    let opened = match &config.storage.path {
        Some(path) => StateDb::open(path).await,
        None => StateDb::open_default().await,
    };
    match opened {
        Ok(db) => Arc::new(SqliteTranscriptStore::new(&db)),
        Err(e) => {
            warn!("Transcripts will not be saved: {e}");
            eprintln!("Warning: transcripts will not be saved ({e})");
            Arc::new(MemoryTranscriptStore::new())
        }
    }
}

async fn run_repl(session: &mut SessionContext, input: &mut Input) -> anyhow::Result<()> {
    loop {
        let label = match session.active() {
            Some(active) => format!("{}> ", active.name),
            None => "> ".to_string(),
        };
        let Some(line) = prompt(input, &label).await? else {
            break;
        };

        let command = match ReplCommand::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match command {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{}", repl::HELP),
            ReplCommand::List => {
                if let Err(e) = session.refresh_connections().await {
                    println!("{}: {e}", e.category());
                }
                println!(
                    "{}",
                    repl::render_connections(session.connections(), session.active())
                );
            }
            ReplCommand::Use(arg) => {
                let Some(id) = repl::resolve_connection(session.connections(), &arg)
                    .map(|c| c.id.clone())
                else {
                    println!("No connection '{arg}'. Use :list to see saved connections.");
                    continue;
                };
                println!("Testing connection...");
                if let Err(e) = session.select(&id).await {
                    println!("{e}");
                    continue;
                }
                println!("{}", repl::render_state(session.active(), session.state()));
                if session.state().is_connected() && !session.transcript().is_empty() {
                    println!("{}", repl::render_transcript(session.transcript()));
                }
            }
            ReplCommand::Retest => {
                session.retest().await;
                println!("{}", repl::render_state(session.active(), session.state()));
            }
            ReplCommand::Leave => {
                session.deselect();
                println!("{}", repl::render_state(None, session.state()));
            }
            ReplCommand::Add(fields) => match session.add_connection(&fields).await {
                Ok(created) => println!("Saved connection {}.", created.name),
                Err(e) => println!("{e}"),
            },
            ReplCommand::Delete(arg) => {
                let Some(id) = repl::resolve_connection(session.connections(), &arg)
                    .map(|c| c.id.clone())
                else {
                    println!("No connection '{arg}'.");
                    continue;
                };
                match session.delete_connection(&id).await {
                    Ok(()) => println!("Deleted."),
                    Err(e) => println!("{e}"),
                }
            }
            ReplCommand::History => {
                println!("{}", repl::render_transcript(session.transcript()));
            }
            ReplCommand::Ask(question) => {
                if !session.state().is_connected() {
                    println!("{}", repl::render_state(session.active(), session.state()));
                    continue;
                }
                if session.ask(&question).await {
                    if let Some(turn) = session.transcript().last() {
                        println!("{}", repl::render_turn(turn));
                    }
                }
            }
        }
    }
    Ok(())
}
