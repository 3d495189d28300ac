//! Terminal client for a server-authoritative solitaire game.
//!
//! Every command becomes one request; the board redraws whenever the store
//! reports a change.

use anyhow::{Context, Result};
use pico_args::Arguments;
use solitaire::functional;
use std::{path::PathBuf, sync::Arc};
use tokio::io::{AsyncBufReadExt, BufReader};

use sol_client::{
    api_client::HttpTransport,
    commands::{self, Command, parse_command},
    config::{ClientConfig, Overrides},
    dispatcher::{DispatchOutcome, DispatchResult, Dispatcher},
    interaction::{DragEvent, Feedback, InteractionAdapter},
    logging,
    session::{FileLocation, Location, MemoryLocation, SessionManager},
    store::GameStore,
    view,
};

const HELP: &str = "\
Play solitaire against a game server

USAGE:
  sol_client [OPTIONS]

OPTIONS:
  --server URL           Server URL  [default: http://localhost:8080]
  --resume URL           Link of a game to resume
  --location-file PATH   Remember the game link in this file between runs
  --offline              Deal cards locally without a server

FLAGS:
  -h, --help             Print help information
";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = Overrides {
        server: pargs.opt_value_from_str("--server")?,
        location: pargs.opt_value_from_str("--resume")?,
        location_file: pargs.opt_value_from_os_str("--location-file", |s| {
            Ok::<_, std::convert::Infallible>(PathBuf::from(s))
        })?,
        offline: pargs.contains("--offline"),
    };

    logging::init();
    let config = ClientConfig::from_env(overrides).context("Invalid configuration")?;

    if config.offline {
        run_offline().await
    } else {
        run_online(config).await
    }
}

/// Redraw the board after every store change.
async fn spawn_renderer(store: Arc<GameStore>) -> tokio::task::JoinHandle<()> {
    let mut notifications = store.subscribe().await;
    tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            tracing::debug!(revision = notification.revision, changed = ?notification.changed, "Redrawing");
            print_board(&store).await;
        }
    })
}

async fn print_board(store: &GameStore) {
    println!("\n{}\n", view::render_store(store).await);
}

fn report(result: DispatchResult<DispatchOutcome>) {
    match Feedback::from(result) {
        Feedback::Moved => {}
        feedback => println!("{feedback}"),
    }
}

async fn run_online(config: ClientConfig) -> Result<()> {
    let location: Box<dyn Location> = match &config.location_file {
        Some(path) => Box::new(FileLocation::new(path, config.location.clone())),
        None => Box::new(MemoryLocation::new(config.location.clone())),
    };
    let session = Arc::new(
        SessionManager::from_location(location)
            .await
            .context("Failed to read the game location")?,
    );
    let transport =
        Arc::new(HttpTransport::new(config.timeout).context("Failed to build HTTP client")?);
    let store = Arc::new(GameStore::new(config.deck_size));
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        session.clone(),
        transport,
        config.server.clone(),
    ));
    let adapter = InteractionAdapter::new(dispatcher.clone());
    let renderer = spawn_renderer(store.clone()).await;

    tracing::info!(server = %config.server, "Connecting");
    if let Err(e) = dispatcher.request_state().await {
        eprintln!("Could not load the game: {e}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match command {
            Command::State => report(dispatcher.request_state().await),
            Command::NewGame => report(dispatcher.request_new_game().await),
            Command::Move { from, to } => {
                let mut event = DragEvent::new();
                adapter.on_drag_start(&mut event, from);
                adapter.on_drag_over(&mut event);
                match adapter.on_drop(&mut event, to).await {
                    Feedback::Moved => {}
                    feedback => println!("{feedback}"),
                }
            }
            Command::Flip => report(dispatcher.request_flip_stock().await),
            Command::Undo => report(dispatcher.request_undo().await),
            Command::Auto => report(dispatcher.request_foundation_autoplay().await),
            Command::Show => print_board(&store).await,
            Command::Link => match session.shareable_link().await {
                Ok(link) => println!("{link}"),
                Err(e) => eprintln!("{e}"),
            },
            Command::Help => print!("{}", commands::HELP),
            Command::Quit => break,
            Command::Deal { .. } | Command::Shuffle => {
                eprintln!("'deal' and 'shuffle' only work with --offline");
            }
        }
    }

    renderer.abort();
    Ok(())
}

async fn run_offline() -> Result<()> {
    let mut deck = functional::build_deck();
    functional::shuffle_thread(&mut deck);
    let store = Arc::new(GameStore::with_local_deck(deck));
    let renderer = spawn_renderer(store.clone()).await;
    println!("Offline mode. Type 'help' for commands.");
    print_board(&store).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(Command::Deal { hand, count }) => match store.deal(hand, count).await {
                Ok(0) => println!("The stock is empty"),
                Ok(_) => {}
                Err(e) => eprintln!("{e}"),
            },
            Ok(Command::Shuffle) => {
                if let Err(e) = store.new_local_game(&mut rand::rng()).await {
                    eprintln!("{e}");
                }
            }
            Ok(Command::Show) => print_board(&store).await,
            Ok(Command::Help) => print!("{}", commands::HELP),
            Ok(Command::Quit) => break,
            Ok(_) => eprintln!("That command needs a server; restart without --offline"),
            Err(e) => eprintln!("{e}"),
        }
    }

    renderer.abort();
    Ok(())
}
