// snakedraft console entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, the terminal is for commands)
// 2. Load config
// 3. Open database
// 4. Build the draft service
// 5. Read commands from stdin until EOF or `quit`

use std::sync::Arc;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use snakedraft_app::app::{Actor, DraftService};
use snakedraft_app::config;
use snakedraft_app::db::Database;
use snakedraft_app::notify::ConsoleNotifier;
use snakedraft_app::protocol::{UserCommand, HELP};
use snakedraft_app::teams;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("snakedraft starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        workspace = %config.workspace.id,
        alliance_size = config.draft.alliance_size,
        admission = ?config.draft.admission,
        "Config loaded"
    );

    // 3. Open database
    let db_path = config::resolve_db_path(&config.db_path);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db_path_str = db_path.to_string_lossy().into_owned();
    let db = Database::open(&db_path_str).context("failed to open database")?;
    info!("Database opened at {}", db_path_str);

    // 4. Build the service
    let rng = match std::env::var("SNAKEDRAFT_SEED").ok().and_then(|s| s.parse().ok()) {
        Some(seed) => {
            info!(seed, "Using fixed RNG seed");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_os_rng(),
    };
    let service = DraftService::from_config(
        &config,
        Arc::new(db),
        teams::provider_from_config(&config),
        Arc::new(ConsoleNotifier::new()),
        rng,
    );

    // 5. Command loop
    let identity = std::env::var("USER").unwrap_or_else(|_| "local".to_string());
    let mut actor = Actor::new(identity.clone(), identity);
    run_console(&service, &mut actor).await?;

    info!("snakedraft shutting down");
    Ok(())
}

async fn run_console(service: &DraftService, actor: &mut Actor) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(format!("snakedraft: acting as {}. Type `help` for commands.\n", actor.identity).as_bytes())
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match UserCommand::parse(&line) {
            Ok(UserCommand::Quit) => break,
            Ok(UserCommand::Help) => HELP.to_string(),
            Ok(command) => {
                if let UserCommand::As {
                    identity,
                    display_name,
                } = &command
                {
                    *actor = Actor::new(identity.clone(), display_name.clone());
                }
                match service.handle_command(actor, command).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!(identity = %actor.identity, error = %e, "Command failed");
                        format!("error: {e}")
                    }
                }
            }
            Err(e) => format!("error: {e}"),
        };

        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("snakedraft.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("snakedraft=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
