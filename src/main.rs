//! paneld - Web admin panel backend daemon
//!
//! Serves the panel API: session login/validation and a sandboxed file
//! browser. User accounts are managed from the command line.

use anyhow::{anyhow, Context, Result};
use axum_extra::extract::cookie::Key;
use clap::{Parser, Subcommand};
use rand::Rng;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use paneld::api::AppState;
use paneld::audit::AuditLog;
use paneld::config::{self, Config};
use paneld::kv::KvStore;
use paneld::server::run_server;
use paneld::session::{SessionStore, SessionValidator};
use paneld::users::UserStore;

/// Web admin panel backend
#[derive(Parser)]
#[command(name = "paneld")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value_os_t = Config::default_path())]
    config: PathBuf,

    /// Data directory for stores, keys, and logs
    #[arg(short, long, default_value_os_t = Config::default_data_dir())]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the panel daemon
    Serve {
        /// Address to listen on (overrides config)
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// User account management
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Generate a default configuration file
    InitConfig {
        /// Output path (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user account
    Add {
        username: String,

        /// Role for the account (e.g. "admin", "user")
        #[arg(long, default_value = "admin")]
        role: String,

        /// Password for the account
        #[arg(long)]
        password: String,
    },

    /// Remove a user account
    Remove { username: String },

    /// List user accounts
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    match cli.command {
        Commands::Serve { listen } => {
            init_daemon_logging(&cli.data_dir, filter)?;
            serve(&cli.config, &cli.data_dir, listen).await
        }
        Commands::User { command } => {
            init_cli_logging(filter);
            handle_user_command(command, &cli.data_dir).await
        }
        Commands::InitConfig { output } => {
            init_cli_logging(filter);
            generate_config(output)
        }
    }
}

/// Initialize logging for CLI commands (stdout only).
fn init_cli_logging(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

/// Initialize logging for daemon mode (stdout + rotating file).
fn init_daemon_logging(data_dir: &Path, filter: EnvFilter) -> Result<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("paneld")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create log file appender")?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer alive for the lifetime of the daemon.
    std::mem::forget(guard);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    info!("Logging to: {}", log_dir.display());
    Ok(())
}

fn ensure_data_dir(data_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))
}

/// Load the cookie signing key, generating and persisting one on first run.
fn load_or_create_cookie_key(data_dir: &Path) -> Result<Key> {
    let path = data_dir.join("cookie.key");

    if path.exists() {
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Key::try_from(&bytes[..])
            .map_err(|e| anyhow!("Invalid cookie key in {}: {e}", path.display()));
    }

    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes[..]);
    std::fs::write(&path, bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    info!("Generated new cookie signing key at {}", path.display());

    Ok(Key::from(&bytes))
}

fn open_user_store(data_dir: &Path) -> Result<Arc<UserStore>> {
    Ok(Arc::new(UserStore::open(KvStore::new(
        &data_dir.join("users"),
    )?)?))
}

/// Run the panel daemon
async fn serve(config_path: &Path, data_dir: &Path, listen_override: Option<SocketAddr>) -> Result<()> {
    ensure_data_dir(data_dir)?;

    let config = Config::load(config_path)?;

    let listen_addr: SocketAddr = match listen_override {
        Some(addr) => addr,
        None => config
            .http
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address: {}", config.http.listen_addr))?,
    };

    let cookie_key = load_or_create_cookie_key(data_dir)?;
    let users = open_user_store(data_dir)?;
    let sessions = SessionStore::new(KvStore::new(&data_dir.join("sessions"))?);
    let audit = AuditLog::spawn(&data_dir.join("logs"))?;

    info!(
        base_dir = %config.files.base_dir.display(),
        timeout_minutes = config.session.inactivity_timeout_minutes,
        "Panel daemon starting"
    );

    let state = Arc::new(AppState {
        validator: SessionValidator::new(sessions, users.clone()),
        users,
        audit,
        base_dir: config.files.base_dir.clone(),
        session: config.session.clone(),
        cookie_key,
    });

    run_server(listen_addr, state).await
}

async fn handle_user_command(command: UserCommands, data_dir: &Path) -> Result<()> {
    ensure_data_dir(data_dir)?;
    let users = open_user_store(data_dir)?;

    match command {
        UserCommands::Add {
            username,
            role,
            password,
        } => {
            let profile = users.create_user(&username, &role, &password).await?;
            println!("Created user {} ({}) id={}", profile.username, profile.role, profile.id);
        }
        UserCommands::Remove { username } => {
            if users.delete_user(&username).await? {
                println!("Removed user {username}");
            } else {
                return Err(anyhow!("User not found: {username}"));
            }
        }
        UserCommands::List => {
            for profile in users.list_users().await {
                println!(
                    "{}\t{}\t{:?}\t{}",
                    profile.username, profile.role, profile.status, profile.id
                );
            }
        }
    }

    Ok(())
}

fn generate_config(output: Option<PathBuf>) -> Result<()> {
    let template = config::default_config_template();
    match output {
        Some(path) => {
            std::fs::write(&path, template)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote configuration template to {}", path.display());
        }
        None => print!("{template}"),
    }
    Ok(())
}
