//! Contech CLI - command-line session client for the Contech marketplace
//!
//! Signs in against the identity service, keeps the token on disk and reports
//! where each role lands.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use contech_core::{
    config_error, default_config_paths, init_logging, log_operation_error, log_operation_success,
    with_timeout, ContechConfig, ContechResult, ProfileUpdate, Role, SessionState, SignUpMetadata,
};
use contech_identity::{FileTokenStore, HttpIdentityClient, IdentityClientConfig};
use contech_session::{evaluate, post_auth_route, RouteDecision, SessionError, SessionManager};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

const PASSWORD_ENV: &str = "CONTECH_PASSWORD";

#[derive(Parser)]
#[command(name = "contech")]
#[command(about = "Session client for the Contech construction marketplace")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        email: String,

        /// Password (falls back to CONTECH_PASSWORD)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account and sign in with it
    Register {
        email: String,

        /// BUILDER, CONTRACTOR or SUPPLIER
        #[arg(long)]
        role: Role,

        /// Password (falls back to CONTECH_PASSWORD)
        #[arg(short, long)]
        password: Option<String>,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        phone: Option<String>,
    },

    /// Sign out and forget the stored token
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Show how a location is handled for the current session
    Route {
        /// Location, e.g. /contractor/projects
        path: String,
    },

    /// Update the signed-in user's profile
    Profile {
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        phone: Option<String>,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A broken config file must not prevent `config --init` or `--validate`
    let loaded = load_config(cli.config.as_ref());
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_logging(&if cli.verbose { logging.verbose() } else { logging })?;

    debug!("Starting Contech CLI v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Login { email, password } => {
            handle_login(&email, password, &loaded?).await?;
        }
        Commands::Register {
            email,
            role,
            password,
            first_name,
            last_name,
            phone,
        } => {
            let metadata = SignUpMetadata {
                first_name,
                last_name,
                role: Some(role),
                phone_number: phone,
            };
            handle_register(&email, password, metadata, &loaded?).await?;
        }
        Commands::Logout => {
            let session = build_session(&loaded?)?;
            session.sign_out();
            println!("👋 Signed out");
        }
        Commands::Whoami => {
            handle_whoami(&loaded?).await?;
        }
        Commands::Route { path } => {
            handle_route(&path, &loaded?).await?;
        }
        Commands::Profile {
            first_name,
            last_name,
            phone,
        } => {
            let update = ProfileUpdate {
                first_name,
                last_name,
                phone_number: phone,
            };
            handle_profile(&update, &loaded?).await?;
        }
        Commands::Config {
            show,
            init,
            validate,
        } => {
            handle_config(show, init, validate, cli.config.as_ref())?;
        }
    }

    Ok(())
}

fn load_config(config_path: Option<&PathBuf>) -> ContechResult<ContechConfig> {
    let mut config = match config_path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            ContechConfig::from_file(path)?
        }
        None => match default_config_paths().into_iter().find(|p| p.exists()) {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                ContechConfig::from_file(&path)?
            }
            None => {
                debug!("No configuration file found, using defaults");
                ContechConfig::default()
            }
        },
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn build_session(config: &ContechConfig) -> ContechResult<SessionManager> {
    let token_store = FileTokenStore::from_config(config)?;
    let identity = HttpIdentityClient::new(IdentityClientConfig::from(&config.identity))?;
    debug!(token_path = ?token_store.path(), base_url = %config.identity.base_url, "Session ready");

    Ok(SessionManager::new(Arc::new(token_store), Arc::new(identity)))
}

fn timeout_ms(config: &ContechConfig) -> u64 {
    config.identity.timeout_seconds.saturating_mul(1000)
}

/// Build a session and resolve the stored token within the configured timeout
async fn resolved_session(config: &ContechConfig) -> ContechResult<SessionManager> {
    let session = build_session(config)?;
    with_timeout(session.resolve(), timeout_ms(config), "resolve_session").await?;
    Ok(session)
}

fn password_or_env(password: Option<String>) -> anyhow::Result<String> {
    password
        .or_else(|| std::env::var(PASSWORD_ENV).ok())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow!("A password is required: pass --password or set {}", PASSWORD_ENV))
}

fn report_failure(operation: &str, error: SessionError) -> anyhow::Error {
    log_operation_error!(operation, error);
    println!("❌ {}", error.message());
    anyhow!(error.message())
}

async fn handle_login(
    email: &str,
    password: Option<String>,
    config: &ContechConfig,
) -> anyhow::Result<()> {
    let password = password_or_env(password)?;
    let session = build_session(config)?;

    let signed_in = with_timeout(session.sign_in(email, &password), timeout_ms(config), "sign_in")
        .await?
        .map_err(|e| report_failure("sign_in", e))?;

    log_operation_success!("sign_in");
    print_landing(signed_in.as_ref());
    Ok(())
}

async fn handle_register(
    email: &str,
    password: Option<String>,
    metadata: SignUpMetadata,
    config: &ContechConfig,
) -> anyhow::Result<()> {
    let password = password_or_env(password)?;
    let session = build_session(config)?;

    let signed_up = with_timeout(
        session.sign_up(email, &password, metadata),
        timeout_ms(config),
        "sign_up",
    )
    .await?
    .map_err(|e| report_failure("sign_up", e))?;

    log_operation_success!("sign_up");
    print_landing(signed_up.as_ref());
    Ok(())
}

fn print_landing(user: Option<&contech_core::UserRecord>) {
    match user {
        Some(user) => println!(
            "✅ Signed in as {} ({})",
            user.display_name(),
            user.role()
        ),
        None => println!("⚠️  Signed in, but the account could not be loaded"),
    }
    println!("➡️  {}", post_auth_route(user));
}

async fn handle_whoami(config: &ContechConfig) -> anyhow::Result<()> {
    let session = resolved_session(config).await?;

    match session.state() {
        SessionState::Authenticated(user) => {
            println!("👤 {}", user.display_name());
            println!("   email: {}", user.email);
            println!("   role:  {}", user.role());
            if let Some(phone) = &user.profile.phone_number {
                println!("   phone: {}", phone);
            }
            println!("   home:  {}", post_auth_route(Some(&user)));
        }
        _ => println!("Not signed in"),
    }
    Ok(())
}

async fn handle_route(path: &str, config: &ContechConfig) -> anyhow::Result<()> {
    let session = resolved_session(config).await?;

    match evaluate(&session.state(), path) {
        RouteDecision::Loading => println!("⏳ {} waits for the session", path),
        RouteDecision::Render => println!("✅ {} renders", path),
        RouteDecision::Redirect(target) => println!("➡️  {} redirects to {}", path, target),
    }
    Ok(())
}

async fn handle_profile(update: &ProfileUpdate, config: &ContechConfig) -> anyhow::Result<()> {
    if update.is_empty() {
        return Err(anyhow!(
            "Nothing to update: pass --first-name, --last-name or --phone"
        ));
    }

    let session = resolved_session(config).await?;
    let user = with_timeout(
        session.update_profile(update),
        timeout_ms(config),
        "update_profile",
    )
    .await?
    .map_err(|e| report_failure("update_profile", e))?;

    println!("✅ Profile updated for {}", user.display_name());
    Ok(())
}

fn handle_config(
    show: bool,
    init: bool,
    validate: bool,
    config_path: Option<&PathBuf>,
) -> anyhow::Result<()> {
    if init {
        let path = match config_path {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        ContechConfig::default().save_to_file(&path)?;
        println!("✅ Configuration initialized at: {:?}", path);
    }

    if show {
        let config = load_config(config_path)?;
        let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
        println!("📋 Current configuration:");
        println!("{}", rendered);
    }

    if validate {
        match load_config(config_path) {
            Ok(_) => println!("✅ Configuration is valid"),
            Err(e) => {
                println!("❌ Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}

/// First default location, used by `config --init`
fn default_config_path() -> ContechResult<PathBuf> {
    default_config_paths()
        .into_iter()
        .next()
        .ok_or_else(|| config_error!("No configuration directory available", "cli"))
}
