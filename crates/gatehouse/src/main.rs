use std::env;
use std::io::{self, IsTerminal, Read, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use log::{LevelFilter, debug, info, warn};
use tokio::net::TcpListener;

use gatehouse::api::{self, AppState};
use gatehouse::auth::{self, AuthConfig, EnvSnapshot, Role, Status};
use gatehouse::db::Database;
use gatehouse::settings::{self, APP_NAME, AppConfig};
use gatehouse::user::{NewUser, UserRepository};

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_serve(ctx: RuntimeContext, cmd: ServeCommand) -> Result<()> {
    handle_serve(&ctx, cmd).await
}

#[tokio::main]
async fn async_user(ctx: RuntimeContext, cmd: UserCommand) -> Result<()> {
    handle_user(&ctx, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("config file: {}", ctx.config_file.display());

    match cli.command {
        Command::Serve(cmd) => async_serve(ctx, cmd),
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::HashPassword(cmd) => handle_hash_password(cmd),
        Command::User { command } => async_user(ctx, command),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Gatehouse - authentication and route authorization gate.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Output machine readable JSON
    #[arg(long, global = true, conflicts_with = "yaml")]
    json: bool,
    /// Output machine readable YAML
    #[arg(long, global = true)]
    yaml: bool,
    /// Disable ANSI colors in output
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    no_color: bool,
    /// Control color output (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    color: ColorOption,
    /// Emit additional diagnostics for troubleshooting
    #[arg(long = "diagnostics", global = true)]
    diagnostics: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorOption {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve(ServeCommand),
    /// Create the default config file
    Init(InitCommand),
    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Print a bcrypt hash for a password
    HashPassword(HashPasswordCommand),
    /// Manage users in the user store
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Host address to bind to (overrides server.host)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Clone, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration
    Show,
    /// Print the resolved config file path
    Path,
    /// Regenerate the default configuration file
    Reset,
}

#[derive(Debug, Clone, Args)]
struct HashPasswordCommand {
    /// Password to hash. Read from stdin when omitted.
    password: Option<String>,
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    /// Add a user
    Add(UserAddCommand),
    /// Change a user's status
    SetStatus {
        /// User ID
        id: String,
        /// New status (PENDING, ACTIVE, SUSPENDED, INACTIVE, REJECTED)
        status: Status,
    },
    /// Change a user's role
    SetRole {
        /// User ID
        id: String,
        /// New role (VOLUNTEER, STAFF, ADMIN, SUPER_ADMIN)
        role: Role,
    },
    /// List users
    List,
}

#[derive(Debug, Clone, Args)]
struct UserAddCommand {
    /// Email address
    #[arg(long)]
    email: String,
    /// Password (omit for accounts that only use a delegated provider)
    #[arg(long)]
    password: Option<String>,
    /// Display name
    #[arg(long)]
    name: Option<String>,
    /// Role
    #[arg(long, default_value = "VOLUNTEER")]
    role: Role,
    /// Status
    #[arg(long, default_value = "PENDING")]
    status: Status,
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    config_file: PathBuf,
    config: AppConfig,
    env: EnvSnapshot,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let config_file = match common.config.as_ref().and_then(|p| p.to_str()) {
            Some(path) => {
                let expanded = settings::expand_str_path(path)?;
                if expanded.is_dir() {
                    expanded.join("config.toml")
                } else {
                    expanded
                }
            }
            None => settings::default_config_dir()?.join("config.toml"),
        };

        let config = settings::load(&config_file)?;

        Ok(Self {
            common,
            config_file,
            config,
            env: EnvSnapshot::capture(),
        })
    }

    fn auth_debug(&self) -> bool {
        self.config.auth.debug || self.env.get("AUTH_DEBUG") == Some("true")
    }

    fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }

        let level = match self.effective_log_level() {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        };

        let mut directives = format!("gatehouse={level},tower_http={level}");
        if self.auth_debug() {
            directives.push_str(",gatehouse::auth=debug");
        }
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

        if self.common.json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .ok();
        } else {
            let force_color = matches!(self.common.color, ColorOption::Always)
                || env::var_os("FORCE_COLOR").is_some();
            let disable_color = self.common.no_color
                || matches!(self.common.color, ColorOption::Never)
                || env::var_os("NO_COLOR").is_some()
                || (!force_color && !io::stderr().is_terminal());

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(!disable_color)
                        .with_target(self.common.diagnostics)
                        .with_file(self.common.diagnostics)
                        .with_line_number(self.common.diagnostics),
                )
                .try_init()
                .ok();
        }

        // Also init env_logger for compatibility with log crate users
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        builder.filter_level(self.effective_log_level());
        builder.try_init().ok();

        Ok(())
    }

    fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => self
                    .config
                    .logging
                    .level
                    .parse()
                    .unwrap_or(LevelFilter::Info),
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn database_path(&self) -> Result<PathBuf> {
        match self.config.database.path.as_deref() {
            Some(path) => settings::expand_str_path(path),
            None => Ok(settings::default_data_dir()?.join("gatehouse.db")),
        }
    }

    fn print<T: serde::Serialize + std::fmt::Debug>(&self, value: &T) -> Result<()> {
        if self.common.json {
            println!(
                "{}",
                serde_json::to_string_pretty(value).context("serializing output to JSON")?
            );
        } else if self.common.yaml {
            println!(
                "{}",
                serde_yaml::to_string(value).context("serializing output to YAML")?
            );
        } else {
            println!("{value:#?}");
        }
        Ok(())
    }
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.config_file.exists() && !cmd.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.config_file.display()
        ));
    }

    settings::write_default(&ctx.config_file)?;
    info!("wrote default config to {}", ctx.config_file.display());
    Ok(())
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => ctx.print(&ctx.config),
        ConfigCommand::Path => {
            println!("{}", ctx.config_file.display());
            Ok(())
        }
        ConfigCommand::Reset => settings::write_default(&ctx.config_file),
    }
}

fn handle_hash_password(cmd: HashPasswordCommand) -> Result<()> {
    let password = match cmd.password {
        Some(password) => password,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("reading password from stdin")?;
            buffer.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        return Err(anyhow!("password must not be empty"));
    }

    let hash = auth::hash_password(&password).context("hashing password")?;
    println!("{hash}");
    Ok(())
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}

async fn handle_user(ctx: &RuntimeContext, cmd: UserCommand) -> Result<()> {
    let database = Database::new(&ctx.database_path()?).await?;
    let users = UserRepository::new(database.pool().clone());

    match cmd {
        UserCommand::Add(add) => {
            let mut request = NewUser::new(add.email)
                .with_role(add.role)
                .with_status(add.status);
            if let Some(name) = add.name {
                request = request.with_name(name);
            }
            if let Some(password) = add.password {
                request = request
                    .with_password_hash(auth::hash_password(&password).context("hashing password")?);
            }
            let user = users.create(request).await?;
            ctx.print(&user)?;
        }
        UserCommand::SetStatus { id, status } => {
            if !users.set_status(&id, status).await? {
                return Err(anyhow!("no user with id {id}"));
            }
            info!("user {id} is now {status}");
        }
        UserCommand::SetRole { id, role } => {
            if !users.set_role(&id, role).await? {
                return Err(anyhow!("no user with id {id}"));
            }
            info!("user {id} is now {role}");
        }
        UserCommand::List => {
            let list = users.list().await?;
            ctx.print(&list)?;
        }
    }

    database.close().await;
    Ok(())
}

async fn handle_serve(ctx: &RuntimeContext, cmd: ServeCommand) -> Result<()> {
    info!("Starting gatehouse...");

    let auth_config = AuthConfig::resolve(&ctx.config.auth, &ctx.env)
        .context("Invalid auth configuration")?;
    if auth_config.secret_is_ephemeral {
        warn!("No JWT secret configured; using a random one. Sessions will not survive a restart.");
    }
    info!(
        "Auth environment: {:?}, base URL: {}, secure cookies: {}",
        auth_config.environment,
        auth_config.base_url,
        auth_config.use_secure_cookies()
    );

    let db_path = ctx.database_path()?;
    info!("Database path: {}", db_path.display());
    let database = Database::new(&db_path).await?;
    let users = Arc::new(UserRepository::new(database.pool().clone()));

    let state = AppState::new(auth_config, users);
    let app = api::create_router(state);

    let host = cmd.host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = cmd.port.unwrap_or(ctx.config.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("invalid address")?;

    let listener = TcpListener::bind(addr)
        .await
        .context("binding to address")?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running server")?;

    database.close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
