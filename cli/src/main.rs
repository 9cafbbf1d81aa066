use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use pms_client::net::types::{BoardPatch, ProfileUpdate};
use pms_client::state::boards::BoardsState;
use pms_client::util::validation::{BoardForm, LoginForm, RegisterForm, ValidationErrors};
use pms_client::{App, AppError, ClientConfig, ConfigError, Route};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    App(#[from] AppError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("backend is not healthy")]
    Unhealthy,
    /// A 401 ended the session while the command ran.
    #[error(transparent)]
    LoginRequired(AppError),
}

#[derive(Parser, Debug)]
#[command(name = "pms-cli", about = "Project management API client")]
struct Cli {
    #[arg(long, env = "PMS_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "PMS_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the backend and its database.
    Ping,
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// Print the stored profile.
    Whoami,
    Profile(ProfileCommand),
    Boards(BoardsCommand),
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    /// Change profile fields in the local session only.
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Args, Debug)]
struct BoardsCommand {
    #[command(subcommand)]
    command: BoardsSubcommand,
}

#[derive(Subcommand, Debug)]
enum BoardsSubcommand {
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Show {
        board_id: i64,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value_t = false)]
        public: bool,
    },
    Update {
        board_id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        public: Option<bool>,
    },
    Delete {
        board_id: i64,
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        archive: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            for line in error_lines(&err) {
                eprintln!("{line}");
            }
            ExitCode::FAILURE
        }
    }
}

fn build_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = &cli.api_url {
        config = config.with_api_url(api_url);
    }
    if let Some(session_file) = &cli.session_file {
        config = config.with_session_file(session_file.clone());
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = build_config(&cli)?;
    let app = App::start(config).await?;
    let mut routes = app.subscribe_route();

    let result = dispatch(&app, cli.command).await;
    let sent_to_login = routes.has_changed().unwrap_or(false) && *routes.borrow_and_update() == Route::Login;
    app.shutdown();

    match result {
        Err(CliError::App(err)) if sent_to_login && err.is_unauthorized() => Err(CliError::LoginRequired(err)),
        other => other,
    }
}

async fn dispatch(app: &App, command: Command) -> Result<(), CliError> {
    match command {
        Command::Ping => run_ping(app).await,
        Command::Register { email, password, name } => {
            let user = app.register(&RegisterForm { name, email, password }).await?;
            print_json(&serde_json::to_value(user)?)
        }
        Command::Login { email, password } => {
            let user = app.login(&LoginForm { email, password }).await?;
            print_json(&serde_json::to_value(user)?)
        }
        Command::Logout => {
            app.logout()?;
            println!("logged out");
            Ok(())
        }
        Command::Whoami => {
            match app.session().user() {
                Some(user) => print_json(&serde_json::to_value(user)?)?,
                None => println!("not logged in"),
            }
            Ok(())
        }
        Command::Profile(profile) => run_profile(app, profile),
        Command::Boards(boards) => run_boards(app, boards).await,
    }
}

async fn run_ping(app: &App) -> Result<(), CliError> {
    let report = app.check_connection().await;
    print_json(&json!({
        "backend": check_json(&report.backend),
        "database": check_json(&report.database),
    }))?;
    if report.is_healthy() { Ok(()) } else { Err(CliError::Unhealthy) }
}

fn run_profile(app: &App, profile: ProfileCommand) -> Result<(), CliError> {
    match profile.command {
        ProfileSubcommand::Set { name, email } => {
            let update = ProfileUpdate { email, name, ..ProfileUpdate::default() };
            if app.update_profile(&update)? {
                if let Some(user) = app.session().user() {
                    print_json(&serde_json::to_value(user)?)?;
                }
            } else {
                println!("not logged in");
            }
            Ok(())
        }
    }
}

async fn run_boards(app: &App, boards: BoardsCommand) -> Result<(), CliError> {
    match boards.command {
        BoardsSubcommand::List { search } => {
            let mut state = BoardsState::default();
            state.begin();
            match app.list_boards().await {
                Ok(list) => state.apply(Ok(list)),
                Err(err) => {
                    state.apply(Err(err.to_string()));
                    return Err(err.into());
                }
            }
            let visible = state.filtered(search.as_deref().unwrap_or_default());
            print_json(&serde_json::to_value(visible)?)
        }
        BoardsSubcommand::Show { board_id } => {
            let detail = app.board(board_id).await?;
            print_json(&serde_json::to_value(detail)?)
        }
        BoardsSubcommand::Create { name, description, public } => {
            let board = app.create_board(&BoardForm { name, description, is_public: public }).await?;
            print_json(&serde_json::to_value(board)?)
        }
        BoardsSubcommand::Update { board_id, name, description, public } => {
            let patch = BoardPatch { name, description, is_public: public };
            let board = app.update_board(board_id, &patch).await?;
            print_json(&serde_json::to_value(board)?)
        }
        BoardsSubcommand::Delete { board_id, archive } => {
            let result = app.delete_board(board_id, archive).await?;
            print_json(&serde_json::to_value(result)?)
        }
    }
}

fn check_json(result: &Result<Value, String>) -> Value {
    match result {
        Ok(value) => value.clone(),
        Err(message) => json!({ "error": message }),
    }
}

/// Lines printed to stderr for a failed command; one per field for validation failures.
fn error_lines(err: &CliError) -> Vec<String> {
    match err {
        CliError::App(AppError::Validation(errors)) => validation_lines(errors),
        CliError::LoginRequired(err) => vec![format!("error: {err}"), "redirecting to login".to_owned()],
        other => vec![format!("error: {other}")],
    }
}

fn validation_lines(errors: &ValidationErrors) -> Vec<String> {
    errors.fields.iter().map(|f| format!("{}: {}", f.field, f.message)).collect()
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
