use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use siges_client::{
    ClientConfig, ConfigError, Resource, RouteDecision, SessionError, SessionStore, UnauthorizedPolicy,
};

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "siges", about = "SIGES school-management API client")]
struct Cli {
    #[arg(long, env = "SIGES_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "SIGES_CREDENTIALS_PATH")]
    credentials: Option<PathBuf>,

    #[arg(long, env = "SIGES_UNAUTHORIZED_POLICY", help = "logout or refresh")]
    on_unauthorized: Option<UnauthorizedPolicy>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SIGES_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Whoami,
    /// Session state and the decision a protected view would take.
    Status,
    Register {
        #[arg(long, help = "JSON account payload")]
        data: String,
    },
    Resource(ResourceCommand),
}

#[derive(Args, Debug)]
struct ResourceCommand {
    /// schools, levels, classes, students, users or roles
    kind: Resource,
    #[command(subcommand)]
    action: ResourceAction,
}

#[derive(Subcommand, Debug)]
enum ResourceAction {
    List,
    Get {
        id: String,
    },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        id: String,
        #[arg(long)]
        data: String,
    },
    Delete {
        id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            for line in render_error(&e) {
                eprintln!("{line}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.trim_end_matches('/').to_owned();
    }
    if let Some(path) = &cli.credentials {
        config.credentials_path.clone_from(path);
    }
    if let Some(policy) = cli.on_unauthorized {
        config.unauthorized_policy = policy;
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli)?;
    tracing::debug!(base_url = %config.base_url, credentials = %config.credentials_path.display(), "client configured");
    let store = SessionStore::from_config(&config)?;

    match cli.command {
        Command::Login { email, password } => {
            store.start().await;
            let identity = store.login(&email, &password).await?;
            println!("logged in as {} <{}>", identity.display_name(), identity.email);
        }
        Command::Logout => {
            store.logout();
            println!("logged out");
        }
        Command::Whoami => {
            let identity = store.refresh_identity().await?;
            print_json(&serde_json::to_value(identity)?)?;
        }
        Command::Status => {
            let decision = store.guard().await;
            print_json(&json!({
                "state": store.state().label(),
                "route": decision_label(decision),
            }))?;
        }
        Command::Register { data } => {
            let payload = serde_json::from_str::<Value>(&data)?;
            let created = store.register(payload).await?;
            print_json(&created)?;
        }
        Command::Resource(command) => run_resource(&store, command).await?,
    }
    Ok(())
}

async fn run_resource(store: &SessionStore, command: ResourceCommand) -> Result<(), CliError> {
    let client = store.resource(command.kind);
    match command.action {
        ResourceAction::List => print_json(&Value::Array(client.list().await?)),
        ResourceAction::Get { id } => print_json(&client.get(&id).await?),
        ResourceAction::Create { data } => {
            let record = serde_json::from_str::<Value>(&data)?;
            print_json(&client.create(record).await?)
        }
        ResourceAction::Update { id, data } => {
            let changes = serde_json::from_str::<Value>(&data)?;
            print_json(&client.update(&id, changes).await?)
        }
        ResourceAction::Delete { id } => {
            client.delete(&id).await?;
            eprintln!("deleted {} {id}", command.kind);
            Ok(())
        }
    }
}

fn decision_label(decision: RouteDecision) -> &'static str {
    match decision {
        RouteDecision::Allow => "allow",
        RouteDecision::Wait => "wait",
        RouteDecision::RedirectToLogin => "redirect:/login",
    }
}

/// Lines printed to stderr for a failed command. Validation errors are
/// listed field by field; server and network failures get a generic hint.
fn render_error(error: &CliError) -> Vec<String> {
    match error {
        CliError::Session(SessionError::Rejected(errors)) => {
            let mut lines = vec!["request rejected:".to_owned()];
            for (field, messages) in errors.iter() {
                lines.extend(messages.iter().map(|message| format!("  {field}: {message}")));
            }
            lines
        }
        CliError::Session(SessionError::Unauthorized) => {
            vec!["session expired, please log in: siges login --email <email>".to_owned()]
        }
        CliError::Session(e @ (SessionError::Unavailable(_) | SessionError::NetworkError(_))) => {
            vec![
                "the server could not be reached, please try again later".to_owned(),
                format!("  ({e})"),
            ]
        }
        other => vec![format!("error: {other}")],
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
