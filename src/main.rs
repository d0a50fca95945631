//! Taskdeck - command-line client
//!
//! Signs in, runs one query or mutation and prints the result as JSON.
//! Toasts raised along the way go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use taskdeck::remote::{AuthUser, MemoryBackend};
use taskdeck::schema::{
    CreateProjectInput, CreateTaskInput, CreateUserInput, ProfilePatch, Schema,
    UpdateProjectInput, UpdateTaskInput,
};
use taskdeck::session::SessionController;
use taskdeck::toast::Toast;
use taskdeck::{AppContext, Config, LogFormat};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(about = "Team task management from the command line")]
struct Cli {
    /// YAML config file (defaults to ./taskdeck.yaml)
    #[arg(long, env = "TASKDECK_CONFIG")]
    config: Option<PathBuf>,

    /// Account email
    #[arg(long, env = "TASKDECK_EMAIL")]
    email: Option<String>,

    /// Account password
    #[arg(long, env = "TASKDECK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Use an empty in-process backend instead of the configured one
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Task operations
    Tasks {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Project operations
    Projects {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// User administration
    Users {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Notifications of the signed-in user
    Notifications {
        #[command(subcommand)]
        action: NotificationAction,
    },

    /// The signed-in user
    Me {
        /// Profile fields to change, as JSON
        #[arg(long)]
        update: Option<String>,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    List,
    Stats,
    /// Create a task from a JSON payload
    Create { json: String },
    /// Update fields of a task from a JSON payload
    Update { id: Uuid, json: String },
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum ProjectAction {
    List,
    Stats,
    Create { json: String },
    Update { id: Uuid, json: String },
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum UserAction {
    List,
    /// Add a user from a JSON payload (first_name, last_name, email, role)
    Create { json: String },
    Update { id: Uuid, json: String },
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum NotificationAction {
    List,
    Unread,
    MarkRead { id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_yaml_and_env(cli.config.as_deref())?;
    init_tracing(config.log_format);

    let ctx = if cli.offline {
        let backend = Arc::new(MemoryBackend::new());
        if let (Some(email), Some(password)) = (&cli.email, &cli.password) {
            backend
                .add_account(email, password, serde_json::json!({}))
                .await;
        }
        tracing::info!("Using in-process backend");
        AppContext::with_backend(config, backend)
    } else {
        AppContext::new(config)?
    };
    let mut toasts = ctx.toasts.subscribe();

    let session = ctx.start_session().await;
    if let (Some(email), Some(password)) = (&cli.email, &cli.password) {
        let signed_in = session.sign_in(email, password).await;
        print_toasts(&mut toasts);
        signed_in.context("Sign-in failed")?;
        let snapshot = session.wait_until_loaded().await;
        tracing::info!(
            user = snapshot.display_name().unwrap_or_default(),
            "Signed in"
        );
    }

    let result = run(&ctx, &session, cli.command).await;
    print_toasts(&mut toasts);
    session.shutdown().await;
    result
}

fn init_tracing(format: LogFormat) {
    let fmt_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed(),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,taskdeck=info".into()),
        )
        .with(fmt_layer)
        .init();
}

async fn run(ctx: &AppContext, session: &SessionController, command: Commands) -> Result<()> {
    let queries = &ctx.queries;
    let actor = session.current_user();
    let actor = actor.as_ref();

    match command {
        Commands::Tasks { action } => match action {
            TaskAction::List => print_json(&queries.list_tasks().await?),
            TaskAction::Stats => print_json(&queries.task_stats().await?),
            TaskAction::Create { json } => {
                let input: CreateTaskInput = parse_payload(&json)?;
                print_json(&queries.create_task(&input, actor).await?)
            }
            TaskAction::Update { id, json } => {
                let input: UpdateTaskInput = parse_payload(&json)?;
                print_json(&queries.update_task(id, &input, actor).await?)
            }
            TaskAction::Delete { id } => print_json(&queries.delete_task(id, actor).await?),
        },
        Commands::Projects { action } => match action {
            ProjectAction::List => print_json(&queries.list_projects().await?),
            ProjectAction::Stats => print_json(&queries.project_stats().await?),
            ProjectAction::Create { json } => {
                let input: CreateProjectInput = parse_payload(&json)?;
                print_json(&queries.create_project(&input, actor).await?)
            }
            ProjectAction::Update { id, json } => {
                let input: UpdateProjectInput = parse_payload(&json)?;
                print_json(&queries.update_project(id, &input, actor).await?)
            }
            ProjectAction::Delete { id } => {
                print_json(&queries.delete_project(id, actor).await?)
            }
        },
        Commands::Users { action } => match action {
            UserAction::List => print_json(&queries.list_profiles().await?),
            UserAction::Create { json } => {
                let input: CreateUserInput = parse_payload(&json)?;
                print_json(&queries.create_user(&input, actor).await?)
            }
            UserAction::Update { id, json } => {
                let patch: ProfilePatch = parse_payload(&json)?;
                print_json(&queries.update_user(id, &patch, actor).await?)
            }
            UserAction::Delete { id } => print_json(&queries.delete_user(id, actor).await?),
        },
        Commands::Notifications { action } => {
            let user_id = actor.map(|u| u.id);
            match action {
                NotificationAction::List => {
                    print_json(&queries.list_notifications(user_id).await?)
                }
                NotificationAction::Unread => print_json(&queries.unread_count(user_id).await?),
                NotificationAction::MarkRead { id } => {
                    print_json(&queries.mark_notification_read(id, actor).await?)
                }
            }
        }
        Commands::Me { update } => {
            let Some(user) = actor else {
                bail!("Not signed in (pass --email and --password)");
            };
            match update {
                Some(json) => {
                    let patch: ProfilePatch = parse_payload(&json)?;
                    print_json(&session.update_profile(&patch).await?)
                }
                None => print_me(user, session),
            }
        }
    }
}

/// Parse a JSON argument and run it through its form schema
fn parse_payload<T: Schema>(json: &str) -> Result<T> {
    let value: Value = serde_json::from_str(json).context("Payload is not valid JSON")?;
    T::validate(&value).map_err(|errors| {
        let details: Vec<String> = errors
            .errors()
            .iter()
            .map(|e| format!("  {}: {}", e.path, e.message))
            .collect();
        anyhow::anyhow!("Invalid payload:\n{}", details.join("\n"))
    })
}

fn print_me(user: &AuthUser, session: &SessionController) -> Result<()> {
    let snapshot = session.snapshot();
    print_json(&serde_json::json!({
        "id": user.id,
        "email": user.email,
        "name": snapshot.display_name(),
        "profile": snapshot.profile,
    }))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_toasts(toasts: &mut broadcast::Receiver<Toast>) {
    while let Ok(toast) = toasts.try_recv() {
        let marker = if toast.is_destructive() { "!" } else { "*" };
        eprintln!("{} {}: {}", marker, toast.title, toast.description);
    }
}
