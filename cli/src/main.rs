use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sovreddit_actions::{
    Notification, NotificationStatus, PendingWriteHandle, PipelineResult, VotePress, WritePipeline,
};
use sovreddit_identity::{KeyPair, SessionSigner};
use sovreddit_store::{DomainStore, InFlightRegistry};
use sovreddit_sync::{ReadClient, SubmissionClient};
use sovreddit_types::{CommandKind, Identity};

mod config;

use config::ClientConfig;

#[derive(Parser)]
#[command(author, version, about = "Sovereign Reddit client", long_about = None)]
struct Cli {
    /// Path to the client configuration file
    #[arg(short, long, default_value = "./sovreddit.toml")]
    config: PathBuf,

    /// Key file; overrides the configured one
    #[arg(short, long)]
    key_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new signing key
    Keygen {
        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Show the identity of the configured key
    Whoami,

    /// Look up another user by identity
    User { identity: String },

    /// Register a username for the configured key
    Register { username: String },

    /// Create a subreddit
    CreateSubreddit {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Create a post in a subreddit
    Post {
        #[arg(short, long)]
        subreddit: String,

        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        content: String,

        #[arg(short, long, default_value = "")]
        flair: String,
    },

    /// Comment on a post
    Comment { post_id: String, content: String },

    /// Toggle an up or down vote on a post
    #[command(group(ArgGroup::new("direction").required(true).args(["up", "down"])))]
    Vote {
        post_id: String,

        #[arg(long)]
        up: bool,

        #[arg(long)]
        down: bool,
    },

    /// Join a subreddit, or leave it if already a member
    Join { subreddit_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ClientConfig::load_or_default(&cli.config)?;
    if let Some(key_file) = cli.key_file {
        config.keys.key_file = key_file;
    }
    init_logging(&config.logging.level);
    debug!("Using configuration {:?}", config);

    match cli.command {
        Commands::Keygen { force } => keygen(&config, force),
        Commands::Whoami => {
            let pipeline = build_pipeline(&config)?;
            println!("Identity: {}", pipeline.author()?);
            match pipeline.restore_session().await? {
                Some(user) => println!("Username: {}", user.username),
                None => println!("Username: (not registered)"),
            }
            Ok(())
        }
        Commands::User { identity } => {
            let identity = Identity::parse(&identity)?;
            let pipeline = build_pipeline(&config)?;
            match pipeline.load_user(&identity).await? {
                Some(user) => println!("{:#?}", user),
                None => println!("No user registered for {}", identity),
            }
            Ok(())
        }
        Commands::Register { username } => {
            let pipeline = build_pipeline(&config)?;
            report(CommandKind::CreateUser, pipeline.register_user(&username).await).await
        }
        Commands::CreateSubreddit { name, description } => {
            let pipeline = build_pipeline(&config)?;
            report(
                CommandKind::CreateSubreddit,
                pipeline.create_subreddit(&name, &description).await,
            )
            .await
        }
        Commands::Post {
            subreddit,
            title,
            content,
            flair,
        } => {
            let pipeline = build_pipeline(&config)?;
            report(
                CommandKind::CreatePost,
                pipeline.create_post(&subreddit, &title, &content, &flair).await,
            )
            .await
        }
        Commands::Comment { post_id, content } => {
            let pipeline = build_pipeline(&config)?;
            report(
                CommandKind::AddComment,
                pipeline.add_comment(&post_id, &content).await,
            )
            .await
        }
        Commands::Vote { post_id, up, .. } => {
            let pipeline = build_pipeline(&config)?;
            // Caches the post so the optimistic score shift has something to apply to
            if pipeline.load_post(&post_id).await?.is_none() {
                anyhow::bail!("Post {} not found", post_id);
            }
            let press = if up { VotePress::Up } else { VotePress::Down };
            report(CommandKind::CastVote, pipeline.press_vote(&post_id, press).await).await
        }
        Commands::Join { subreddit_id } => {
            let pipeline = build_pipeline(&config)?;
            report(
                CommandKind::ToggleMembership,
                pipeline.toggle_membership(&subreddit_id).await,
            )
            .await
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn keygen(config: &ClientConfig, force: bool) -> Result<()> {
    let path = &config.keys.key_file;
    if path.exists() && !force {
        anyhow::bail!(
            "Key file {} already exists; pass --force to replace it",
            path.display()
        );
    }

    let key = KeyPair::generate();
    key.save(path)
        .with_context(|| format!("Failed to write key file {}", path.display()))?;
    println!("Identity: {}", key.identity());
    println!("Key saved to {}", path.display());
    Ok(())
}

fn build_pipeline(config: &ClientConfig) -> Result<WritePipeline> {
    let key = KeyPair::load(&config.keys.key_file).with_context(|| {
        format!(
            "Failed to load key file {}; run `sovreddit keygen` first",
            config.keys.key_file.display()
        )
    })?;
    let timeout = config.endpoints.request_timeout();

    let submitter = SubmissionClient::new(&config.endpoints.sequencer_url)
        .with_tx_details(config.transaction.tx_details())
        .with_timeout(timeout)?;
    let reads = ReadClient::new(&config.endpoints.read_url).with_timeout(timeout)?;

    Ok(WritePipeline::new(
        Arc::new(submitter),
        Arc::new(reads),
        Arc::new(SessionSigner::from_keypair(key)),
        DomainStore::new(),
        InFlightRegistry::new(),
    ))
}

/// Wait for a write to settle and print what happened
async fn report<T: Debug>(
    kind: CommandKind,
    submitted: PipelineResult<PendingWriteHandle<T>>,
) -> Result<()> {
    let outcome = match submitted {
        Ok(handle) => {
            println!(
                "Submitted {} as {}; waiting for confirmation...",
                kind,
                handle.receipt().tx_hash
            );
            handle.confirmed().await
        }
        Err(e) => Err(e),
    };

    print_notification(&Notification::from_outcome(kind, &outcome));
    match outcome {
        Ok(value) => {
            println!("{:#?}", value);
            Ok(())
        }
        Err(e) if e.is_ambiguous() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn print_notification(note: &Notification) {
    let tag = match note.status {
        NotificationStatus::Success => "ok",
        NotificationStatus::Warning => "warn",
        NotificationStatus::Error => "error",
    };
    println!("[{}] {}: {}", tag, note.title, note.description);
}
