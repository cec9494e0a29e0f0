use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use hubbub::config::Config;
use hubbub::content::HtmlTextExtractor;
use hubbub::federation::{IntentOutcome, IntentRequest, OsTokenSource};
use hubbub::storage::{Database, NewAuthor, StorageError};
use hubbub::sync::{FeedSync, PushOutcome, PushRequest};
use hubbub::transport::HttpTransport;

/// Get the config directory path (~/.config/hubbub/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("hubbub"))
}

#[derive(Parser, Debug)]
#[command(name = "hubbub", about = "OStatus feed federation over PubSubHubbub")]
struct Args {
    /// Config file (default ~/.config/hubbub/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Reset database (delete and recreate)
    #[arg(long, global = true)]
    reset_db: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow a remote feed: create, populate, and ask its hub for pushes
    Subscribe { url: String },
    /// Create a local feed
    CreateLocal {
        #[arg(long)]
        username: String,
        /// Display name (defaults to the username)
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        uri: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
    /// Post a status update to a local feed
    Post { feed_id: i64, text: String },
    /// Print the feed's Atom document
    Render { feed_id: i64 },
    /// Ping the feed's hubs
    Publish { feed_id: i64 },
    /// Apply a pushed document (body from --body or stdin)
    Push {
        feed_id: i64,
        #[arg(long)]
        signature: String,
        #[arg(long)]
        callback: String,
        #[arg(long)]
        topic: String,
        #[arg(long, value_name = "FILE")]
        body: Option<PathBuf>,
    },
    /// Answer a hub's verification-of-intent callback
    VerifyIntent {
        feed_id: i64,
        #[arg(long)]
        mode: String,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        challenge: String,
        #[arg(long)]
        verify_token: String,
    },
    /// Ask the feed's primary hub for pushes
    RequestSubscription {
        feed_id: i64,
        /// Overrides `callback_url` from the config file
        #[arg(long)]
        callback: Option<String>,
    },
    /// List feeds
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        eprintln!("Created config directory: {}", config_dir.display());
    }

    // SEC-007: Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config
        .database_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir.join("hubbub.db"));

    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        eprintln!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(StorageError::InstanceLocked) => {
            eprintln!("Error: The database is locked by another hubbub process.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let transport =
        HttpTransport::new(config.http_config()).context("Failed to build HTTP client")?;
    let sync = FeedSync::new(
        Arc::new(db),
        Arc::new(transport),
        Arc::new(HtmlTextExtractor),
        Arc::new(OsTokenSource),
        config.sync_options(),
    );

    run(args.command, &sync, &config).await
}

async fn run(command: Command, sync: &FeedSync, config: &Config) -> Result<()> {
    match command {
        Command::Subscribe { url } => {
            let report = sync
                .populate(&url)
                .await
                .with_context(|| format!("Failed to populate {url}"))?;
            println!(
                "Feed {}: {} new, {} refreshed, {} skipped",
                report.feed.id, report.ingest.created, report.ingest.updated, report.skipped
            );
            match &config.callback_url {
                Some(callback) => {
                    let callback = callback_for(callback, report.feed.id);
                    sync.request_subscription(report.feed.id, &callback)
                        .await
                        .context("Hub refused the subscription request")?;
                    println!("Subscription requested; callback {callback}");
                }
                None => eprintln!("No callback_url configured; not asking the hub for pushes"),
            }
        }
        Command::CreateLocal {
            username,
            name,
            email,
            uri,
            avatar,
        } => {
            let feed = sync
                .create_local_feed(NewAuthor {
                    name: name.unwrap_or_else(|| username.clone()),
                    username,
                    email,
                    remote_url: uri,
                    image_url: avatar,
                })
                .await?;
            println!("Feed {}: {}", feed.id, feed.absolute_url(&config.base_uri));
        }
        Command::Post { feed_id, text } => {
            let update = sync.post_update(feed_id, &text).await?;
            println!("Update {}: {}", update.id, update.url);
            report_publish(sync, feed_id, config).await?;
        }
        Command::Render { feed_id } => {
            let xml = sync.render(feed_id, &config.base_uri).await?;
            std::io::stdout()
                .write_all(&xml)
                .context("Failed to write feed document")?;
        }
        Command::Publish { feed_id } => report_publish(sync, feed_id, config).await?,
        Command::Push {
            feed_id,
            signature,
            callback,
            topic,
            body,
        } => {
            let body = match body {
                Some(path) => std::fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin()
                        .read_to_end(&mut buf)
                        .context("Failed to read push body from stdin")?;
                    buf
                }
            };
            let push = PushRequest {
                body,
                signature,
                callback_url: callback,
                topic_url: topic,
            };
            match sync.apply_push(feed_id, &push).await? {
                PushOutcome::Accepted(result) => println!(
                    "Accepted: {} new, {} refreshed, {} unchanged",
                    result.created, result.updated, result.unchanged
                ),
                PushOutcome::Rejected => {
                    eprintln!("Rejected: signature mismatch");
                    std::process::exit(2);
                }
            }
        }
        Command::VerifyIntent {
            feed_id,
            mode,
            topic,
            challenge,
            verify_token,
        } => {
            let request = IntentRequest {
                mode,
                topic,
                challenge,
                verify_token,
            };
            match sync.verify_intent(feed_id, &request).await? {
                IntentOutcome::Confirmed(challenge) => println!("{challenge}"),
                IntentOutcome::Denied => {
                    eprintln!("Denied");
                    std::process::exit(1);
                }
            }
        }
        Command::RequestSubscription { feed_id, callback } => {
            let callback = callback
                .or_else(|| {
                    config
                        .callback_url
                        .as_deref()
                        .map(|c| callback_for(c, feed_id))
                })
                .ok_or_else(|| anyhow::anyhow!("No callback URL: pass --callback or set callback_url"))?;
            sync.request_subscription(feed_id, &callback).await?;
            println!("Subscription requested; callback {callback}");
        }
        Command::List => {
            for feed in sync.list().await? {
                let kind = if feed.is_local() { "local" } else { "remote" };
                let state = if feed.is_populated() { "" } else { " (unpopulated)" };
                println!(
                    "{:>5}  {:<6}  {}{}  hubs={}",
                    feed.id,
                    kind,
                    feed.absolute_url(&config.base_uri),
                    state,
                    feed.hubs.len()
                );
            }
        }
    }
    Ok(())
}

/// `{callback_url}/{feed_id}`: one callback path per feed.
fn callback_for(base: &str, feed_id: i64) -> String {
    format!("{}/{}", base.trim_end_matches('/'), feed_id)
}

async fn report_publish(sync: &FeedSync, feed_id: i64, config: &Config) -> Result<()> {
    let report = sync.notify_hubs(feed_id, &config.base_uri).await?;
    for hub in &report.succeeded {
        println!("  ok      {hub}");
    }
    for hub in &report.failed {
        println!("  failed  {hub}");
    }
    Ok(())
}
