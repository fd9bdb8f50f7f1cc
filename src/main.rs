//! paper-chat command-line front end.
//!
//! Startup order:
//! 1. Parse configuration from environment variables, then CLI flags.
//! 2. Initialise tracing.
//! 3. Open the database and load the document store.
//! 4. Run the requested command.

use anyhow::Context;
use clap::{Parser, Subcommand};
use paper_chat_lib::api::ApiClient;
use paper_chat_lib::commands::{chat, library, settings};
use paper_chat_lib::config::Config;
use paper_chat_lib::db::models::{Message, Role};
use paper_chat_lib::db::Database;
use paper_chat_lib::doc_processor::format_file_size;
use paper_chat_lib::store::DocumentStore;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "paper-chat", version, about = "Chat with your research papers")]
struct Cli {
    /// Directory holding the local database
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Backend API base URL, e.g. http://localhost:8000/api
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Discard saved records that cannot be read instead of failing
    #[arg(long, global = true, default_value_t = false)]
    reset_corrupt: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a PDF and add it to the library
    Upload { file: PathBuf },
    /// List uploaded documents
    List {
        /// Only show documents whose name contains this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Send a message about a document
    Chat { id: String, message: String },
    /// Ask a one-off question without recording it
    Query { id: String, query: String },
    /// Show a document's conversation
    History { id: String },
    /// Clear a document's conversation
    Clear {
        id: String,
        /// Also clear the server-side chat session
        #[arg(long)]
        remote: bool,
    },
    /// Remove a document from the library
    Remove {
        id: String,
        /// Also delete the server-side collection
        #[arg(long)]
        remote: bool,
    },
    /// Show server-side information about a document
    Info { id: String },
    /// Inspect chat sessions held by the server
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Read or change persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print all settings, or one
    Get { key: Option<String> },
    Set { key: String, value: String },
    Unset { key: String },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List session ids known to the server
    List,
    /// Show the server's copy of a document's session
    Show { id: String },
    /// Delete a document's server session, keeping the local history
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cli = Cli::parse();
    let mut cfg = Config::from_env();
    if let Some(dir) = cli.data_dir.clone() {
        cfg.data_dir = dir;
    }
    if let Some(url) = cli.base_url.clone() {
        cfg.base_url = Some(url);
    }

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    init_tracing(&cfg);

    // ── 3. Store ───────────────────────────────────────────────────────────────
    let db = Database::new(&cfg.data_dir)
        .with_context(|| format!("opening database in {}", cfg.data_dir.display()))?;
    let base_url = cfg.resolve_base_url(&db)?;
    let mut store = if cli.reset_corrupt {
        DocumentStore::open_discarding_corrupt(db)?
    } else {
        DocumentStore::open(db)
            .context("loading saved documents (rerun with --reset-corrupt to discard them)")?
    };
    let client = ApiClient::new(base_url);
    tracing::debug!(base_url = client.base_url(), "backend configured");

    // ── 4. Command ─────────────────────────────────────────────────────────────
    match cli.command {
        Command::Upload { file } => {
            let doc = library::upload_document(
                &mut store,
                &client,
                &file,
                cfg.max_upload_mb,
                |p| {
                    eprint!("\rUploading... {}%", p.percent());
                    let _ = std::io::stderr().flush();
                },
            )
            .await;
            eprintln!();
            let doc = doc?;
            println!("Uploaded {} ({})", doc.name, doc.id);
        }
        Command::List { search } => {
            let entries = library::list_documents(&store, search.as_deref());
            if entries.is_empty() {
                println!("{}", library::empty_listing_message(search.as_deref()));
            }
            for entry in entries {
                let doc = &entry.document;
                println!(
                    "{}  {}  {}  {} pages  {} messages  {}",
                    doc.id,
                    doc.name,
                    doc.size.map(format_file_size).unwrap_or_else(|| "-".into()),
                    doc.page_count.unwrap_or(0),
                    entry.message_count,
                    doc.uploaded_at,
                );
            }
        }
        Command::Chat { id, message } => {
            let reply = chat::send_message(&mut store, &client, &id, &message).await?;
            print_message(&reply);
        }
        Command::Query { id, query } => {
            let answer = chat::query_document(&store, &client, &id, &query).await?;
            println!("{}", answer.answer);
            for source in answer.sources.unwrap_or_default() {
                println!("  - {}", source);
            }
        }
        Command::History { id } => {
            for msg in chat::get_messages(&store, &id)? {
                print_message(msg);
            }
        }
        Command::Clear { id, remote } => {
            chat::clear_conversation(&mut store, remote.then_some(&client), &id).await?;
            println!("Conversation cleared");
        }
        Command::Remove { id, remote } => {
            let doc = library::remove_document(&mut store, remote.then_some(&client), &id).await?;
            println!("Removed {}", doc.name);
        }
        Command::Info { id } => {
            let info = library::document_info(&store, &client, &id).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Sessions { action } => match action {
            SessionAction::List => {
                for session_id in chat::list_sessions(&client).await? {
                    println!("{}", session_id);
                }
            }
            SessionAction::Show { id } => {
                let session = chat::session_history(&store, &client, &id).await?;
                for msg in &session.messages {
                    println!(
                        "[{}] {}:\n{}\n",
                        msg.timestamp.as_deref().unwrap_or("-"),
                        msg.role,
                        msg.content
                    );
                }
            }
            SessionAction::Delete { id } => {
                let status = chat::delete_session(&store, &client, &id).await?;
                println!("{}", status.message);
            }
        },
        Command::Config { action } => {
            let db = store.database();
            match action {
                ConfigAction::Get { key: None } => {
                    for (key, value) in settings::get_settings(db)? {
                        println!("{} = {}", key, value);
                    }
                }
                ConfigAction::Get { key: Some(key) } => {
                    if let Some(value) = settings::get_settings(db)?.get(&key) {
                        println!("{}", value);
                    }
                }
                ConfigAction::Set { key, value } => settings::set_setting(db, &key, &value)?,
                ConfigAction::Unset { key } => settings::delete_setting(db, &key)?,
            }
        }
    }
    Ok(())
}

fn init_tracing(cfg: &Config) {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: PAPER_CHAT_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn print_message(msg: &Message) {
    let who = match msg.role {
        Role::User => "you",
        Role::Assistant if msg.is_error == Some(true) => "assistant (error)",
        Role::Assistant => "assistant",
    };
    println!("[{}] {}:\n{}", msg.timestamp, who, msg.content);
    if let Some(sources) = &msg.sources {
        for source in sources {
            println!("  - {}", source);
        }
    }
    println!();
}
