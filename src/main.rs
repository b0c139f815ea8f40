use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use harbor::cli::{analytics, chat, child, family, knowledge, sessions};
use harbor::config::Config;
use harbor::guidance::Guidance;
use harbor::llm::{LanguageModel, OpenAiClient};
use harbor::service::HarborService;
use harbor::store::SqliteStore;
use harbor::vector::{PineconeIndex, VectorIndex};

#[derive(Parser)]
#[command(name = "harbor")]
#[command(about = "AI therapy companion backend: chat, screening, and parent dashboard analytics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "harbor.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Family account management
    Family {
        #[command(subcommand)]
        command: FamilyCommands,
    },

    /// Child profile management
    Child {
        #[command(subcommand)]
        command: ChildCommands,
    },

    /// Send one chat message as a child
    Chat {
        family_id: String,
        child_id: String,
        message: String,
    },

    /// List a child's sessions
    Sessions {
        family_id: String,
        child_id: String,
    },

    /// Dashboard analytics
    Analytics {
        #[command(subcommand)]
        command: AnalyticsCommands,
    },

    /// Knowledge-base documents
    Knowledge {
        #[command(subcommand)]
        command: KnowledgeCommands,
    },
}

#[derive(Subcommand)]
enum FamilyCommands {
    /// Create a family account
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// 4-digit dashboard PIN
        #[arg(long)]
        pin: Option<String>,
    },
    /// Check a dashboard PIN
    Pin { family_id: String, pin: String },
}

#[derive(Subcommand)]
enum ChildCommands {
    /// Add a child profile (age 6-18, at most four per family)
    Add {
        family_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: i64,
        #[arg(long)]
        concerns: Option<String>,
        #[arg(long)]
        triggers: Option<String>,
        #[arg(long)]
        goals: Option<String>,
    },
    /// List active children
    List { family_id: String },
    /// Soft-delete a child profile
    Deactivate { family_id: String, child_id: String },
}

#[derive(Subcommand)]
enum AnalyticsCommands {
    /// Print the stored dashboard row
    Show { family_id: String, child_id: String },
    /// Force a recalculation
    Refresh { family_id: String, child_id: String },
}

#[derive(Subcommand)]
enum KnowledgeCommands {
    /// Embed and store a document for a child
    Add {
        family_id: String,
        child_id: String,
        file: PathBuf,
    },
    /// List stored documents
    List { family_id: String, child_id: String },
    /// Delete a document by id
    Delete {
        family_id: String,
        child_id: String,
        document_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Load config
    let config = Config::load(&cli.config)?;

    // Wire up the service: store, model, vector index, guidance corpus
    let store = SqliteStore::open(&config.database_path())?;
    let model: Arc<dyn LanguageModel> = Arc::new(OpenAiClient::new(config.llm.clone())?);
    let index: Arc<dyn VectorIndex> = Arc::new(PineconeIndex::new(&config.vector)?);
    let guidance = Guidance::load(&config.guidance_path())?;
    let service = HarborService::new(store, model, index, guidance, &config);

    match cli.command {
        Commands::Family { command } => match command {
            FamilyCommands::Add { name, email, pin } => {
                family::add(&service, name, email, pin)?;
            }
            FamilyCommands::Pin { family_id, pin } => {
                family::verify_pin(&service, family_id, pin)?;
            }
        },
        Commands::Child { command } => match command {
            ChildCommands::Add {
                family_id,
                name,
                age,
                concerns,
                triggers,
                goals,
            } => {
                child::add(&service, family_id, name, age, concerns, triggers, goals)?;
            }
            ChildCommands::List { family_id } => {
                child::list(&service, family_id)?;
            }
            ChildCommands::Deactivate {
                family_id,
                child_id,
            } => {
                child::deactivate(&service, family_id, child_id)?;
            }
        },
        Commands::Chat {
            family_id,
            child_id,
            message,
        } => {
            chat::run(&service, family_id, child_id, message).await?;
        }
        Commands::Sessions {
            family_id,
            child_id,
        } => {
            sessions::run(&service, family_id, child_id)?;
        }
        Commands::Analytics { command } => match command {
            AnalyticsCommands::Show {
                family_id,
                child_id,
            } => {
                analytics::show(&service, family_id, child_id)?;
            }
            AnalyticsCommands::Refresh {
                family_id,
                child_id,
            } => {
                analytics::refresh(&service, family_id, child_id).await?;
            }
        },
        Commands::Knowledge { command } => match command {
            KnowledgeCommands::Add {
                family_id,
                child_id,
                file,
            } => {
                knowledge::add(&service, family_id, child_id, file).await?;
            }
            KnowledgeCommands::List {
                family_id,
                child_id,
            } => {
                knowledge::list(&service, family_id, child_id).await?;
            }
            KnowledgeCommands::Delete {
                family_id,
                child_id,
                document_id,
            } => {
                knowledge::delete(&service, family_id, child_id, document_id).await?;
            }
        },
    }

    Ok(())
}
