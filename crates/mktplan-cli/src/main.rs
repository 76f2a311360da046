mod config;
mod plan_cmds;
mod resolve;
mod serve_cmd;
mod template_cmds;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use mktplan_core::context::AppContext;
use mktplan_data::backend::Backend;
use mktplan_data::memory::MemoryBackend;

use config::MktplanConfig;

#[derive(Parser)]
#[command(name = "mktplan", about = "Collaborative marketing plan and template manager")]
struct Cli {
    /// Data file path (overrides MKTPLAN_DATA_FILE env var)
    #[arg(long, global = true)]
    data_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a mktplan config file and an empty data file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Template management
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Start the HTTP API server
    Serve {
        /// Listen address (overrides config file)
        #[arg(long)]
        addr: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// List all templates
    List,
    /// Show a template and its ordered activities
    Show {
        /// Template ID (or unique prefix)
        template_id: String,
    },
    /// Create a new template
    Create {
        /// Template title
        title: String,
        /// Human-readable description
        #[arg(long)]
        description: Option<String>,
        /// Strategy notes
        #[arg(long)]
        strategy: Option<String>,
        /// Owning company ID (omit for a global template)
        #[arg(long)]
        company: Option<String>,
        /// Make the template visible to everyone
        #[arg(long)]
        public: bool,
        /// Lock all activities from the start
        #[arg(long)]
        fixed: bool,
    },
    /// Add an activity to a template
    AddActivity {
        /// Template ID (or unique prefix)
        template_id: String,
        /// Activity title
        title: String,
        /// Activity kind: blog_post, landing_page, email_campaign,
        /// social_post, webinar, ad_campaign, other
        #[arg(long, default_value = "other")]
        kind: String,
        /// Expected duration in days
        #[arg(long, default_value_t = 1)]
        duration: i32,
        /// Position in the ordered list
        #[arg(long, default_value_t = 0)]
        order_index: i32,
        /// Human-readable description
        #[arg(long)]
        description: Option<String>,
        /// Activity collects a content form
        #[arg(long)]
        has_form: bool,
    },
    /// Reorder a template's activities (IDs in the desired order)
    Reorder {
        /// Template ID (or unique prefix)
        template_id: String,
        /// Activity IDs (or unique prefixes) in the desired order
        activity_ids: Vec<String>,
    },
    /// Toggle the fixed flag on one activity
    ToggleFixed {
        /// Template ID (or unique prefix)
        template_id: String,
        /// Activity ID (or unique prefix)
        activity_id: String,
    },
    /// Set the template-level fixed_activities flag
    SetFixed {
        /// Template ID (or unique prefix)
        template_id: String,
        /// New value for the flag
        #[arg(long)]
        fixed: bool,
    },
    /// Delete a template and its activities
    Delete {
        /// Template ID (or unique prefix)
        template_id: String,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// List all plans
    List,
    /// Show a plan, its activities and their dependency state
    Show {
        /// Plan ID (or unique prefix)
        plan_id: String,
    },
    /// Create an empty plan
    Create {
        /// Plan title
        title: String,
        /// Human-readable description
        #[arg(long)]
        description: Option<String>,
        /// Owner user ID (random if omitted)
        #[arg(long)]
        owner: Option<String>,
    },
    /// Create a plan seeded from a template's activities
    FromTemplate {
        /// Template ID (or unique prefix)
        template_id: String,
        /// Plan title
        title: String,
        /// Human-readable description
        #[arg(long)]
        description: Option<String>,
        /// Owner user ID (random if omitted)
        #[arg(long)]
        owner: Option<String>,
    },
    /// Send a draft plan to internal review
    SendToReview {
        /// Plan ID (or unique prefix)
        plan_id: String,
        /// Reviewer user ID
        #[arg(long)]
        reviewer: String,
    },
    /// Record the internal review decision
    Review {
        /// Plan ID (or unique prefix)
        plan_id: String,
        /// Approve the review
        #[arg(long)]
        approve: bool,
        /// Reject the review (plan returns to draft)
        #[arg(long)]
        reject: bool,
        /// Reviewer comments
        #[arg(long)]
        comments: Option<String>,
    },
    /// Send a reviewed plan to final approval
    SendToApproval {
        /// Plan ID (or unique prefix)
        plan_id: String,
        /// Approver user ID
        #[arg(long)]
        approver: String,
    },
    /// Record the final approval decision
    Approve {
        /// Plan ID (or unique prefix)
        plan_id: String,
        /// Approve the plan
        #[arg(long)]
        approve: bool,
        /// Reject the plan (returns to internal review)
        #[arg(long)]
        reject: bool,
        /// Approver comments
        #[arg(long)]
        comments: Option<String>,
    },
    /// Activate an approved plan
    Activate {
        /// Plan ID (or unique prefix)
        plan_id: String,
    },
    /// Mark an active plan as completed
    Complete {
        /// Plan ID (or unique prefix)
        plan_id: String,
    },
    /// Delete a plan
    Delete {
        /// Plan ID (or unique prefix)
        plan_id: String,
    },
}

/// Execute `mktplan init`: write the config file and an empty data file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let data_file = config::default_data_file();
    let cfg = config::ConfigFile {
        data: config::DataSection {
            file: data_file.display().to_string(),
        },
        server: config::ServerSection {
            listen_addr: config::DEFAULT_LISTEN_ADDR.to_string(),
        },
    };
    config::save_config(&cfg)?;

    if !data_file.exists() {
        MemoryBackend::new().save_snapshot(&data_file)?;
    }

    println!("Config written to {}", path.display());
    println!("  data.file = {}", data_file.display());
    println!("  server.listen_addr = {}", config::DEFAULT_LISTEN_ADDR);

    Ok(())
}

/// Load the backend from the data file (fresh store if the file is absent),
/// and return both the backend handle and the snapshot path for saving.
fn open_backend(config: &MktplanConfig) -> anyhow::Result<(Arc<MemoryBackend>, PathBuf)> {
    let path = config
        .data_config
        .data_file
        .clone()
        .unwrap_or_else(config::default_data_file);

    let backend = if path.exists() {
        MemoryBackend::load_snapshot(&path)
            .with_context(|| format!("failed to load data file at {}", path.display()))?
    } else {
        MemoryBackend::new()
    };

    Ok((Arc::new(backend), path))
}

async fn load_context(backend: Arc<MemoryBackend>) -> AppContext {
    let ctx = AppContext::new(backend as Arc<dyn Backend>);
    ctx.load_all().await;
    ctx
}

fn save_backend(backend: &MemoryBackend, path: &Path) -> anyhow::Result<()> {
    backend
        .save_snapshot(path)
        .with_context(|| format!("failed to save data file at {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => cmd_init(force),
        Commands::Template { command } => {
            let config = MktplanConfig::resolve(cli.data_file.as_deref())?;
            let (backend, path) = open_backend(&config)?;
            let ctx = load_context(backend.clone()).await;
            template_cmds::run_template_command(command, &ctx).await?;
            save_backend(&backend, &path)
        }
        Commands::Plan { command } => {
            let config = MktplanConfig::resolve(cli.data_file.as_deref())?;
            let (backend, path) = open_backend(&config)?;
            let ctx = load_context(backend.clone()).await;
            plan_cmds::run_plan_command(command, &ctx).await?;
            save_backend(&backend, &path)
        }
        Commands::Serve { addr } => {
            let config = MktplanConfig::resolve(cli.data_file.as_deref())?;
            let (backend, path) = open_backend(&config)?;
            let ctx = Arc::new(load_context(backend.clone()).await);

            let listen_addr = addr.unwrap_or_else(|| config.listen_addr.clone());
            serve_cmd::run_serve(ctx, &listen_addr).await?;

            // Persist whatever the API mutated before exiting.
            save_backend(&backend, &path)
        }
    }
}
