use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use quixforge::ai::ClaudeCliGenerator;
use quixforge::cache::{CacheKey, CacheStore};
use quixforge::config::ForgeConfig;
use quixforge::context::WorkflowType;
use quixforge::credentials::map_to_standard;
use quixforge::error::{describe_error_code, ForgeError};
use quixforge::interaction::{DefaultUserInteraction, UserInteraction};
use quixforge::platform::{PlatformApi, PlatformClient};
use quixforge::requirements::{update_requirements_file, PackageIndex};
use quixforge::secrets::PlatformSecretStore;
use quixforge::subprocess::TokioProcessRunner;
use quixforge::workflow::{WorkflowOptions, WorkflowRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Build, test and deploy streaming connectors with Claude
#[derive(Parser)]
#[command(name = "quixforge")]
#[command(about = "Generate, sandbox-test and deploy Quix source and sink connectors", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Project directory holding `.quixforge/config.yml` and `.env`
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a source that produces to a topic
    Source(WizardArgs),
    /// Build a sink that consumes a topic
    Sink(WizardArgs),
    /// Inspect or clear cached answers and code
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Pin a package in a requirements file to its latest release
    UpdateRequirements {
        /// Path to requirements.txt
        file: PathBuf,
        /// Package to pin
        package: String,
    },
    /// Print a JSON credentials object with canonical field names
    MapCredentials {
        /// JSON file with a flat object of string values
        file: PathBuf,
    },
}

#[derive(clap::Args)]
struct WizardArgs {
    /// Application name (prompted when omitted)
    #[arg(long)]
    app: Option<String>,

    /// Replace values already stored in app.yaml with the ones entered now
    #[arg(long)]
    force_env: bool,

    /// Maximum sandbox runs before giving up
    #[arg(long)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List applications with cached artifacts
    List {
        #[arg(long, value_enum)]
        workflow: Option<WorkflowArg>,
    },
    /// Remove cached artifacts
    Clear {
        #[arg(long, value_enum)]
        workflow: Option<WorkflowArg>,
        /// Only clear this application
        #[arg(long)]
        app: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum WorkflowArg {
    Source,
    Sink,
}

impl From<WorkflowArg> for WorkflowType {
    fn from(arg: WorkflowArg) -> Self {
        match arg {
            WorkflowArg::Source => WorkflowType::Source,
            WorkflowArg::Sink => WorkflowType::Sink,
        }
    }
}

fn selected_workflows(arg: Option<WorkflowArg>) -> Vec<WorkflowType> {
    match arg {
        Some(arg) => vec![arg.into()],
        None => vec![WorkflowType::Source, WorkflowType::Sink],
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ForgeConfig::load(&cli.project_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            std::process::exit(e.exit_code());
        }
    };

    let log_level = match cli.verbose {
        0 => config.log_level.clone(),
        1 => "debug".to_string(),
        2 => "trace".to_string(),
        _ => "trace,hyper=debug,reqwest=debug".to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 3)
        .with_line_number(cli.verbose >= 3)
        .with_writer(std::io::stderr)
        .init();

    debug!("quixforge started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match cli.command {
        Commands::Source(args) => run_wizard(config, WorkflowType::Source, args).await,
        Commands::Sink(args) => run_wizard(config, WorkflowType::Sink, args).await,
        Commands::Cache { command } => run_cache_command(&config, command),
        Commands::UpdateRequirements { file, package } => {
            run_update_requirements(&config, &file, &package).await
        }
        Commands::MapCredentials { file } => run_map_credentials(&file),
    };

    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        match e.downcast_ref::<ForgeError>() {
            Some(forge) => {
                debug!("E{:04}: {}", forge.code(), describe_error_code(forge.code()));
                eprintln!("Error: {}", forge.user_message());
                std::process::exit(forge.exit_code());
            }
            None => {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
    }
}

async fn run_wizard(config: ForgeConfig, workflow: WorkflowType, args: WizardArgs) -> anyhow::Result<()> {
    config.require_token()?;
    config.require_workspace()?;

    let platform: Arc<dyn PlatformApi> = Arc::new(PlatformClient::new(&config.platform)?);
    let generator = Arc::new(ClaudeCliGenerator::new(
        Arc::new(TokioProcessRunner),
        &config.generator,
    ));
    let secrets = Arc::new(PlatformSecretStore::new(Arc::clone(&platform)));
    let ui: Arc<dyn UserInteraction> = Arc::new(DefaultUserInteraction::new());

    let options = WorkflowOptions {
        app_name: args.app,
        force_env: args.force_env,
        max_retries: args.max_retries,
    };
    let runner = WorkflowRunner::new(config, options, platform, generator, secrets, Arc::clone(&ui));
    let (outcome, _ctx) = runner.run(workflow).await?;

    if outcome.success {
        ui.display_success(&outcome.message);
        Ok(())
    } else {
        ui.display_error(&outcome.message);
        std::process::exit(1);
    }
}

fn run_cache_command(config: &ForgeConfig, command: CacheCommands) -> anyhow::Result<()> {
    let cache = CacheStore::new(config.working_dir.clone());

    match command {
        CacheCommands::List { workflow } => {
            let mut any = false;
            for workflow in selected_workflows(workflow) {
                let names = cache.list(workflow);
                if names.is_empty() {
                    continue;
                }
                any = true;
                println!("{workflow}:");
                for name in names {
                    println!("  {name}");
                }
            }
            if !any {
                println!("No cached applications in {}", cache.root().display());
            }
        }
        CacheCommands::Clear { workflow, app } => {
            let mut removed = 0;
            for workflow in selected_workflows(workflow) {
                let names = match &app {
                    Some(app) => vec![app.clone()],
                    None => cache.list(workflow),
                };
                for name in names {
                    removed += cache.clear(&CacheKey::new(workflow, name));
                }
            }
            println!("Removed {removed} cached artifact(s)");
        }
    }
    Ok(())
}

async fn run_update_requirements(config: &ForgeConfig, file: &Path, package: &str) -> anyhow::Result<()> {
    let index = PackageIndex::new(&config.package_index_url)?;
    let version = update_requirements_file(&index, file, package).await?;
    println!("Pinned {package}=={version} in {}", file.display());
    Ok(())
}

fn run_map_credentials(file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    // Key order decides which of two synonyms claims a canonical name
    let credentials: IndexMap<String, String> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a flat JSON object of strings", file.display()))?;
    println!("{}", serde_json::to_string_pretty(&map_to_standard(&credentials))?);
    Ok(())
}
