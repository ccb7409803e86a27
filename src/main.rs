//! Regflow CLI - model tracking and registry workflow

use clap::{Parser, Subcommand};
use regflow::cli;
use regflow::client::{self, RegistryClient};
use regflow::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "regflow")]
#[command(author, version, about = "Model tracking and registry workflow", long_about = None)]
struct Cli {
    /// Registry path (default: ~/.regflow)
    #[arg(long, global = true, env = "REGFLOW_REGISTRY")]
    registry: Option<PathBuf>,

    /// Workflow configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new registry
    Init,
    /// Show registry statistics
    Stats,
    /// Run the full workflow: track, register, predict, transition
    Demo {
        /// Model namespace (overrides config and REGFLOW_NAMESPACE)
        #[arg(long, short)]
        namespace: Option<String>,
        /// Target stage (None, Staging, Production, Archived)
        #[arg(long, short)]
        stage: Option<String>,
        /// Archive other versions already in the target stage
        #[arg(long)]
        archive_existing: bool,
    },
    /// Tracked run operations
    Run {
        #[command(subcommand)]
        action: RunAction,
    },
    /// Model registry operations
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Load a model by URI and predict
    Predict {
        /// runs:/<run_id>/<path> or models:/<name>/<version|stage|latest>
        uri: String,
        /// Comma-separated feature row, e.g. 0,1,0
        #[arg(long, short, required = true)]
        row: Vec<String>,
    },
}

#[derive(Subcommand)]
enum RunAction {
    /// Get run details
    Get {
        /// Run ID
        id: String,
    },
    /// List runs in an experiment
    List {
        /// Experiment name
        #[arg(long, short, default_value = "Default")]
        experiment: String,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// List models
    List {
        /// Model name (optional, lists versions if provided)
        name: Option<String>,
    },
    /// Get model version details
    Get {
        /// Model name
        name: String,
        /// Version number, stage name or "latest"
        #[arg(long, short)]
        version: String,
    },
    /// Transition model version stage
    Stage {
        /// Model name
        name: String,
        /// Version number, stage name or "latest"
        #[arg(long, short)]
        version: String,
        /// Target stage (None, Staging, Production, Archived)
        #[arg(long, short)]
        target: String,
        /// Archive other versions already in the target stage
        #[arg(long)]
        archive_existing: bool,
    },
    /// Download model artifact
    Download {
        /// Model name
        name: String,
        /// Version number, stage name or "latest"
        #[arg(long, short)]
        version: String,
        /// Output path
        #[arg(long, short)]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regflow=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(cli: Cli) -> regflow::Result<()> {
    let config = cli.registry.map(RegistryConfig::new).unwrap_or_default();

    match cli.command {
        Commands::Init => {
            let registry = Registry::open(config)?;
            println!(
                "Registry initialized at: {}",
                registry.config().base_path.display()
            );
        }
        Commands::Stats => {
            let registry = Registry::open_existing(config)?;
            print!("{}", cli::format_stats(&registry.storage_stats()?));
        }
        Commands::Demo {
            namespace,
            stage,
            archive_existing,
        } => {
            let mut workflow_config = match &cli.config {
                Some(path) => WorkflowConfig::from_file(path)?,
                None => WorkflowConfig::default(),
            }
            .with_env_overrides();
            if let Some(namespace) = namespace {
                workflow_config.namespace = namespace;
            }
            if let Some(stage) = stage {
                workflow_config.target_stage = stage.parse()?;
            }
            workflow_config.archive_existing_versions |= archive_existing;

            let registry = Registry::open(config)?;
            let mut stdout = std::io::stdout().lock();
            cli::handle_demo(&registry, workflow_config, &mut stdout)?;
        }
        Commands::Run { action } => handle_run(config, action)?,
        Commands::Model { action } => handle_model(config, action)?,
        Commands::Predict { uri, row } => {
            let uri: ArtifactUri = uri.parse()?;
            let rows = row
                .iter()
                .map(|r| cli::parse_row(r))
                .collect::<regflow::Result<Vec<_>>>()?;

            let registry = Registry::open_existing(config)?;
            let model = load_model(&registry, &uri)?;
            println!("{}", cli::format_predictions(&model.predict(&rows)?));
        }
    }

    Ok(())
}

fn handle_run(config: RegistryConfig, action: RunAction) -> regflow::Result<()> {
    let registry = Registry::open_existing(config)?;

    match action {
        RunAction::Get { id } => {
            let run_id: RunId = id
                .parse()
                .map_err(|_| RegflowError::Validation(format!("invalid run id: {id}")))?;
            print!("{}", cli::format_run_info(&registry.get_run(&run_id)?));
        }
        RunAction::List { experiment } => {
            let runs = registry.list_runs(&experiment)?;
            if runs.is_empty() {
                println!("No runs found in experiment: {experiment}");
            } else {
                println!("Runs in '{experiment}':");
                for run in runs {
                    println!(
                        "  {}  {:<8}  {}",
                        run.run_id,
                        run.status,
                        run.run_name.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }

    Ok(())
}

fn handle_model(config: RegistryConfig, action: ModelAction) -> regflow::Result<()> {
    let registry = Registry::open_existing(config)?;

    match action {
        ModelAction::List { name } => {
            if let Some(name) = name {
                let versions = registry.list_model_versions(&name)?;
                if versions.is_empty() {
                    println!("No versions found for model: {name}");
                } else {
                    println!("Versions of '{name}':");
                    for v in &versions {
                        println!("{}", cli::format_version_line(v));
                    }
                }
            } else {
                let models = registry.list_registered_models()?;
                println!("Models:");
                for m in models {
                    println!("  {}", m.name);
                }
            }
        }
        ModelAction::Get { name, version } => {
            let mv = client::resolve_version(&registry, &name, version.parse()?)?;
            print!("{}", cli::format_model_version(&mv));
        }
        ModelAction::Stage {
            name,
            version,
            target,
            archive_existing,
        } => {
            let target_stage: ModelStage = target.parse()?;
            let mv = client::resolve_version(&registry, &name, version.parse()?)?;
            let updated = registry.transition_model_version_stage(
                &name,
                mv.version,
                target_stage,
                archive_existing,
            )?;
            println!(
                "Transitioned {name} version {} from {} to {}",
                updated.version, mv.current_stage, updated.current_stage
            );
        }
        ModelAction::Download {
            name,
            version,
            output,
        } => {
            let mv = client::resolve_version(&registry, &name, version.parse()?)?;
            let data = client::download(&registry, &mv.model_uri())?;
            std::fs::write(&output, &data)?;
            println!(
                "Downloaded {} to {}",
                mv.model_uri(),
                output.display()
            );
        }
    }

    Ok(())
}
