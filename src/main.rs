//! nodeconf - run node-configuration subtasks from the command line.
//!
//! Usage:
//!   nodeconf -c <config> register <node> <universe>      Register a node as uncreated
//!   nodeconf -c <config> configure <node> <universe> ... Run one configure subtask
//!   nodeconf -c <config> state <node>                    Show a node's lifecycle state
//!   nodeconf -c <config> fail <node> --reason <text>     Mark a node failed
//!   nodeconf -c <config> remove <node>                   Forget a node
//!   nodeconf -c <config> validate-config                 Check the configuration file

use clap::{Parser, Subcommand, ValueEnum};
use nodeconf::{
    EventBus, ExecutionContext, ExecutionMode, FlagMap, LoggingHandler, NodeConfigBuilder, NodeId,
    SubTaskError, SubTaskExecutor, TaskParameters, YamlLoader,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// nodeconf - idempotent node-configuration subtasks
#[derive(Parser)]
#[command(name = "nodeconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", default_value = "nodeconf.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a node in the uncreated state
    Register {
        #[arg(value_name = "NODE")]
        node: String,
        #[arg(value_name = "UNIVERSE")]
        universe: String,
    },

    /// Run one configure subtask against a node
    Configure {
        #[arg(value_name = "NODE")]
        node: String,
        #[arg(value_name = "UNIVERSE")]
        universe: String,

        /// What to configure
        #[arg(short = 't', long = "type", value_enum)]
        kind: KindArg,

        /// Software package reference (everything, software)
        #[arg(short, long)]
        package: Option<String>,

        /// Server flag as NAME=VALUE (everything, gflags); repeatable
        #[arg(short, long = "gflag", value_parser = parse_flag)]
        gflags: Vec<(String, String)>,

        /// Run the remote commands in bootstrap (master shell) mode
        #[arg(long)]
        bootstrap: bool,
    },

    /// Show a node's lifecycle state
    State {
        #[arg(value_name = "NODE")]
        node: String,
    },

    /// Mark a node failed
    Fail {
        #[arg(value_name = "NODE")]
        node: String,

        /// Reason recorded in the log
        #[arg(short, long, default_value = "marked failed by operator")]
        reason: String,
    },

    /// Remove a node's lifecycle record
    Remove {
        #[arg(value_name = "NODE")]
        node: String,
    },

    /// Validate the configuration file without running anything
    ValidateConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Everything,
    Software,
    Gflags,
}

fn parse_flag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::ValidateConfig = cli.command {
        return validate_config(cli.config);
    }

    let config = YamlLoader::load(&cli.config)?;

    let events = Arc::new(EventBus::new());
    events.register(Arc::new(LoggingHandler)).await;

    let executor = NodeConfigBuilder::build_executor(&config).await?;
    let ctx = NodeConfigBuilder::build_context(&config, events);

    match cli.command {
        Commands::Register { node, universe } => {
            let record = executor.register_node(node, universe).await?;
            println!("{} registered in {} ({})", record.node_id, record.universe_id, record.state);
        }
        Commands::Configure {
            node,
            universe,
            kind,
            package,
            gflags,
            bootstrap,
        } => {
            let params = build_params(node, universe, kind, package, gflags, bootstrap);
            configure(&executor, &ctx, &params).await?;
        }
        Commands::State { node } => {
            let state = executor.lifecycle().current_state(&NodeId::new(node)).await?;
            println!("{}", state);
        }
        Commands::Fail { node, reason } => {
            let transition = executor
                .escalate_failure(&ctx, &NodeId::new(node), &reason)
                .await?;
            println!("{}", transition.resulting_state());
        }
        Commands::Remove { node } => {
            let node_id = NodeId::new(node);
            executor.remove_node(&node_id).await?;
            println!("{} removed", node_id);
        }
        Commands::ValidateConfig => {}
    }

    Ok(())
}

fn build_params(
    node: String,
    universe: String,
    kind: KindArg,
    package: Option<String>,
    gflags: Vec<(String, String)>,
    bootstrap: bool,
) -> TaskParameters {
    let flags: FlagMap = gflags.into_iter().collect();
    let package = package.unwrap_or_default();
    let params = match kind {
        KindArg::Everything => TaskParameters::everything(node, universe, package, flags),
        KindArg::Software => TaskParameters::software(node, universe, package),
        KindArg::Gflags => TaskParameters::gflags(node, universe, flags),
    };
    if bootstrap {
        params.with_execution_mode(ExecutionMode::Bootstrap)
    } else {
        params
    }
}

/// Run one subtask and report its outcome.
async fn configure(
    executor: &SubTaskExecutor,
    ctx: &ExecutionContext,
    params: &TaskParameters,
) -> Result<(), Box<dyn std::error::Error>> {
    match executor.execute(ctx, params).await {
        Ok(outcome) => {
            info!(
                "{} configured ({}) in {:?}",
                outcome.node_id, outcome.kind, outcome.duration
            );
            println!("{}", outcome.state());
            Ok(())
        }
        Err(e) => {
            if let SubTaskError::Execution(exec) = &e {
                if let Some(diagnostic) = exec.diagnostic() {
                    for line in diagnostic.trim().lines() {
                        error!("    {}", line);
                    }
                }
            }
            if e.is_retryable() {
                error!("Configure failed, node state unchanged; safe to retry: {}", e);
            } else {
                error!("Configure failed: {}", e);
            }
            Err(e.into())
        }
    }
}

/// Validate the configuration file without running anything.
fn validate_config(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating configuration: {}", path.display());

    match YamlLoader::load(&path) {
        Ok(config) => {
            info!("Configuration is valid:");
            info!("  adapter: {}", config.adapter.program);
            info!("  storage: {:?}", config.storage);
            info!("  default gflags: {}", config.default_gflags.len());
            Ok(())
        }
        Err(e) => {
            error!("Validation failed: {}", e);
            Err(e.into())
        }
    }
}
