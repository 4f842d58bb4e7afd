use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ideagate_core::*;
use ideagate_memory::{IdeaRepository, SqliteDocumentStore};
use ideagate_provider::{register_from_configs, ProviderRegistry};
use ideagate_schema::{EditableField, IdeaIntake, IntakeOverrides};

#[derive(Parser)]
#[command(name = "ideagate", version, about = "ideagate startup idea evaluation engine")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.ideagate",
        help = "Root directory (contains config/ and logs/)"
    )]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Validate config files")]
    Validate,
    #[command(about = "Submit a new idea and run its first evaluation")]
    Submit {
        #[arg(help = "Intake file (YAML or JSON)")]
        intake: PathBuf,
        #[arg(long, help = "Owner recorded on the idea")]
        owner: Option<String>,
    },
    #[command(about = "Re-evaluate an idea as a new version")]
    ReEvaluate {
        idea_id: String,
        #[arg(long = "set", value_name = "FIELD=VALUE", help = "Override an intake field")]
        overrides: Vec<String>,
    },
    #[command(about = "Change one intake field without re-evaluating")]
    UpdateField {
        idea_id: String,
        field: String,
        value: String,
    },
    #[command(about = "Simulate a feature against the current evaluation")]
    Simulate { idea_id: String, feature: String },
    #[command(about = "Generate the change summary of a version")]
    Summarize { version_id: String },
    #[command(about = "Show the version history of an idea")]
    History { idea_id: String },
    #[command(about = "List the tools exposed to a conversational driver")]
    Tools,
    #[command(about = "Invoke a tool by name with a JSON input")]
    CallTool {
        name: String,
        #[arg(long, default_value = "{}", help = "Tool input as a JSON object")]
        input: String,
        #[arg(long, help = "Idea the call runs in the context of")]
        idea: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    if cli.root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.root = PathBuf::from(home).join(cli.root.strip_prefix("~").unwrap_or(&cli.root));
        }
    }

    let log_dir = cli.root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "ideagate.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = load_config(&cli.root.join("config"))?;

    match command {
        Commands::Validate => {
            println!(
                "Config valid. {} providers, {} model aliases, store at {}.",
                config.providers.len(),
                config.engine.aliases.len(),
                config.store_path().display()
            );
        }
        Commands::Submit { intake, owner } => {
            let intake = read_intake(&intake)?;
            let service = build_service(&config)?;
            let result = service
                .submit_idea(owner.as_deref(), intake)
                .await
                .map_err(engine_error)?;
            print_json(&result)?;
        }
        Commands::ReEvaluate { idea_id, overrides } => {
            let overrides = parse_overrides(&overrides)?;
            let service = build_service(&config)?;
            let result = service
                .re_evaluate(&idea_id, &overrides)
                .await
                .map_err(engine_error)?;
            print_json(&result)?;
        }
        Commands::UpdateField {
            idea_id,
            field,
            value,
        } => {
            let service = build_service(&config)?;
            let result = service
                .update_field(&idea_id, &field, &value)
                .await
                .map_err(engine_error)?;
            print_json(&result)?;
        }
        Commands::Simulate { idea_id, feature } => {
            let service = build_service(&config)?;
            let result = service
                .refine_feature(&idea_id, &feature)
                .await
                .map_err(engine_error)?;
            print_json(&result)?;
        }
        Commands::Summarize { version_id } => {
            let service = build_service(&config)?;
            let summary = service
                .summarize_version(&version_id)
                .await
                .map_err(engine_error)?;
            print_json(&summary)?;
        }
        Commands::History { idea_id } => {
            let service = build_service(&config)?;
            let history = service.history(&idea_id).await.map_err(engine_error)?;
            print_json(&history)?;
        }
        Commands::Tools => {
            let tools = idea_tool_registry(build_service(&config)?);
            for def in tools.tool_defs() {
                println!("{}\n  {}", def.name, def.description);
            }
        }
        Commands::CallTool { name, input, idea } => {
            let input: serde_json::Value =
                serde_json::from_str(&input).context("--input must be valid JSON")?;
            let ctx = match idea {
                Some(id) => ToolContext::for_idea(id),
                None => ToolContext::new(),
            };
            let tools = idea_tool_registry(build_service(&config)?);
            let output = tools.execute(&name, input, &ctx).await?;
            if output.is_error {
                anyhow::bail!(output.content);
            }
            println!("{}", output.content);
        }
    }

    Ok(())
}

fn build_service(config: &IdeagateConfig) -> Result<IdeaService> {
    let mut registry = ProviderRegistry::new();
    register_from_configs(&mut registry, &config.providers)?;
    let router = LlmRouter::new(registry, config.engine.aliases.clone());
    let evaluator = Evaluator::new(router, Arc::new(config.engine.clone()));

    let store_path = config.store_path();
    if let Some(parent) = store_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let path = store_path
        .to_str()
        .ok_or_else(|| anyhow!("store path is not valid UTF-8: {}", store_path.display()))?;
    let store = SqliteDocumentStore::open(path)
        .with_context(|| format!("failed to open store at {path}"))?;
    tracing::debug!(path, "document store opened");

    Ok(IdeaService::new(
        IdeaRepository::new(Arc::new(store)),
        evaluator,
    ))
}

fn read_intake(path: &Path) -> Result<IdeaIntake> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Turn repeated `field=value` pairs into an override set.
fn parse_overrides(pairs: &[String]) -> Result<IntakeOverrides> {
    let mut fields = serde_json::Map::new();
    for pair in pairs {
        let (field, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("expected FIELD=VALUE, got '{pair}'"))?;
        let field: EditableField = field.trim().parse()?;
        fields.insert(field.as_str().to_string(), value.into());
    }
    Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
}

fn engine_error(err: EngineError) -> anyhow::Error {
    tracing::debug!(error = ?err, "operation failed");
    anyhow!(err.user_message())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
