use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use coordination::{Context, Task};
use specialist_agents::{report, AppConfig, JsonlAuditLog, LogFormat, DOMAIN_ATTRIBUTE};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Route tasks through tiered domain specialists", long_about = None)]
struct Cli {
    /// Config file (defaults to $SPECIALIST_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consult specialists about one task
    Consult {
        /// Free-text task description
        description: String,

        /// Task id (random when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Pin the domain instead of classifying
        #[arg(long)]
        domain: Option<String>,

        /// Context entry as key=value; values parse as JSON when possible
        #[arg(long = "context", value_parser = parse_key_value)]
        context: Vec<(String, serde_json::Value)>,

        /// Print the consolidated result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List registered specialists and their handoff criteria
    Specialists {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Validate the config file and specialist wiring
    CheckConfig,
}

fn parse_key_value(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    init_tracing(cli.json_logs || config.log_format == LogFormat::Json);

    match cli.command {
        Command::Consult {
            description,
            id,
            domain,
            context,
            json,
        } => consult(&config, description, id, domain, context, json).await,
        Command::Specialists { json } => {
            let registry = config
                .build_registry()
                .context("Specialist wiring is invalid")?;
            if json {
                let descriptors = registry.descriptors();
                println!("{}", serde_json::to_string_pretty(&descriptors)?);
            } else {
                print!("{}", report::render_registry(&registry));
            }
            Ok(())
        }
        Command::CheckConfig => {
            let registry = config
                .build_registry()
                .context("Specialist wiring is invalid")?;
            info!(
                specialists = registry.len(),
                domains = registry.domains().len(),
                default_domain = %config.default_domain,
                "Config OK"
            );
            println!(
                "ok: {} specialists across {} domains",
                registry.len(),
                registry.domains().len()
            );
            Ok(())
        }
    }
}

async fn consult(
    config: &AppConfig,
    description: String,
    id: Option<String>,
    domain: Option<String>,
    context: Vec<(String, serde_json::Value)>,
    json: bool,
) -> Result<()> {
    if description.trim().is_empty() {
        bail!("task description must not be empty");
    }
    let engine = config.build_engine().context("Specialist wiring is invalid")?;

    let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
    let mut task = Task::new(id, description);
    if let Some(domain) = domain {
        task = task.with_attribute(DOMAIN_ATTRIBUTE, domain);
    }
    let context: Context = context.into_iter().collect();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, returning partial chain");
            on_signal.cancel();
        }
    });

    let result = engine
        .consult_with_cancel(&task, &context, cancel)
        .await
        .with_context(|| format!("Consultation for task '{}' could not start", task.id))?;
    info!(summary = %result.summary(), "Consultation finished");

    if let Some(path) = &config.audit_log {
        JsonlAuditLog::new(path)
            .append(&result)
            .context("Failed to write audit log")?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", report::render_result(&result));
    }
    Ok(())
}
