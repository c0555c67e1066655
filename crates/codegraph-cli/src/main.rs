use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use codegraph_core::CoreSettings;
use codegraph_tenant::GraphClientFactory;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use uuid::Uuid;

/// Tenant-admin CLI (spec §6.4): thin wrappers over the Tenant Factory (C2)
/// for operators — provisioning, cache inspection, and teardown. Not part of
/// the core's invariants; exists to aid operations.
#[derive(Parser)]
#[command(name = "codegraph")]
#[command(about = "CodeGraph tenant-admin CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty, table)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a tenant graph (metadata no-op + schema indexes on backends
    /// that auto-create databases).
    Provision {
        /// Organization id
        #[arg(long)]
        org: Uuid,
        /// Optional slug, folded into the graph name
        #[arg(long)]
        slug: Option<String>,
    },

    /// Deprovision a tenant graph: closes the cached client and drops the
    /// database. Destructive — requires --confirm.
    Deprovision {
        #[arg(long)]
        org: Uuid,
        #[arg(long)]
        slug: Option<String>,
        /// Required acknowledgement; refuses to run without it.
        #[arg(long)]
        confirm: bool,
    },

    /// Show factory-wide cache statistics.
    Stats,

    /// List the organizations with a currently cached client.
    ListCached,

    /// Close every cached client without deprovisioning the underlying graphs.
    CloseAll,

    /// Close one organization's cached client (cache-only; the graph itself
    /// is left intact).
    Clear {
        #[arg(long)]
        org: Uuid,
    },

    /// Print the resolved configuration (graph endpoint, queue, clone dir).
    Config,
}

#[derive(Serialize)]
struct ProvisionResult {
    org_id: String,
    graph_name: String,
    status: String,
}

#[derive(Serialize)]
struct CacheStatsResult {
    cached_clients: usize,
}

#[derive(Serialize, Deserialize, Clone, Tabled)]
struct CachedOrgRow {
    org_id: String,
}

#[derive(Serialize)]
struct ConfigResult {
    env: String,
    log_level: String,
    graph_host: String,
    graph_port: u16,
    graph_ssl: bool,
    graph_namespace_root: String,
    queue_url: String,
    worker_concurrency: usize,
    clone_dir: String,
    app_base_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let settings = CoreSettings::from_env().context("loading configuration")?;
    let factory = GraphClientFactory::new(settings.graph.clone());

    match execute_command(&cli.command, &factory, &settings).await {
        Ok(output) => {
            print_output(&cli.output, &output)?;
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn execute_command(
    cmd: &Commands,
    factory: &GraphClientFactory,
    settings: &CoreSettings,
) -> Result<serde_json::Value> {
    match cmd {
        Commands::Provision { org, slug } => {
            let graph_name = factory
                .provision_tenant(*org, slug.as_deref())
                .await
                .context("failed to provision tenant")?;
            Ok(serde_json::to_value(ProvisionResult {
                org_id: org.to_string(),
                graph_name,
                status: "provisioned".to_string(),
            })?)
        }

        Commands::Deprovision { org, slug, confirm } => {
            if !confirm {
                bail!("refusing to deprovision org {org} without --confirm");
            }
            factory
                .deprovision_tenant(*org, slug.as_deref())
                .await
                .context("failed to deprovision tenant")?;
            Ok(serde_json::json!({
                "org_id": org.to_string(),
                "status": "deprovisioned",
            }))
        }

        Commands::Stats => Ok(serde_json::to_value(CacheStatsResult {
            cached_clients: factory.cached_count(),
        })?),

        Commands::ListCached => {
            let rows: Vec<CachedOrgRow> = factory
                .cached_org_ids()
                .into_iter()
                .map(|id| CachedOrgRow { org_id: id.to_string() })
                .collect();
            Ok(serde_json::to_value(rows)?)
        }

        Commands::CloseAll => {
            factory.close_all();
            Ok(serde_json::json!({ "status": "closed_all" }))
        }

        Commands::Clear { org } => {
            factory.close_client(*org);
            Ok(serde_json::json!({
                "org_id": org.to_string(),
                "status": "cleared",
            }))
        }

        Commands::Config => Ok(serde_json::to_value(ConfigResult {
            env: settings.env.clone(),
            log_level: settings.log_level.clone(),
            graph_host: settings.graph.host.clone(),
            graph_port: settings.graph.port,
            graph_ssl: settings.graph.ssl,
            graph_namespace_root: settings.graph.namespace_root.clone(),
            queue_url: settings.queue.url.clone(),
            worker_concurrency: settings.queue.worker_concurrency,
            clone_dir: settings.clone_dir.clone(),
            app_base_url: settings.app_base_url.clone(),
        })?),
    }
}

fn print_output(format: &OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Pretty => {
            print_pretty(value)?;
        }
        OutputFormat::Table => {
            print_table(value)?;
        }
    }
    Ok(())
}

fn print_pretty(value: &serde_json::Value) -> Result<()> {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    serde_json::Value::String(s) => println!("{}: {}", key_colored, s.green()),
                    serde_json::Value::Number(n) => {
                        println!("{}: {}", key_colored, n.to_string().yellow())
                    }
                    serde_json::Value::Bool(b) => {
                        let val_colored = if *b { "true".green() } else { "false".red() };
                        println!("{}: {}", key_colored, val_colored);
                    }
                    _ => println!("{}: {}", key_colored, val),
                }
            }
        }
        serde_json::Value::Array(arr) => {
            if arr.is_empty() {
                println!("{}", "(none)".dimmed());
            }
            for (i, item) in arr.iter().enumerate() {
                println!("\n{}{}:", "Item ".cyan(), (i + 1).to_string().yellow());
                print_pretty(item)?;
            }
        }
        _ => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

fn print_table(value: &serde_json::Value) -> Result<()> {
    if let serde_json::Value::Array(arr) = value {
        let rows: Result<Vec<CachedOrgRow>, _> =
            arr.iter().cloned().map(serde_json::from_value).collect();
        if let Ok(rows) = rows {
            println!("{}", tabled::Table::new(rows));
            return Ok(());
        }
    }
    print_pretty(value)
}
