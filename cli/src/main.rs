//! Grapht CLI: audit and maintenance front end over a Grapht mutation log
//!
//! Opens the log, replays it into a store and reads or extends the result.

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use grapht::graph::{Graph, Node, Type};
use grapht::{Claims, Mutation, MutationRecord, Query, Store, StoreConfig};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "grapht", version, about = "Grapht mutation log CLI")]
struct Cli {
    /// Mutation log file
    #[arg(long, global = true, default_value = "grapht.log")]
    log: PathBuf,

    /// Store configuration (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List committed mutations
    History {
        /// Only records strictly after this time (RFC 3339)
        #[arg(long)]
        after: Option<DateTime<Utc>>,

        /// Only records strictly before this time (RFC 3339)
        #[arg(long)]
        before: Option<DateTime<Utc>>,
    },
    /// List nodes, optionally filtered by type name
    Nodes {
        #[arg(long = "type")]
        types: Vec<String>,
    },
    /// List type definitions
    Types,
    /// Commit a JSON-lines file of `{op, params}` mutations as one batch
    Apply {
        file: PathBuf,

        #[arg(long)]
        uid: Option<String>,

        #[arg(long)]
        role: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let store = Store::open(&cli.log, config)
        .with_context(|| format!("opening log {}", cli.log.display()))?;

    let result = match cli.command {
        Commands::History { after, before } => {
            run_history(&store.history(after, before), &cli.format)
        }
        Commands::Nodes { types } => run_nodes(&store, types, &cli.format),
        Commands::Types => run_types(&store, &cli.format),
        Commands::Apply { file, uid, role } => run_apply(&store, &file, uid, role),
    };

    store.close()?;
    result
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StoreConfig> {
    let Some(path) = path else {
        return Ok(StoreConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn run_history(records: &[MutationRecord], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["time", "uid", "role", "op", "params"]);
            for r in records {
                table.add_row(vec![
                    r.timestamp.to_rfc3339(),
                    r.claims.uid(),
                    r.claims.role(),
                    r.mutation.name().to_string(),
                    serde_json::to_string(&r.mutation.params())?,
                ]);
            }
            println!("{}", table);
            println!("{} record(s)", records.len());
        }
    }
    Ok(())
}

fn run_nodes(store: &Store, types: Vec<String>, format: &OutputFormat) -> anyhow::Result<()> {
    let conn = store.new_connection(Claims::new())?;
    let nodes = conn.query(&Query::Nodes { types })?.into_nodes();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&nodes)?);
        }
        OutputFormat::Table => {
            let graph = conn.snapshot();
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["id", "type", "attrs", "out", "in"]);
            for node in &nodes {
                table.add_row(node_row(&graph, node));
            }
            println!("{}", table);
            println!("{} node(s)", nodes.len());
        }
    }
    Ok(())
}

fn node_row(graph: &Graph, node: &Node) -> Vec<String> {
    let type_name = node
        .type_id
        .as_ref()
        .and_then(|id| graph.type_by_id(id))
        .map(|t| t.name.clone())
        .unwrap_or_else(|| "-".to_string());
    let attrs = node
        .attrs
        .iter()
        .map(|a| format!("{}={}", a.name, a.value))
        .collect::<Vec<_>>()
        .join(", ");
    let (out, inbound) = graph
        .get(node.id.as_str())
        .map(|n| (n.out(&[]).len(), n.inbound(&[]).len()))
        .unwrap_or((0, 0));
    vec![
        node.id.to_string(),
        type_name,
        attrs,
        out.to_string(),
        inbound.to_string(),
    ]
}

fn run_types(store: &Store, format: &OutputFormat) -> anyhow::Result<()> {
    let graph = store.graph();
    let types = graph.types();

    match format {
        OutputFormat::Json => {
            let defs: Vec<&Type> = types.iter().map(|t| t.as_ref()).collect();
            println!("{}", serde_json::to_string_pretty(&defs)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["id", "name", "fields"]);
            for t in types {
                let fields = t
                    .fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name, f.kind))
                    .collect::<Vec<_>>()
                    .join(", ");
                table.add_row(vec![t.id.to_string(), t.name.clone(), fields]);
            }
            println!("{}", table);
            println!("{} type(s)", types.len());
        }
    }
    Ok(())
}

fn run_apply(
    store: &Store,
    file: &Path,
    uid: Option<String>,
    role: Option<String>,
) -> anyhow::Result<()> {
    let mut claims = Claims::new();
    if let Some(uid) = uid {
        claims = claims.with("uid", uid);
    }
    if let Some(role) = role {
        claims = claims.with("role", role);
    }

    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let conn = store.new_connection(claims)?;

    let mut applied = 0;
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let lineno = i + 1;
        let mutation = parse_line(line).with_context(|| format!("line {}", lineno))?;
        conn.exec(mutation).with_context(|| format!("line {}", lineno))?;
        applied += 1;
    }

    if applied == 0 {
        bail!("{} contains no mutations", file.display());
    }
    let queued = conn.pending().len();
    conn.commit()?;
    println!("Committed {} mutation(s) ({} changed the graph)", applied, queued);
    Ok(())
}

fn parse_line(line: &str) -> anyhow::Result<Mutation> {
    let value: Value = serde_json::from_str(line)?;
    let op = value
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing \"op\""))?;
    let params = value.get("params").cloned().unwrap_or(Value::Null);
    Ok(Mutation::bind(op, params)?)
}
