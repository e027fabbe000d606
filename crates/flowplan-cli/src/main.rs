//! flowplan CLI: validate and inspect execution plans declared in YAML.

use clap::{Args, Parser, Subcommand};
use flowplan_core::config::PlannerConfig;
use flowplan_planner::{
    parse_yaml_graph, DslError, ParsedGraph, Plan, PlanDetail, PlanError, PlanSnapshot,
};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "flowplan")]
#[command(about = "Partition operator graphs into stage plans", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that every declared stage is well formed
    Validate {
        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Build the plan and print a summary (or the JSON snapshot)
    Plan {
        #[command(flatten)]
        plan: PlanArgs,

        /// Print the full plan snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the stages of a plan and the links between them
    Explain {
        #[command(flatten)]
        plan: PlanArgs,
    },
}

#[derive(Args, Debug, Default)]
struct PlanArgs {
    /// Path to the graph YAML file
    #[arg(short, long)]
    graph: PathBuf,

    /// Skip the stage-graph cycle check (overrides config)
    #[arg(long)]
    no_verify_acyclic: bool,

    /// Allow interior operators to appear in several stages (overrides config)
    #[arg(long)]
    allow_overlap: bool,

    /// Maximum number of stages (overrides config)
    #[arg(long)]
    max_stages: Option<usize>,
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("FLOWPLAN_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Validate { plan } => validate_graph(&plan),
        Commands::Plan { plan, json } => plan_graph(&plan, json),
        Commands::Explain { plan } => explain_graph(&plan),
    };
    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Env < YAML `config:` < command-line flags.
fn resolve_config(parsed: &ParsedGraph, env: PlannerConfig, args: &PlanArgs) -> PlannerConfig {
    let mut config = parsed.effective_config(env);
    if args.no_verify_acyclic {
        config.verify_acyclic = false;
    }
    if args.allow_overlap {
        config.enforce_disjoint_bodies = false;
    }
    if let Some(limit) = args.max_stages {
        config.max_stages = Some(limit);
    }
    config
}

type Loaded = (ParsedGraph, PlannerConfig, PlanDetail);

fn load(args: &PlanArgs) -> Result<Loaded, Box<dyn std::error::Error>> {
    let yaml_content = fs::read_to_string(&args.graph)?;
    let parsed = parse_yaml_graph(&yaml_content)?;
    let config = resolve_config(&parsed, PlannerConfig::from_env(), args);
    tracing::debug!(?config, path = %args.graph.display(), "planning");

    let detail = match parsed.build_plan(&config) {
        Ok(detail) => detail,
        Err(e) => return Err(describe(&parsed, e).into()),
    };
    Ok((parsed, config, detail))
}

/// Appends the offending operator's name to planning diagnostics.
fn describe(parsed: &ParsedGraph, err: DslError) -> String {
    let (prefix, source) = match &err {
        DslError::Stage { index, source } => (format!("stage #{index}: "), source),
        DslError::Plan(source) => (String::new(), source),
        _ => return err.to_string(),
    };
    let name = source
        .operator()
        .and_then(|op| parsed.graph.operator(op))
        .map(|op| format!(" [operator '{}']", op.name()))
        .unwrap_or_default();
    format!("{prefix}{source}{name} ({:?})", source.kind())
}

fn validate_graph(args: &PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (_, _, detail) = load(args)?;
    println!("✓ Plan is valid ({} stages)", detail.plan().len());
    Ok(())
}

fn plan_graph(args: &PlanArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (parsed, config, detail) = load(args)?;
    let snapshot = PlanSnapshot::from_detail(&parsed.graph, &detail);
    if json {
        println!("{}", snapshot.to_json_pretty()?);
        return Ok(());
    }

    let order = order_line(detail.plan(), &config)?;
    println!("✓ Plan built");
    println!("  Stages: {}", snapshot.stages.len());
    println!("  Stage ports: {}", snapshot.ports.len());
    println!("  Links: {}", snapshot.edges.len());
    println!("  Order: {order}");
    println!("  Fingerprint: {}", snapshot.fingerprint()?);
    Ok(())
}

/// Stage execution order; a cycle is only an error while the check is on.
fn order_line(plan: &Plan, config: &PlannerConfig) -> Result<String, PlanError> {
    match plan.sorted_stages() {
        Ok(order) => Ok(order
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")),
        Err(PlanError::CyclicPlan { .. }) if !config.verify_acyclic => {
            Ok("<cyclic>".to_string())
        }
        Err(e) => Err(e),
    }
}

fn explain_graph(args: &PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (parsed, _, detail) = load(args)?;
    print!(
        "{}",
        PlanSnapshot::from_detail(&parsed.graph, &detail).explain()
    );
    Ok(())
}
