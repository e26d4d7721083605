//! vibeshard - explain where WHERE predicates are pushed in a sharded plan

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use log::info;
use std::path::PathBuf;
use vibeshard::expression::FunctionRegistry;
use vibeshard::planner::Planner;
use vibeshard::scenario::Scenario;

/// Explain predicate push-down for a distributed query plan
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario file (JSON) describing tables, plan tree and predicates
    #[arg(short, long)]
    scenario: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Keep arguments of multi-table predicates at the join
    #[arg(long)]
    push_down_restricted: bool,

    /// Print the query each shard table receives
    #[arg(long)]
    sql: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let scenario = Scenario::load(&args.scenario)?;
    let mut built = scenario.build().context("Failed to build scenario")?;

    if !FunctionRegistry::install_global(built.registry.clone()) {
        info!("global function registry already initialised");
    }

    let planner = Planner::new(FunctionRegistry::global())
        .with_push_down_restricted(args.push_down_restricted || built.push_down_restricted);

    let mut placements = Vec::new();
    for predicate in std::mem::take(&mut built.predicates) {
        let placed = planner
            .plan_filter(&mut built.plan, built.root, predicate)
            .context("Failed to place predicate")?;
        placements.extend(placed);
    }

    println!("Plan root: {}", built.plan.describe(built.root));
    for line in planner.explain(&built.plan, built.root, &placements) {
        println!("  {}", line);
    }

    if args.sql {
        println!();
        println!("Shard queries:");
        let queries = planner
            .shard_sql(&built.plan, built.root, &placements)
            .context("Failed to render shard queries")?;
        for query in queries {
            println!("  {}", query);
        }
    }

    Ok(())
}
