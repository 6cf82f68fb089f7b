use anyhow::{bail, Context, Result};
use butterfly_ch::{
    validate_random_pairs, verify_shortcuts, ChQuery, ContractionConfig, ContractionHierarchy,
    Graph, VertexId,
};
use butterfly_route::{load_graph, load_hierarchy, write_arcs, write_levels};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "butterfly-route")]
#[command(about = "Contraction hierarchy routing over CSV road graphs", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GraphArgs {
    /// Node CSV (id,lat,lon)
    #[arg(long)]
    nodes: PathBuf,
    /// Edge CSV (from,to,weight,forward,backward)
    #[arg(long)]
    edges: PathBuf,
    /// Contraction parameters (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Contract a graph and print hierarchy statistics
    Build {
        #[command(flatten)]
        graph: GraphArgs,
        /// Write hierarchy arcs to this CSV
        #[arg(long)]
        arcs: Option<PathBuf>,
        /// Write vertex levels to this CSV
        #[arg(long)]
        levels: Option<PathBuf>,
    },
    /// Find the shortest route between two vertex ids
    Route {
        #[command(flatten)]
        graph: GraphArgs,
        #[arg(long)]
        from: VertexId,
        #[arg(long)]
        to: VertexId,
    },
    /// Route over a hierarchy previously written by `build`
    Query {
        /// Node CSV (id,lat,lon)
        #[arg(long)]
        nodes: PathBuf,
        /// Hierarchy arc CSV (from,to,weight,contracted_via)
        #[arg(long)]
        arcs: PathBuf,
        /// Vertex level CSV (id,level)
        #[arg(long)]
        levels: PathBuf,
        #[arg(long)]
        from: VertexId,
        #[arg(long)]
        to: VertexId,
    },
    /// Compare CH distances against Dijkstra on random pairs
    Validate {
        #[command(flatten)]
        graph: GraphArgs,
        /// Number of random queries
        #[arg(long, default_value = "1000")]
        queries: usize,
        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> Result<ContractionConfig> {
    match path {
        Some(path) => ContractionConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(ContractionConfig::default()),
    }
}

fn contract(graph: Graph, args: &GraphArgs) -> Result<ContractionHierarchy> {
    let config = load_config(args.config.as_deref())?;
    ContractionHierarchy::build(graph, &config).map_err(|e| {
        let reason = if e.is_graph_precondition() {
            "Input graph rejected"
        } else {
            "Contraction failed"
        };
        anyhow::Error::new(e).context(reason)
    })
}

fn route(ch: &ContractionHierarchy, from: VertexId, to: VertexId) -> Result<()> {
    let start = Instant::now();
    let (route, stats) = ChQuery::new(ch)
        .route_with_stats(from, to)
        .with_context(|| format!("Route query {from} -> {to} failed"))?;
    let elapsed = start.elapsed();

    match route {
        Some(route) => {
            let path: Vec<String> = route.vertices.iter().map(|v| v.to_string()).collect();
            println!("Weight: {}", route.weight);
            println!("Vertices: {}", path.join(" -> "));
        }
        None => println!("No route from {from} to {to}"),
    }
    println!(
        "Query: {:.3} ms, settled {} + {}, stalled {}",
        elapsed.as_secs_f64() * 1000.0,
        stats.settled_forward,
        stats.settled_backward,
        stats.stalled
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Build {
            graph,
            arcs,
            levels,
        } => {
            let start = Instant::now();
            let ch = contract(load_graph(&graph.nodes, &graph.edges)?, &graph)?;
            let stats = ch.stats();

            println!("\n=== CONTRACTION HIERARCHY ===");
            println!("  Vertices:          {}", stats.n_vertices);
            println!("  Original arcs:     {}", stats.n_original_arcs);
            println!("  Shortcuts:         {}", stats.n_shortcuts);
            println!("  Lazy re-queues:    {}", stats.lazy_requeues);
            println!(
                "  Witness searches:  {} ({} capped)",
                stats.witness_searches, stats.capped_searches
            );
            println!("  Contraction time:  {} ms", stats.contraction_time_ms);

            if let Some(path) = arcs {
                let rows = write_arcs(&ch, &path)?;
                println!("  Wrote {} arcs to {}", rows, path.display());
            }
            if let Some(path) = levels {
                write_levels(&ch, &path)?;
                println!("  Wrote levels to {}", path.display());
            }
            println!("\nTotal time: {:.2}s", start.elapsed().as_secs_f64());
        }
        Commands::Route { graph, from, to } => {
            let ch = contract(load_graph(&graph.nodes, &graph.edges)?, &graph)?;
            route(&ch, from, to)?;
        }
        Commands::Query {
            nodes,
            arcs,
            levels,
            from,
            to,
        } => {
            let ch = load_hierarchy(&nodes, &arcs, &levels)?;
            route(&ch, from, to)?;
        }
        Commands::Validate {
            graph,
            queries,
            seed,
        } => {
            let original = load_graph(&graph.nodes, &graph.edges)?;
            let ch = contract(original.clone(), &graph)?;

            let result = validate_random_pairs(&original, &ch, queries, seed)?;
            result.print();

            let report = verify_shortcuts(&ch);
            println!(
                "  Shortcuts:       {} checked, {} unsound",
                report.checked,
                report.unsound.len()
            );

            if !result.is_valid() || !report.is_sound() {
                bail!("Validation failed");
            }
        }
    }

    Ok(())
}
