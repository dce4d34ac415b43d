//! CLI command implementations.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use kitsu_core::Dataset;
use kitsu_graph::{AnalysisConfig, FlowStore, ProcessAnalyzer, Stability};
use kitsu_server::{KitsuServer, ServerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const CONFIG_DIR: &str = ".kitsu";
const CONFIG_FILE: &str = "config.json";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Contents of `.kitsu/config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KitsuConfig {
    pub version: String,
    /// Store location, relative to the project root unless absolute.
    pub store_path: PathBuf,
    pub port: u16,
    pub analysis: AnalysisConfig,
}

impl Default for KitsuConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            store_path: PathBuf::from(CONFIG_DIR).join("store"),
            port: 7432,
            analysis: AnalysisConfig::default(),
        }
    }
}

/// Where commands run and what they run with.
pub struct Context {
    root: PathBuf,
    config: KitsuConfig,
    store_override: Option<PathBuf>,
}

impl Context {
    /// Loads `.kitsu/config.json` under `root`, falling back to defaults.
    pub fn load(root: &Path, store_override: Option<PathBuf>) -> Result<Self> {
        let config_path = root.join(CONFIG_DIR).join(CONFIG_FILE);
        let config = if config_path.exists() {
            debug!("Loading config from {}", config_path.display());
            serde_json::from_str(&fs::read_to_string(&config_path)?)?
        } else {
            KitsuConfig::default()
        };

        Ok(Self {
            root: root.to_path_buf(),
            config,
            store_override,
        })
    }

    pub fn store_path(&self) -> PathBuf {
        let path = self
            .store_override
            .as_ref()
            .unwrap_or(&self.config.store_path);
        if path.is_absolute() {
            path.clone()
        } else {
            self.root.join(path)
        }
    }

    fn open_store(&self) -> Result<FlowStore> {
        let path = self.store_path();
        debug!("Opening store at {}", path.display());
        Ok(FlowStore::open(path)?)
    }

    fn analyzer<'a>(&self, store: &'a FlowStore) -> ProcessAnalyzer<'a, FlowStore> {
        ProcessAnalyzer::with_config(store, self.config.analysis.clone())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn stability_label(stability: Stability) -> colored::ColoredString {
    match stability {
        Stability::Stable => stability.as_str().green(),
        Stability::Moderate => stability.as_str().yellow(),
        Stability::Unstable => stability.as_str().red(),
    }
}

fn or_dash(value: Option<f64>, suffix: &str) -> String {
    value
        .map(|v| format!("{}{}", v, suffix))
        .unwrap_or_else(|| "-".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Initialize Kitsu in a directory.
pub fn init(path: &Path) -> Result<()> {
    let kitsu_dir = path.join(CONFIG_DIR);

    if kitsu_dir.join(CONFIG_FILE).exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    fs::create_dir_all(&kitsu_dir)?;
    let config = KitsuConfig::default();
    fs::write(
        kitsu_dir.join(CONFIG_FILE),
        serde_json::to_string_pretty(&config)?,
    )?;

    println!("{} Initialized Kitsu in {}", "✓".green(), path.display());
    println!("  Run {} to load a dataset", "kitsu import <file>".cyan());

    Ok(())
}

/// Load a JSON dataset into the store.
pub fn import(ctx: &Context, file: &Path) -> Result<()> {
    let dataset: Dataset = serde_json::from_str(&fs::read_to_string(file)?)?;
    let store = ctx.open_store()?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(format!("Importing {}...", file.display()));

    let stats = store.import(&dataset);
    spinner.finish_and_clear();
    let stats = stats?;

    println!(
        "{} Imported {} graphs ({} nodes, {} edges) and {} events",
        "✓".green(),
        stats.graphs.to_string().cyan(),
        stats.nodes,
        stats.edges,
        stats.events.to_string().cyan()
    );

    Ok(())
}

/// List stored graphs.
pub fn list(ctx: &Context, json_output: bool) -> Result<()> {
    let graphs = ctx.open_store()?.list_graphs()?;

    if json_output {
        return print_json(&graphs);
    }

    if graphs.is_empty() {
        println!("No graphs stored. Run {} first.", "kitsu import".cyan());
        return Ok(());
    }

    for graph in graphs {
        print!("  {} {}", graph.id.cyan(), graph.name);
        if let Some(description) = &graph.description {
            print!(" {}", format!("- {}", description).dimmed());
        }
        println!();
    }

    Ok(())
}

/// Rank bottleneck machines.
pub fn bottlenecks(
    ctx: &Context,
    graph_id: &str,
    window: Option<f64>,
    top: Option<usize>,
    json_output: bool,
) -> Result<()> {
    let store = ctx.open_store()?;
    let analyzer = ctx.analyzer(&store);
    let window = window.unwrap_or(analyzer.config().window_hours);
    let top = top.unwrap_or(analyzer.config().top_n);
    let threshold = analyzer.config().bottleneck_threshold;

    let ranked = analyzer.analyze_bottlenecks(graph_id, window, top)?;
    let primary = ranked
        .first()
        .filter(|r| r.score.total_score > threshold)
        .map(|r| r.machine_name.clone());

    if json_output {
        return print_json(&serde_json::json!({
            "graph_id": graph_id,
            "window_hours": window,
            "bottlenecks": ranked,
            "primary_bottleneck": primary,
        }));
    }

    println!(
        "{} in {} (last {}h)",
        "Bottlenecks".bold(),
        graph_id.cyan(),
        window
    );
    println!();

    if ranked.is_empty() {
        println!("  No machines in this graph.");
        return Ok(());
    }

    for (rank, record) in ranked.iter().enumerate() {
        let s = &record.score;
        let total = format!("{:>6.2}", s.total_score);
        let total = if s.total_score > threshold {
            total.red().bold()
        } else {
            total.normal()
        };
        println!(
            "  {:>2}. {:<24} {}  {}",
            rank + 1,
            record.machine_name,
            total,
            format!(
                "util {:.2} queue {:.2} var {:.2} cent {:.2} down {:.2}",
                s.utilization_score,
                s.queue_score,
                s.variance_score,
                s.centrality_score,
                s.downstream_score
            )
            .dimmed()
        );
        println!(
            "      {} events, {}/h, {}% of capacity, cv {}",
            s.event_count, s.actual_throughput, s.utilization_percent, s.cv
        );
    }

    println!();
    match primary {
        Some(name) => println!("{} Primary bottleneck: {}", "⚠".yellow(), name.red().bold()),
        None => println!("{} No machine above {:.0}", "✓".green(), threshold),
    }

    Ok(())
}

/// Show the critical path.
pub fn critical_path(ctx: &Context, graph_id: &str, json_output: bool) -> Result<()> {
    let store = ctx.open_store()?;
    let path = ctx.analyzer(&store).critical_path(graph_id)?;

    if json_output {
        return print_json(&path);
    }

    if let Some(message) = &path.message {
        println!("{} {}", "⚠".yellow(), message);
        return Ok(());
    }
    if let Some(error) = &path.error {
        return Err(error.clone().into());
    }
    if path.path.is_empty() {
        println!("Graph {} has no machines.", graph_id.cyan());
        return Ok(());
    }

    println!("{}", "Critical path".bold());
    println!("  {}", path.path.join(" → ").cyan());
    println!("  Total expected duration: {}s", path.total_duration);

    Ok(())
}

/// Show graph-level statistics.
pub fn summary(ctx: &Context, graph_id: &str, json_output: bool) -> Result<()> {
    let store = ctx.open_store()?;
    let summary = ctx.analyzer(&store).graph_summary(graph_id)?;

    if json_output {
        return print_json(&summary);
    }

    println!("{} ({})", summary.name.bold(), summary.graph_id.cyan());
    println!("  Machines:       {}", summary.node_count);
    println!("  Process steps:  {}", summary.edge_count);
    println!("  Density:        {}", summary.density);
    println!("  Avg degree:     {}", summary.avg_out_degree);
    println!("  Components:     {}", summary.scc_count);
    if summary.has_cycles {
        println!("  Rework loops:   {}", "yes".yellow());
    } else {
        println!("  Rework loops:   {}", "no".green());
    }

    Ok(())
}

/// Detail view for one machine.
pub fn node(
    ctx: &Context,
    graph_id: &str,
    node_id: &str,
    window: Option<f64>,
    json_output: bool,
) -> Result<()> {
    let store = ctx.open_store()?;
    let analyzer = ctx.analyzer(&store);
    let window = window.unwrap_or(analyzer.config().window_hours);
    let m = analyzer.node_metrics(graph_id, node_id, window)?;

    if json_output {
        return print_json(&m);
    }

    println!("{} ({}), last {}h", m.machine_name.bold(), m.node_id.cyan(), m.window_hours);
    println!("  Events:       {}", m.event_count);
    println!("  Throughput:   {}/h", m.throughput);
    println!("  Capacity:     {}", or_dash(m.theoretical_capacity, "/h"));
    println!("  Utilization:  {}", or_dash(m.utilization, "%"));
    println!(
        "  Duration:     mean {}s, median {}s, std {}s, range {}-{}s",
        m.mean_duration, m.median_duration, m.std_duration, m.min_duration, m.max_duration
    );
    println!("  Stability:    {} (cv {})", stability_label(m.stability), m.cv);
    println!(
        "  Degree:       {} in, {} out, betweenness {}",
        m.in_degree, m.out_degree, m.betweenness
    );
    println!("  Score:        {:.2}", m.score.total_score);

    Ok(())
}

/// Detail view for one process step.
pub fn edge(
    ctx: &Context,
    graph_id: &str,
    edge_id: &str,
    window: Option<f64>,
    json_output: bool,
) -> Result<()> {
    let store = ctx.open_store()?;
    let analyzer = ctx.analyzer(&store);
    let window = window.unwrap_or(analyzer.config().window_hours);
    let m = analyzer.edge_metrics(graph_id, edge_id, window)?;

    if json_output {
        return print_json(&m);
    }

    println!(
        "{} ({}): {} → {}, last {}h",
        m.process_name.bold(),
        m.edge_id.cyan(),
        m.source,
        m.target,
        m.window_hours
    );
    println!("  Events:       {}", m.event_count);
    println!("  Flow rate:    {}/h", m.flow_rate);
    println!(
        "  Duration:     mean {}s, expected {}",
        m.mean_duration,
        or_dash(m.expected_duration, "s")
    );
    println!("  Variance:     {}", m.variance);
    println!("  Stability:    {} (cv {})", stability_label(m.stability), m.cv);
    println!("  Performance:  {}", or_dash(m.performance_ratio, "x"));

    Ok(())
}

/// Start the Kitsu server.
pub async fn serve(ctx: &Context, port: Option<u16>, headless: bool) -> Result<()> {
    let bind_addr = if headless { "0.0.0.0" } else { "127.0.0.1" };
    let port = port.unwrap_or(ctx.config.port);

    if headless {
        println!("{}", "Starting Kitsu server in headless mode...".cyan());
    } else {
        println!("{}", "Starting Kitsu server...".cyan());
    }

    let store = ctx.open_store()?;
    let graphs = store.list_graphs()?.len();
    println!("{} Opened store with {} graphs", "✓".green(), graphs);

    let addr = format!("{}:{}", bind_addr, port).parse()?;
    let server = KitsuServer::new(
        Arc::new(store),
        ctx.config.analysis.clone(),
        ServerConfig { addr },
    );

    println!("{} Listening on ws://{}:{}", "✓".green(), bind_addr, port);
    if headless {
        println!("  Headless mode: accepting connections from any host");
    }
    println!("  Press {} to stop", "Ctrl+C".cyan());

    server.run().await.map_err(|e| e.to_string())?;

    Ok(())
}
