// mulegraph/src/main.rs
//
// Mulegraph: headless host for the result explorer.
//
// Three ways to get a result:
//   --input tx.csv       upload a transaction CSV to the analysis service
//   --sample             fetch the service's sample dataset and analyze it
//   --result run.json    load a saved analysis result, no service needed
//
// The layout is run to convergence, filters/focus are applied, and every
// export (JSON, CSV ×2, SVG, PNG, PDF) is written to --output.
//
// Usage:
//   mulegraph --input transactions.csv --output ./out
//   mulegraph --sample --min-risk 60 --pattern cycle
//   mulegraph --result money_muling_report.json --focus-ring RING_001 --no-labels

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mulegraph::aggregate::RiskFilter;
use mulegraph::client::AnalysisClient;
use mulegraph::config::{Config, Theme};
use mulegraph::export::ExportKind;
use mulegraph::filter::PatternFilter;
use mulegraph::layout::{drive, DriveOutcome};
use mulegraph::model::AnalysisResult;
use mulegraph::session::Session;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "mulegraph",
    about   = "Explore and export money-muling analysis results",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[arg(long, conflicts_with_all = ["sample", "result"], help = "Transaction CSV to analyze")]
    input: Option<PathBuf>,

    #[arg(long, conflicts_with = "result", help = "Analyze the service's sample dataset")]
    sample: bool,

    #[arg(long, help = "Saved analysis result (JSON) to load instead of calling the service")]
    result: Option<PathBuf>,

    #[arg(long, help = "JSON config file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Export directory (overrides config)")]
    output: Option<PathBuf>,

    #[arg(long, help = "Analysis service base URL (overrides config)")]
    service: Option<String>,

    #[arg(long, help = "light | dark")]
    theme: Option<Theme>,

    #[arg(long, default_value = "0", help = "Dim suspicious nodes scoring below this")]
    min_risk: f64,

    #[arg(long, help = "Dim every clean node")]
    suspicious_only: bool,

    #[arg(long, default_value = "all", help = "all | cycle | fan_in | fan_out | shell_network")]
    pattern: String,

    #[arg(long, conflicts_with = "focus_account")]
    focus_ring: Option<String>,

    #[arg(long)]
    focus_account: Option<String>,

    #[arg(long, help = "Hide node labels")]
    no_labels: bool,

    #[arg(long, default_value = "all", help = "Accounts table filter: all | high | med | low")]
    accounts: String,
}

// ── Terminal output ───────────────────────────────────────────────────────────

fn print_summary(session: &Session, risk: RiskFilter) -> Result<()> {
    let run    = session.require()?;
    let kpis   = &run.charts.kpis;
    let bold   = "\x1b[1m";
    let reset  = "\x1b[0m";

    println!("\n{}── run {} ──{}", bold, run.generation, reset);
    println!("  Accounts   : {}", kpis.total_accounts);
    println!("  Suspicious : {} ({}%)", kpis.suspicious_accounts, kpis.suspicious_pct);
    println!("  Rings      : {}", kpis.rings);
    println!("  Processing : {:.2}s", kpis.processing_seconds);
    if let Some(insight) = &kpis.ai_insight {
        println!("  Insight    : {}", insight);
    }

    println!("\n{}Risk bands{}", bold, reset);
    for (band, n) in run.charts.risk.bands() {
        println!("  {:<16} {}", band.label(), n);
    }

    println!("\n{}Ring patterns{}", bold, reset);
    for (pattern, n) in run.charts.patterns.entries() {
        println!("  {:<16} {}", pattern, n);
    }

    println!("\n{}Fraud rings{}", bold, reset);
    for ring in &run.result.fraud_rings {
        println!(
            "  {:<12} {:<14} risk {:>5.1}  {} members",
            ring.ring_id,
            ring.pattern_type,
            ring.risk_score,
            ring.member_accounts.len()
        );
    }

    let accounts = risk.apply(&run.result.suspicious_accounts);
    println!("\n{}Suspicious accounts{} ({})", bold, reset, accounts.len());
    for a in accounts {
        println!(
            "  {:<16} {:>5.1}  {:<28} {}",
            a.account_id,
            a.suspicion_score,
            run.index.describe(&a.account_id),
            a.ring_id.as_deref().unwrap_or("—"),
        );
    }
    Ok(())
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("mulegraph=info".parse()?))
        .compact().init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None       => Config::default(),
    };
    if let Some(dir) = cli.output.clone()  { config.export.output_dir = dir; }
    if let Some(url) = cli.service.clone() { config.service.base_url  = url; }
    if let Some(theme) = cli.theme         { config.export.theme      = theme; }

    let pattern = PatternFilter::parse(&cli.pattern)
        .with_context(|| format!("unknown pattern {:?}", cli.pattern))?;
    let risk = RiskFilter::parse(&cli.accounts)
        .with_context(|| format!("unknown risk filter {:?}", cli.accounts))?;

    let mut session = Session::new(config.layout.clone());

    // ── Obtain a result ──────────────────────────────────────────────────────
    if let Some(path) = &cli.result {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let result = AnalysisResult::from_json(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        session.load(result)?;
    } else {
        let client = AnalysisClient::new(&config.service)?;
        if cli.sample {
            let file = client.sample().await.map_err(|e| anyhow::anyhow!(e.user_message()))?;
            session.select_file(&file.name, file.data)?;
        } else if let Some(path) = &cli.input {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            session.select_file(&name, data)?;
        } else {
            bail!("one of --input, --sample or --result is required");
        }

        let (token, file) = session.begin_run()?;
        let result = client.analyze(&file).await.map_err(|e| anyhow::anyhow!(e.user_message()))?;
        session.apply(&token, result)?;
    }

    // ── Presentation state ───────────────────────────────────────────────────
    session.filter.set_min_risk(cli.min_risk);
    session.filter.suspicious_only = cli.suspicious_only;
    session.filter.pattern         = pattern;
    session.filter.show_labels     = !cli.no_labels;
    if let Some(ring) = &cli.focus_ring {
        if let Err(e) = session.focus_ring(ring) {
            warn!("focus ignored: {}", e);
        }
    }
    if let Some(account) = &cli.focus_account {
        session.search(account)?;
    }

    // ── Layout ───────────────────────────────────────────────────────────────
    let (layout, token) = session.layout_token()?;
    match drive(layout, token, None, |_| {}).await {
        DriveOutcome::Settled { ticks }   => info!("layout settled after {} ticks", ticks),
        DriveOutcome::Cancelled { ticks } => warn!("layout cancelled after {} ticks", ticks),
    }

    print_summary(&session, risk)?;

    // ── Exports ──────────────────────────────────────────────────────────────
    let dir = config.export.output_dir.clone();
    for kind in [ExportKind::Json, ExportKind::Csv, ExportKind::Svg, ExportKind::Png, ExportKind::Pdf] {
        match session.export(kind, &config.export) {
            Ok(artifacts) => {
                for a in &artifacts {
                    a.write_to(&dir).await?;
                }
            }
            Err(e) => warn!("{} export failed: {}", kind, e),
        }
    }

    println!("\n\x1b[1mExports\x1b[0m  → {}", dir.display());
    for record in session.history.recent() {
        println!("  {}", record);
    }
    Ok(())
}
