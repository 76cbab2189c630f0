mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use threat_engine::{Diagram, EngineConfig, ThreatEngine};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then apply overrides: CLI beats environment beats file.
    let mut cfg = config::load(&cli.config)?;

    if let Some(ref dir) = cli.rules_dir {
        cfg.rules.dir = dir.clone();
    }
    if let Some(enabled) = config::supplemental_override_from_env() {
        cfg.rules.supplemental_enabled = enabled;
    }
    if cli.no_supplemental {
        cfg.rules.supplemental_enabled = false;
    }

    // 3. Init tracing on stderr so stdout carries only the analyzed diagram.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        diagram = %cli.diagram.display(),
        rules_dir = %cfg.rules.dir.display(),
        supplemental = cfg.rules.supplemental_enabled,
        "threat-lens starting"
    );

    // 4. Build and initialize the engine.
    let engine = ThreatEngine::new(EngineConfig {
        rules_dir: cfg.rules.dir.clone(),
        supplemental_enabled: cfg.rules.supplemental_enabled,
    });
    engine
        .initialize()
        .await
        .context("failed to initialize threat engine")?;

    let engine_info = engine.info();
    info!(
        baseline = engine_info.baseline_rules,
        supplemental = engine_info.supplemental_rules,
        effective = engine_info.effective_rules,
        "threat engine initialized"
    );

    // 5. Read the diagram.
    let raw = std::fs::read_to_string(&cli.diagram)
        .with_context(|| format!("failed to read diagram file: {}", cli.diagram.display()))?;
    let diagram: Diagram = serde_json::from_str(&raw)
        .with_context(|| format!("invalid diagram document: {}", cli.diagram.display()))?;

    // 6. Analyze.
    let analyzed = engine.analyze(&diagram).context("analysis failed")?;

    let finding_count: usize = analyzed
        .nodes
        .iter()
        .map(|cell| cell.findings.len())
        .sum();
    info!(
        findings = finding_count,
        nodes = analyzed.nodes.len(),
        "analysis complete"
    );

    // 7. Write the analyzed diagram.
    let rendered = serde_json::to_string_pretty(&analyzed)
        .context("failed to serialize analyzed diagram")?;
    match cli.output {
        Some(ref path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write output file: {}", path.display()))?;
            info!(output = %path.display(), "analyzed diagram written");
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
