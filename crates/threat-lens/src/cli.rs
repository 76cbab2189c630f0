use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "threat-lens", version, about = "Rule-driven threat analysis for data-flow diagrams")]
pub struct Cli {
    /// Path to the diagram JSON file to analyze
    pub diagram: PathBuf,

    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Directory containing rule-set documents (overrides config file setting)
    #[arg(long)]
    pub rules_dir: Option<PathBuf>,

    /// Write the analyzed diagram to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Skip supplemental rules for this run (overrides config and environment)
    #[arg(long)]
    pub no_supplemental: bool,
}
