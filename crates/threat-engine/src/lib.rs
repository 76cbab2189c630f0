//! # threat-engine
//!
//! Core analysis logic for the threat-lens project.  This crate loads JSON
//! rule-set documents, compiles their match expressions into a small boolean
//! expression language, and evaluates every node of a data-flow diagram
//! against the resulting catalog, attaching a structured finding for each
//! rule that matches.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use threat_engine::{Diagram, EngineConfig, ThreatEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ThreatEngine::new(EngineConfig::default());
//! engine.initialize().await?;
//!
//! let diagram: Diagram = serde_json::from_str(r#"{"title": "demo", "nodes": []}"#)?;
//! let analyzed = engine.analyze(&diagram)?;
//! println!("{} nodes analyzed", analyzed.nodes.len());
//! # Ok(())
//! # }
//! ```

pub mod condition;
mod diagram;
mod engine;
pub mod loader;
mod schema;

// Re-export primary public API at crate root.
pub use condition::{Expr, Predicate};
pub use diagram::{Cell, CellType, Diagram, Finding};
pub use engine::{EngineConfig, EngineError, EngineInfo, ThreatEngine};
pub use loader::{CatalogError, RuleCatalog, SUPPLEMENTAL_FILE};
pub use schema::{FindingTemplate, Rule, RuleSet};
