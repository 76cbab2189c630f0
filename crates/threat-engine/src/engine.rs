use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use crate::condition::Expr;
use crate::diagram::{Cell, Diagram, Finding};
use crate::loader::{CatalogError, RuleCatalog};
use crate::schema::Rule;

/// Configuration for constructing a [`ThreatEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory scanned for rule-set documents.
    pub rules_dir: PathBuf,
    /// Whether the supplemental rule collection is applied during analysis.
    pub supplemental_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules_dir: PathBuf::from("rules"),
            supplemental_enabled: true,
        }
    }
}

/// Errors surfaced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// [`ThreatEngine::analyze`] was called before initialization completed.
    #[error("threat engine not initialized; call initialize() first")]
    NotInitialized,

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Introspection snapshot of the engine's catalog state.
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub initialized: bool,
    pub baseline_rules: usize,
    pub supplemental_rules: usize,
    pub supplemental_enabled: bool,
    /// Rules that will actually run per node: baseline plus supplemental
    /// when the toggle is on.
    pub effective_rules: usize,
}

/// A rule with its match expressions compiled once, up front.
///
/// Expressions that fail to parse compile to a never-matching node, so a bad
/// expression can disable a rule but never abort analysis.
struct CompiledRule {
    rule: Rule,
    conditions: Vec<Expr>,
}

impl CompiledRule {
    fn compile(rule: Rule) -> Self {
        let conditions = rule
            .matches
            .iter()
            .map(|expression| {
                let parsed = Expr::parse(expression);
                if parsed.is_unknown() {
                    tracing::warn!(
                        rule = rule.name.as_deref().unwrap_or("<unnamed>"),
                        expression = expression.as_str(),
                        "unrecognized match expression; it will never match"
                    );
                }
                parsed
            })
            .collect();
        Self { rule, conditions }
    }

    /// The rule's match list is an OR: any single expression matching is
    /// sufficient.  An empty list never matches.
    fn matches(&self, cell: &Cell, cells: &[Cell]) -> bool {
        self.conditions
            .iter()
            .any(|condition| condition.evaluate(cell, cells))
    }

    fn name(&self) -> &str {
        self.rule.name.as_deref().unwrap_or("<unnamed>")
    }
}

struct CompiledCatalog {
    baseline: Vec<CompiledRule>,
    supplemental: Vec<CompiledRule>,
}

impl CompiledCatalog {
    fn compile(catalog: RuleCatalog) -> Self {
        let (baseline, supplemental) = catalog.into_parts();
        Self {
            baseline: baseline.into_iter().map(CompiledRule::compile).collect(),
            supplemental: supplemental
                .into_iter()
                .map(CompiledRule::compile)
                .collect(),
        }
    }
}

/// The threat analysis engine.
///
/// Construct with [`ThreatEngine::new`], then await [`initialize`] once
/// before analyzing.  The compiled catalog is immutable after
/// initialization; [`analyze`] is synchronous and side-effect free, so a
/// shared engine (e.g. behind an `Arc`) can serve analyses concurrently.
///
/// [`initialize`]: ThreatEngine::initialize
/// [`analyze`]: ThreatEngine::analyze
pub struct ThreatEngine {
    config: EngineConfig,
    catalog: OnceCell<CompiledCatalog>,
}

impl std::fmt::Debug for ThreatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreatEngine")
            .field("rules_dir", &self.config.rules_dir)
            .field("supplemental_enabled", &self.config.supplemental_enabled)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl ThreatEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            catalog: OnceCell::new(),
        }
    }

    /// Load and compile the rule catalog.
    ///
    /// At most one load executes even under concurrent first use; callers
    /// arriving while a load is in flight await the same attempt.  After the
    /// first success this is a no-op.  Fails only when the baseline rules
    /// directory cannot be created or read.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        self.catalog
            .get_or_try_init(|| async {
                let catalog = RuleCatalog::load(&self.config.rules_dir).await?;
                Ok::<_, CatalogError>(CompiledCatalog::compile(catalog))
            })
            .await?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.catalog.get().is_some()
    }

    pub fn supplemental_enabled(&self) -> bool {
        self.config.supplemental_enabled
    }

    /// Snapshot the catalog state.  Counts are zero before initialization.
    pub fn info(&self) -> EngineInfo {
        let (baseline_rules, supplemental_rules, initialized) = match self.catalog.get() {
            Some(catalog) => (catalog.baseline.len(), catalog.supplemental.len(), true),
            None => (0, 0, false),
        };
        let effective_rules = baseline_rules
            + if self.config.supplemental_enabled {
                supplemental_rules
            } else {
                0
            };
        EngineInfo {
            initialized,
            baseline_rules,
            supplemental_rules,
            supplemental_enabled: self.config.supplemental_enabled,
            effective_rules,
        }
    }

    /// Analyze a diagram, returning an analyzed deep copy.  The input diagram
    /// is never mutated.
    ///
    /// Per node: out-of-scope nodes are left untouched; otherwise previously
    /// generated findings are cleared and every baseline rule (then, when
    /// enabled, every supplemental rule) is evaluated in catalog order, each
    /// match appending a synthesized finding.  Re-analyzing an
    /// already-analyzed diagram therefore yields the same findings rather
    /// than duplicating them.
    pub fn analyze(&self, diagram: &Diagram) -> Result<Diagram, EngineError> {
        let catalog = self.catalog.get().ok_or(EngineError::NotInitialized)?;

        info!(
            title = diagram.title.as_deref().unwrap_or("Untitled"),
            nodes = diagram.nodes.len(),
            "analyzing diagram"
        );

        let mut analyzed = diagram.clone();
        for idx in 0..analyzed.nodes.len() {
            if analyzed.nodes[idx].out_of_scope {
                continue;
            }

            let fresh = {
                let cell = &analyzed.nodes[idx];
                let mut findings = apply_rules(&catalog.baseline, cell, &analyzed.nodes);
                if self.config.supplemental_enabled {
                    findings.extend(apply_rules(&catalog.supplemental, cell, &analyzed.nodes));
                }
                findings
            };

            let cell = &mut analyzed.nodes[idx];
            cell.findings.retain(|finding| !finding.synthetic);
            cell.findings.extend(fresh);
            cell.has_open_findings = !cell.findings.is_empty();
        }

        Ok(analyzed)
    }
}

fn apply_rules(rules: &[CompiledRule], cell: &Cell, cells: &[Cell]) -> Vec<Finding> {
    rules
        .iter()
        .filter(|compiled| compiled.matches(cell, cells))
        .map(|compiled| {
            debug!(rule = compiled.name(), cell = cell.id.as_str(), "rule matched");
            synthesize_finding(&compiled.rule, cell)
        })
        .collect()
}

/// Map a matched rule plus its subject node into a finding, defaulting each
/// template field independently.
fn synthesize_finding(rule: &Rule, cell: &Cell) -> Finding {
    let template = &rule.generates;
    Finding {
        id: finding_id(cell),
        title: template
            .title
            .clone()
            .unwrap_or_else(|| "Untitled Threat".to_string()),
        category: template
            .category
            .clone()
            .unwrap_or_else(|| "Undefined".to_string()),
        status: "Open".to_string(),
        severity: template
            .severity
            .clone()
            .unwrap_or_else(|| "Medium".to_string()),
        description: template.description.clone().unwrap_or_default(),
        mitigation: template.mitigation.clone().unwrap_or_default(),
        subject_type: cell
            .name
            .clone()
            .unwrap_or_else(|| cell.cell_type.to_string()),
        origin: rule
            .name
            .clone()
            .unwrap_or_else(|| "unnamed rule".to_string()),
        synthetic: true,
    }
}

/// Composite of the node id, a clock-derived component and a random
/// component.  Unique within an analysis pass; no cross-run stability.
fn finding_id(cell: &Cell) -> String {
    format!(
        "{}-{}-{}",
        cell.id,
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}
