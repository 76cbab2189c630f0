use serde::{Deserialize, Serialize};

/// A rule-set document as stored on disk: `{ "rules": [Rule, ...] }`.
///
/// Documents without a `rules` array are structurally invalid and are
/// rejected as a whole by the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

/// A declarative threat rule: one or more match expressions in the condition
/// language (OR semantics across the list) plus a template for the finding to
/// synthesize when the rule fires.
///
/// Every field tolerates absence so that a partially specified rule still
/// loads; a rule with an empty match list simply never fires.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rule {
    /// Human-readable rule name, recorded as the `origin` of generated
    /// findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Match expressions; the rule fires when any single expression matches.
    #[serde(default)]
    pub matches: Vec<String>,
    /// Template for the synthesized finding.
    #[serde(default)]
    pub generates: FindingTemplate,
}

/// The finding template carried by a rule.  Each field is defaulted
/// independently at synthesis time when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// STRIDE-style classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
}
