//! Best-effort rule loading from a rules directory.
//!
//! Two logical sources feed the catalog: every `*.json` document in the
//! directory except those with the reserved `supplemental` prefix forms the
//! baseline collection, and the single well-known [`SUPPLEMENTAL_FILE`]
//! forms the supplemental collection.  Baseline loading skips malformed
//! documents and keeps going; only a directory that cannot be created or
//! read is fatal.  The supplemental document is entirely optional.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::schema::{Rule, RuleSet};

/// Well-known file name of the supplemental rule-set document.
pub const SUPPLEMENTAL_FILE: &str = "supplemental.json";

/// File-name prefix reserved for supplemental documents; files carrying it
/// are excluded from the baseline scan.
const SUPPLEMENTAL_PREFIX: &str = "supplemental";

/// Errors that are fatal to catalog loading.
///
/// Only the baseline directory itself can fail loading; individual documents
/// and the supplemental source are recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to create rules directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read rules directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
enum DocumentError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("invalid rule-set document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The merged rule catalog: two ordered collections, loaded independently.
/// Insertion order is evaluation order.
#[derive(Debug, Default)]
pub struct RuleCatalog {
    baseline: Vec<Rule>,
    supplemental: Vec<Rule>,
}

impl RuleCatalog {
    /// Load the catalog from `rules_dir`, creating the directory if absent.
    pub async fn load(rules_dir: &Path) -> Result<Self, CatalogError> {
        let mut catalog = RuleCatalog::default();
        catalog.load_baseline(rules_dir).await?;
        catalog.load_supplemental(rules_dir).await;
        info!(
            baseline = catalog.baseline.len(),
            supplemental = catalog.supplemental.len(),
            "rule catalog loaded"
        );
        Ok(catalog)
    }

    pub fn baseline(&self) -> &[Rule] {
        &self.baseline
    }

    pub fn supplemental(&self) -> &[Rule] {
        &self.supplemental
    }

    /// Consume the catalog, yielding `(baseline, supplemental)`.
    pub fn into_parts(self) -> (Vec<Rule>, Vec<Rule>) {
        (self.baseline, self.supplemental)
    }

    async fn load_baseline(&mut self, rules_dir: &Path) -> Result<(), CatalogError> {
        if !rules_dir.exists() {
            warn!(path = %rules_dir.display(), "rules directory not found; creating it");
            tokio::fs::create_dir_all(rules_dir)
                .await
                .map_err(|source| CatalogError::CreateDir {
                    path: rules_dir.to_path_buf(),
                    source,
                })?;
        }

        let read_dir_err = |source| CatalogError::ReadDir {
            path: rules_dir.to_path_buf(),
            source,
        };

        let mut entries = tokio::fs::read_dir(rules_dir).await.map_err(read_dir_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_dir_err)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if file_name.starts_with(SUPPLEMENTAL_PREFIX) {
                continue;
            }
            files.push(path);
        }

        // Directory iteration order is platform-dependent; sort so that rule
        // evaluation order is stable across runs.
        files.sort();

        for path in files {
            match read_rule_set(&path).await {
                Ok(rule_set) => {
                    info!(
                        file = %path.display(),
                        count = rule_set.rules.len(),
                        "loaded baseline rules"
                    );
                    self.baseline.extend(rule_set.rules);
                }
                Err(err) => {
                    warn!(
                        file = %path.display(),
                        error = %err,
                        "skipping malformed baseline rule document"
                    );
                }
            }
        }

        Ok(())
    }

    async fn load_supplemental(&mut self, rules_dir: &Path) {
        let path = rules_dir.join(SUPPLEMENTAL_FILE);
        if !path.exists() {
            warn!(
                file = %path.display(),
                "supplemental rule document not found; supplemental detection unavailable"
            );
            return;
        }

        match read_rule_set(&path).await {
            Ok(rule_set) => {
                info!(
                    file = %path.display(),
                    count = rule_set.rules.len(),
                    "loaded supplemental rules"
                );
                self.supplemental = rule_set.rules;
            }
            Err(err) => {
                warn!(
                    file = %path.display(),
                    error = %err,
                    "supplemental rule document unusable; continuing with baseline only"
                );
            }
        }
    }
}

async fn read_rule_set(path: &Path) -> Result<RuleSet, DocumentError> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_doc(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    fn rule_doc(names: &[&str]) -> String {
        let rules: Vec<_> = names
            .iter()
            .map(|name| serde_json::json!({ "name": name, "matches": ["isActor"] }))
            .collect();
        serde_json::json!({ "rules": rules }).to_string()
    }

    #[tokio::test]
    async fn missing_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let rules_dir = dir.path().join("does-not-exist-yet");
        let catalog = RuleCatalog::load(&rules_dir).await.unwrap();
        assert!(rules_dir.is_dir());
        assert!(catalog.baseline().is_empty());
        assert!(catalog.supplemental().is_empty());
    }

    #[tokio::test]
    async fn malformed_document_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "a.json", &rule_doc(&["a-1", "a-2"]));
        write_doc(dir.path(), "b.json", "{ not json at all");
        write_doc(dir.path(), "c.json", &rule_doc(&["c-1"]));

        let catalog = RuleCatalog::load(dir.path()).await.unwrap();
        let names: Vec<_> = catalog
            .baseline()
            .iter()
            .map(|rule| rule.name.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["a-1", "a-2", "c-1"]);
    }

    #[tokio::test]
    async fn baseline_documents_load_in_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        // Written out of order on purpose.
        write_doc(dir.path(), "20-second.json", &rule_doc(&["second"]));
        write_doc(dir.path(), "10-first.json", &rule_doc(&["first"]));

        let catalog = RuleCatalog::load(dir.path()).await.unwrap();
        let names: Vec<_> = catalog
            .baseline()
            .iter()
            .map(|rule| rule.name.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn non_json_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "notes.txt", "not a rule document");
        write_doc(dir.path(), "a.json", &rule_doc(&["a-1"]));

        let catalog = RuleCatalog::load(dir.path()).await.unwrap();
        assert_eq!(catalog.baseline().len(), 1);
    }

    #[tokio::test]
    async fn supplemental_document_is_excluded_from_baseline() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "a.json", &rule_doc(&["base"]));
        write_doc(dir.path(), SUPPLEMENTAL_FILE, &rule_doc(&["extra"]));

        let catalog = RuleCatalog::load(dir.path()).await.unwrap();
        assert_eq!(catalog.baseline().len(), 1);
        assert_eq!(catalog.baseline()[0].name.as_deref(), Some("base"));
        assert_eq!(catalog.supplemental().len(), 1);
        assert_eq!(catalog.supplemental()[0].name.as_deref(), Some("extra"));
    }

    #[tokio::test]
    async fn missing_supplemental_document_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "a.json", &rule_doc(&["base"]));

        let catalog = RuleCatalog::load(dir.path()).await.unwrap();
        assert_eq!(catalog.baseline().len(), 1);
        assert!(catalog.supplemental().is_empty());
    }

    #[tokio::test]
    async fn invalid_supplemental_document_leaves_baseline_usable() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "a.json", &rule_doc(&["base"]));
        write_doc(dir.path(), SUPPLEMENTAL_FILE, r#"{ "no_rules_here": true }"#);

        let catalog = RuleCatalog::load(dir.path()).await.unwrap();
        assert_eq!(catalog.baseline().len(), 1);
        assert!(catalog.supplemental().is_empty());
    }

    #[tokio::test]
    async fn unreadable_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the directory should be: create_dir_all fails.
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "not a directory").unwrap();

        let err = RuleCatalog::load(&blocked).await.unwrap_err();
        assert!(matches!(err, CatalogError::ReadDir { .. }));
    }
}
