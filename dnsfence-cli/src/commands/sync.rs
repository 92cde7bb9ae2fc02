//! Rule synchronisation subcommand

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use dnsfence_core::config::DnsfenceConfig;
use dnsfence_core::types::{FilterRule, RuleKind, RuleStatus, TenantId};
use dnsfence_orchestrator::SyncOutcome;

use crate::cli::SyncArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// 규칙 파일의 엔트리 형태
///
/// ```json
/// [{"pattern": "ads.example.com", "kind": "exact"},
///  {"pattern": "(^|\\.)track\\.", "kind": "pattern", "status": "inactive"}]
/// ```
#[derive(Debug, Deserialize)]
struct RuleEntry {
    pattern: String,
    kind: RuleKind,
    #[serde(default = "default_status")]
    status: RuleStatus,
}

fn default_status() -> RuleStatus {
    RuleStatus::Active
}

impl RuleEntry {
    fn into_rule(self, tenant: &TenantId) -> FilterRule {
        FilterRule {
            tenant_id: tenant.clone(),
            pattern: self.pattern,
            kind: self.kind,
            status: self.status,
        }
    }
}

async fn load_rules(path: &Path, tenant: &TenantId) -> Result<Vec<FilterRule>, CliError> {
    let content = tokio::fs::read_to_string(path).await?;
    let entries: Vec<RuleEntry> = serde_json::from_str(&content)?;
    Ok(entries
        .into_iter()
        .map(|entry| entry.into_rule(tenant))
        .collect())
}

/// `dnsfence sync`
pub async fn run(
    args: SyncArgs,
    config: &DnsfenceConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (manager, store) = super::build_manager(config).await?;
    let tenant = TenantId::new(args.tenant);

    let outcome = match &args.rules_file {
        Some(path) => {
            let declared = load_rules(path, &tenant).await?;
            manager.reconcile(&tenant, &declared).await?
        }
        None => manager.reconcile_from(&tenant, store.as_ref()).await?,
    };

    writer.render(&SyncOutput { tenant, outcome })
}

// ---- output payload ----

#[derive(Serialize)]
pub struct SyncOutput {
    pub tenant: TenantId,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

impl Render for SyncOutput {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "Sync for tenant '{}': {} declared, {} added, {} failed",
            self.tenant,
            self.outcome.total,
            self.outcome.added.len(),
            self.outcome.failed.len(),
        )?;
        for change in &self.outcome.added {
            writeln!(w, "  + [{}] {}", change.kind, change.pattern)?;
        }
        for failure in &self.outcome.failed {
            writeln!(
                w,
                "  ! [{}] {} ({}): {}",
                failure.kind, failure.pattern, failure.op, failure.error
            )?;
        }
        if let Some(warning) = &self.outcome.reload_warning {
            writeln!(w, "  warning: {warning}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_entry_defaults_to_active() {
        let entries: Vec<RuleEntry> =
            serde_json::from_str(r#"[{"pattern": "ads.example.com", "kind": "exact"}]"#).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, RuleStatus::Active);
    }

    #[test]
    fn rule_entry_parses_explicit_status() {
        let entries: Vec<RuleEntry> = serde_json::from_str(
            r#"[{"pattern": "x.com", "kind": "pattern", "status": "inactive"}]"#,
        )
        .unwrap();
        assert_eq!(entries[0].status, RuleStatus::Inactive);
        assert_eq!(entries[0].kind, RuleKind::Pattern);
    }

    #[test]
    fn rule_entry_binds_tenant() {
        let entry = RuleEntry {
            pattern: "ads.example.com".to_owned(),
            kind: RuleKind::Exact,
            status: RuleStatus::Active,
        };
        let rule = entry.into_rule(&TenantId::new("acme"));
        assert_eq!(rule.tenant_id.as_str(), "acme");
    }

    #[tokio::test]
    async fn load_rules_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        tokio::fs::write(
            &path,
            r#"[{"pattern": "a.com", "kind": "exact"},
               {"pattern": "b-pattern", "kind": "pattern"}]"#,
        )
        .await
        .unwrap();

        let rules = load_rules(&path, &TenantId::new("acme")).await.unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].pattern, "a.com");
        assert_eq!(rules[1].kind, RuleKind::Pattern);
    }

    #[tokio::test]
    async fn load_rules_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let result = load_rules(&path, &TenantId::new("acme")).await;
        assert!(result.is_err());
    }

    #[test]
    fn sync_output_renders_summary_and_items() {
        use dnsfence_orchestrator::{RuleChange, RuleFailure, RuleOp};

        let output = SyncOutput {
            tenant: TenantId::new("acme"),
            outcome: SyncOutcome {
                added: vec![RuleChange {
                    pattern: "a.com".to_owned(),
                    kind: RuleKind::Exact,
                }],
                failed: vec![RuleFailure {
                    pattern: "b.com".to_owned(),
                    kind: RuleKind::Exact,
                    op: RuleOp::Add,
                    error: "refused".to_owned(),
                }],
                total: 2,
                reload_warning: Some("rules updated but reload failed: x".to_owned()),
            },
        };

        let mut buffer = Vec::new();
        output.render_text(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("2 declared, 1 added, 1 failed"));
        assert!(text.contains("+ [exact] a.com"));
        assert!(text.contains("! [exact] b.com (add): refused"));
        assert!(text.contains("warning:"));
    }
}
