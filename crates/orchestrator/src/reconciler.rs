//! 규칙 조정 — 선언 규칙 집합으로 라이브 규칙 집합을 수렴
//!
//! [`RuleReconciler`]는 테넌트의 선언 스냅샷과 인스턴스 내부에 커밋된
//! 라이브 집합의 차이를 계산하고, 제거/추가를 항목별 exec 호출로
//! 적용한 뒤 한 번의 reload로 마무리합니다.
//!
//! 배치는 최선 노력(best-effort)입니다. 한 항목의 실패가 나머지 항목을
//! 중단시키지 않으며, 모든 결과는 [`SyncOutcome`]으로 집계되어 에러가
//! 아닌 데이터로 반환됩니다.
//!
//! 엔진이 기록하는 모든 규칙은 고정 소유 태그([`OWNERSHIP_TAG`])를
//! 달고 커밋되며, 라이브 집합 조회도 그 태그로 한정됩니다. 엔진이
//! 만들지 않은 규칙은 조회되지 않으므로 제거 대상이 될 수 없습니다.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use dnsfence_core::types::{FilterRule, RuleKind};

use crate::error::OrchestratorError;
use crate::runtime::{ContainerRuntime, ExecCommand, ExecOutput};

/// 엔진이 소유한 규칙을 표시하는 고정 태그
pub const OWNERSHIP_TAG: &str = "dnsfence";

/// 인스턴스 내부 규칙 데이터베이스 경로
const GRAVITY_DB: &str = "/etc/pihole/gravity.db";

/// domainlist의 정확 일치 차단 타입
const DB_TYPE_EXACT: u8 = 1;
/// domainlist의 패턴 차단 타입
const DB_TYPE_PATTERN: u8 = 3;

/// 적용에 성공한 추가 항목
#[derive(Debug, Clone, Serialize)]
pub struct RuleChange {
    /// 도메인 또는 패턴 텍스트
    pub pattern: String,
    /// 규칙 종류
    pub kind: RuleKind,
}

/// 항목별 연산 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOp {
    /// 규칙 추가
    Add,
    /// 규칙 제거
    Remove,
    /// 라이브 집합 조회
    Read,
}

impl std::fmt::Display for RuleOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
            Self::Read => write!(f, "read"),
        }
    }
}

/// 실패한 항목과 그 사유
#[derive(Debug, Clone, Serialize)]
pub struct RuleFailure {
    /// 대상 패턴 (`*`는 종류 전체 조회 실패)
    pub pattern: String,
    /// 규칙 종류
    pub kind: RuleKind,
    /// 실패한 연산
    pub op: RuleOp,
    /// 에러 텍스트
    pub error: String,
}

/// 한 번의 조정 패스 결과
///
/// 호출자 관점의 성공 플래그는 `failed`가 비어있는지 여부입니다.
/// reload 실패는 항목 결과를 무효화하지 않으며 `reload_warning`으로만
/// 표시됩니다 (규칙은 변경되었지만 다음 reload까지 반영되지 않을 수
/// 있음).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    /// 적용에 성공한 추가 항목
    pub added: Vec<RuleChange>,
    /// 실패한 항목
    pub failed: Vec<RuleFailure>,
    /// 선언 집합 크기 (종류별 중복 제거 후)
    pub total: usize,
    /// reload 실패 시 경고 텍스트
    pub reload_warning: Option<String>,
}

impl SyncOutcome {
    /// 모든 항목이 적용되었는지 여부를 반환합니다.
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 규칙 조정기
///
/// 런타임 드라이버의 exec 능력만 사용하며, 컨테이너당 호출 순서는
/// 종류별로 제거 전부 → 추가 전부, 마지막에 reload 한 번입니다.
pub struct RuleReconciler<R: ContainerRuntime> {
    runtime: Arc<R>,
    exec_timeout: Duration,
}

impl<R: ContainerRuntime> RuleReconciler<R> {
    /// 새 조정기를 생성합니다.
    pub fn new(runtime: Arc<R>, exec_timeout: Duration) -> Self {
        Self {
            runtime,
            exec_timeout,
        }
    }

    /// 선언 스냅샷으로 컨테이너의 라이브 규칙 집합을 수렴시킵니다.
    ///
    /// `declared`는 이미 활성 규칙만 담은 불변 스냅샷이어야 합니다.
    /// 종류별로 독립 처리하며, 어느 종류든 라이브 집합 조회에 실패하면
    /// 그 종류의 diff는 건너뛰고 조회 실패를 하나의 항목으로
    /// 기록합니다 (기준을 모르는 채 제거하면 소유하지 않은 규칙을
    /// 건드릴 수 있음).
    pub async fn sync(&self, container: &str, declared: &[FilterRule]) -> SyncOutcome {
        let declared_exact: BTreeSet<String> = declared
            .iter()
            .filter(|rule| rule.kind == RuleKind::Exact)
            .map(|rule| rule.pattern.clone())
            .collect();
        let declared_pattern: BTreeSet<String> = declared
            .iter()
            .filter(|rule| rule.kind == RuleKind::Pattern)
            .map(|rule| rule.pattern.clone())
            .collect();

        let mut outcome = SyncOutcome {
            total: declared_exact.len() + declared_pattern.len(),
            ..Default::default()
        };

        self.sync_kind(container, RuleKind::Exact, &declared_exact, &mut outcome)
            .await;
        self.sync_kind(container, RuleKind::Pattern, &declared_pattern, &mut outcome)
            .await;

        // 양쪽 diff가 비어 있어도 reload는 항상 한 번 수행
        let reload = ExecCommand::new("pihole").arg("restartdns").arg("reload-lists");
        if let Some(error) = self.run_item(container, &reload).await {
            warn!(container, error = error.as_str(), "rule reload failed");
            outcome.reload_warning =
                Some(format!("rules updated but reload failed: {error}"));
        }

        info!(
            container,
            added = outcome.added.len(),
            failed = outcome.failed.len(),
            total = outcome.total,
            "rule sync completed"
        );
        outcome
    }

    /// 한 종류의 diff를 계산하고 적용합니다.
    async fn sync_kind(
        &self,
        container: &str,
        kind: RuleKind,
        declared: &BTreeSet<String>,
        outcome: &mut SyncOutcome,
    ) {
        let current = match self.read_current(container, kind).await {
            Ok(current) => current,
            Err(error) => {
                warn!(container, %kind, error = error.as_str(), "failed to read live rule set");
                outcome.failed.push(RuleFailure {
                    pattern: "*".to_owned(),
                    kind,
                    op: RuleOp::Read,
                    error,
                });
                return;
            }
        };

        let to_remove: Vec<&String> = current.difference(declared).collect();
        let to_add: Vec<&String> = declared.difference(&current).collect();
        debug!(
            container,
            %kind,
            remove = to_remove.len(),
            add = to_add.len(),
            "computed rule diff"
        );

        for pattern in to_remove {
            let command = remove_command(kind, pattern);
            if let Some(error) = self.run_item(container, &command).await {
                outcome.failed.push(RuleFailure {
                    pattern: pattern.clone(),
                    kind,
                    op: RuleOp::Remove,
                    error,
                });
            }
        }

        for pattern in to_add {
            let command = add_command(kind, pattern);
            match self.run_item(container, &command).await {
                None => outcome.added.push(RuleChange {
                    pattern: pattern.clone(),
                    kind,
                }),
                Some(error) => outcome.failed.push(RuleFailure {
                    pattern: pattern.clone(),
                    kind,
                    op: RuleOp::Add,
                    error,
                }),
            }
        }
    }

    /// 엔진 소유 태그가 달린 현재 커밋 집합을 읽습니다.
    async fn read_current(
        &self,
        container: &str,
        kind: RuleKind,
    ) -> Result<BTreeSet<String>, String> {
        let command = read_command(kind);
        let output = self
            .runtime
            .exec(container, &command, self.exec_timeout)
            .await
            .map_err(|e| e.to_string())?;
        if !output.success() {
            return Err(failure_text(&output));
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect())
    }

    /// 항목 하나를 실행하고, 실패 시 에러 텍스트를 반환합니다.
    async fn run_item(&self, container: &str, command: &ExecCommand) -> Option<String> {
        match self
            .runtime
            .exec(container, command, self.exec_timeout)
            .await
        {
            Ok(output) if output.success() => None,
            Ok(output) => Some(failure_text(&output)),
            Err(e) => Some(e.to_string()),
        }
    }
}

fn failure_text(output: &ExecOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        format!("exit code {}", output.exit_code)
    } else {
        stderr.to_owned()
    }
}

fn add_command(kind: RuleKind, pattern: &str) -> ExecCommand {
    match kind {
        RuleKind::Exact => ExecCommand::new("pihole")
            .arg("-b")
            .arg(pattern)
            .arg("--comment")
            .arg(OWNERSHIP_TAG),
        RuleKind::Pattern => ExecCommand::new("pihole")
            .arg("-regex")
            .arg(pattern)
            .arg("--comment")
            .arg(OWNERSHIP_TAG),
    }
}

fn remove_command(kind: RuleKind, pattern: &str) -> ExecCommand {
    match kind {
        RuleKind::Exact => ExecCommand::new("pihole").arg("-b").arg("-d").arg(pattern),
        RuleKind::Pattern => ExecCommand::new("pihole").arg("-regex").arg("-d").arg(pattern),
    }
}

fn read_command(kind: RuleKind) -> ExecCommand {
    let db_type = match kind {
        RuleKind::Exact => DB_TYPE_EXACT,
        RuleKind::Pattern => DB_TYPE_PATTERN,
    };
    ExecCommand::new("sqlite3").arg(GRAVITY_DB).arg(format!(
        "SELECT domain FROM domainlist WHERE type={db_type} AND comment='{OWNERSHIP_TAG}';"
    ))
}
