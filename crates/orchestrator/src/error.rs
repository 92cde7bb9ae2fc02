//! 오케스트레이터 에러 타입
//!
//! [`OrchestratorError`]는 오케스트레이션 엔진 내부에서 발생하는 모든
//! 에러를 표현합니다. `From<OrchestratorError> for DnsfenceError` 변환이
//! 구현되어 있어 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수
//! 있습니다.

use dnsfence_core::error::{ConfigError, DnsfenceError, InstanceError, StoreError};

/// 오케스트레이터 도메인 에러
///
/// 런타임 드라이버 호출, 자원 할당, 생애주기 전환, 설정 에러 등
/// 엔진 내부의 모든 에러 상황을 포괄합니다. 조정 과정의 개별 항목
/// 실패는 에러가 아니라 [`SyncOutcome`](crate::reconciler::SyncOutcome)
/// 데이터로 집계됩니다.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// 테넌트 레코드를 찾을 수 없음
    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    /// 테넌트의 인스턴스 레코드를 찾을 수 없음
    #[error("no instance found for tenant '{0}'")]
    InstanceNotFound(String),

    /// 컨테이너가 런타임에 존재하지 않음
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// 테넌트에 이미 살아있는 인스턴스가 존재함
    #[error("instance already exists for tenant '{0}'")]
    AlreadyProvisioned(String),

    /// 주소 또는 포트 풀 고갈
    #[error("resource exhausted: {resource}: {reason}")]
    ResourceExhausted {
        /// 고갈된 풀 이름
        resource: String,
        /// 고갈 상세
        reason: String,
    },

    /// 컨테이너 런타임에 연결할 수 없음
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// 컨테이너 런타임 API 호출 실패
    #[error("runtime api error: {0}")]
    RuntimeApi(String),

    /// 프로비저닝 실패 — 레코드는 기록되지 않았으며 재시도 가능
    #[error("provision failed for tenant '{tenant}': {reason}")]
    ProvisionFailed {
        /// 대상 테넌트
        tenant: String,
        /// 실패 사유
        reason: String,
    },

    /// 디프로비저닝 실패 — 레코드는 유지되며 재시도 가능
    #[error("deprovision failed for tenant '{tenant}': {reason}")]
    DeprovisionFailed {
        /// 대상 테넌트
        tenant: String,
        /// 실패 사유
        reason: String,
    },

    /// exec 호출이 데드라인을 초과함
    #[error("exec in container '{container}' timed out after {secs}s")]
    ExecTimeout {
        /// 대상 컨테이너
        container: String,
        /// 적용된 타임아웃 (초)
        secs: u64,
    },

    /// 디스패치 전 검증에서 거부된 exec 명령
    #[error("invalid exec command: {0}")]
    InvalidCommand(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 저장소 접근 실패
    #[error("store error: {0}")]
    Store(String),
}

impl From<OrchestratorError> for DnsfenceError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::TenantNotFound(id) => {
                DnsfenceError::Instance(InstanceError::NotFound(format!("tenant '{id}'")))
            }
            OrchestratorError::InstanceNotFound(id) => DnsfenceError::Instance(
                InstanceError::NotFound(format!("instance for tenant '{id}'")),
            ),
            OrchestratorError::ContainerNotFound(name) => {
                DnsfenceError::Instance(InstanceError::NotFound(format!("container '{name}'")))
            }
            OrchestratorError::AlreadyProvisioned(id) => {
                DnsfenceError::Instance(InstanceError::AlreadyExists(format!("tenant '{id}'")))
            }
            OrchestratorError::ResourceExhausted { resource, reason } => DnsfenceError::Instance(
                InstanceError::ResourceExhausted(format!("{resource}: {reason}")),
            ),
            OrchestratorError::RuntimeUnavailable(msg) => {
                DnsfenceError::Instance(InstanceError::RuntimeUnavailable(msg))
            }
            OrchestratorError::RuntimeApi(msg) | OrchestratorError::InvalidCommand(msg) => {
                DnsfenceError::Instance(InstanceError::RuntimeApi(msg))
            }
            OrchestratorError::ProvisionFailed { tenant, reason } => {
                DnsfenceError::Instance(InstanceError::ProvisionFailed { tenant, reason })
            }
            OrchestratorError::DeprovisionFailed { tenant, reason } => {
                DnsfenceError::Instance(InstanceError::DeprovisionFailed { tenant, reason })
            }
            OrchestratorError::ExecTimeout { container, secs } => {
                DnsfenceError::Instance(InstanceError::Timeout {
                    operation: format!("exec in '{container}'"),
                    secs,
                })
            }
            OrchestratorError::Config { field, reason } => {
                DnsfenceError::Config(ConfigError::InvalidValue { field, reason })
            }
            OrchestratorError::Store(msg) => DnsfenceError::Store(StoreError::Backend(msg)),
        }
    }
}

// 저장소 trait은 core 에러를 반환하므로 `?`로 엔진 에러에 합류시킵니다.
impl From<DnsfenceError> for OrchestratorError {
    fn from(err: DnsfenceError) -> Self {
        Self::Store(err.to_string())
    }
}
