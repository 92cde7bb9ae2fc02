//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 테넌트, 필터링 인스턴스, 차단 규칙 등 모든 크레이트가 공유하는
//! 데이터 구조를 정의합니다.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 모든 인스턴스가 수신하는 고정 DNS 포트
pub const DNS_PORT: u16 = 53;

/// 테넌트 식별자
///
/// CRUD 레이어가 발급하는 불투명한 문자열입니다. 컨테이너 이름과
/// 라우팅 풀 이름은 이 식별자의 순수 함수로 파생되어
/// 재파생이 항상 동일한 값을 돌려줍니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// 새 테넌트 식별자를 생성합니다.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 원본 문자열 참조를 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 이 테넌트의 컨테이너 이름을 파생합니다 (순수 함수).
    pub fn container_name(&self) -> String {
        format!("dnsfence-tenant-{}", self.0)
    }

    /// 이 테넌트의 라우팅 풀 이름을 파생합니다 (순수 함수).
    pub fn pool_name(&self) -> String {
        format!("tenant_{}", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// 차단 동작 모드
///
/// 필터링 인스턴스가 차단된 질의에 응답하는 방식입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// NXDOMAIN으로 응답
    #[default]
    NxDomain,
    /// 0.0.0.0 / :: 널 주소로 응답
    NullIp,
}

impl FilterMode {
    /// 필터링 컨테이너의 `BLOCKINGMODE` 환경변수 값을 반환합니다.
    pub fn blocking_mode_env(self) -> &'static str {
        match self {
            Self::NxDomain => "NXDOMAIN",
            Self::NullIp => "NULL",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NxDomain => write!(f, "nxdomain"),
            Self::NullIp => write!(f, "null_ip"),
        }
    }
}

/// 인스턴스 생애주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// 프로비저닝 진행 중
    Provisioning,
    /// 실행 중
    Running,
    /// 재시작 진행 중
    Restarting,
    /// 디프로비저닝 진행 중
    Deprovisioning,
    /// 전환 도중 실패
    Error,
}

impl InstanceStatus {
    /// 직렬화 형식과 동일한 상태 라벨을 반환합니다.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::Deprovisioning => "deprovisioning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 차단 규칙 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// 정확한 도메인 일치
    Exact,
    /// 패턴(정규식) 일치
    Pattern,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Pattern => write!(f, "pattern"),
        }
    }
}

/// 차단 규칙 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// 활성 — 수렴 대상
    Active,
    /// 비활성 — 수렴에서 제외
    Inactive,
}

/// 차단 규칙
///
/// CRUD 레이어가 소유하는 선언 상태입니다. 조정기는 `Active` 규칙만을
/// 종류별로 분할하여 하나의 불변 스냅샷으로 소비합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    /// 소유 테넌트
    pub tenant_id: TenantId,
    /// 도메인 또는 패턴 텍스트
    pub pattern: String,
    /// 규칙 종류
    pub kind: RuleKind,
    /// 규칙 상태
    pub status: RuleStatus,
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.pattern)
    }
}

/// 필터링 인스턴스 레코드
///
/// 생애주기 관리자가 소유하는 영속 레코드입니다. 테넌트당 최대 하나만
/// 존재하며, 살아있는 두 레코드가 내부 주소나 관리 포트를 공유하지
/// 않습니다. `admin_password`는 생성 이후 어떤 조회 연산으로도 노출되지
/// 않습니다 ([`InstanceDescriptor`]에는 해당 필드 자체가 없습니다).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// 레코드 식별자
    pub id: Uuid,
    /// 소유 테넌트
    pub tenant_id: TenantId,
    /// 컨테이너 이름 (테넌트 식별자의 순수 함수)
    pub container_name: String,
    /// 공유 네트워크 내부 주소
    pub internal_ip: Ipv4Addr,
    /// 클라이언트 트래픽 매칭용 공인 주소
    pub public_ip: IpAddr,
    /// DNS 수신 포트 (항상 [`DNS_PORT`])
    pub dns_port: u16,
    /// 호스트에 공개된 관리 포트
    pub admin_port: u16,
    /// 관리 콘솔 비밀번호 (쓰기 전용)
    pub admin_password: String,
    /// 차단 동작 모드
    pub mode: FilterMode,
    /// 생애주기 상태
    pub status: InstanceStatus,
    /// 생성 시각
    pub created_at: SystemTime,
}

/// 컨테이너 런타임이 보고하는 라이브 상태
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerState {
    /// 런타임 컨테이너 ID (있을 경우)
    pub id: Option<String>,
    /// 상태 라벨 (`running`, `exited`, `not_found`, `runtime_unavailable` 등)
    pub status: String,
    /// 헬스체크 상태 (있을 경우)
    pub health: Option<String>,
    /// 실행 중 여부
    pub running: bool,
}

impl ContainerState {
    /// 컨테이너가 존재하지 않을 때의 상태 (정상적인 결과이며 에러가 아님)
    pub fn not_found() -> Self {
        Self {
            id: None,
            status: "not_found".to_owned(),
            health: None,
            running: false,
        }
    }

    /// 런타임에 연결할 수 없을 때의 상태
    pub fn runtime_unavailable() -> Self {
        Self {
            id: None,
            status: "runtime_unavailable".to_owned(),
            health: None,
            running: false,
        }
    }
}

/// 인스턴스 공개 뷰
///
/// [`InstanceRecord`]에서 자격증명을 제거하고 라이브 상태를 덧붙인
/// 형태입니다. `list`/`status` 응답은 항상 이 타입으로 반환되므로
/// 비밀번호가 직렬화될 수 없습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    /// 레코드 식별자
    pub id: Uuid,
    /// 소유 테넌트
    pub tenant_id: TenantId,
    /// 컨테이너 이름
    pub container_name: String,
    /// 공유 네트워크 내부 주소
    pub internal_ip: Ipv4Addr,
    /// 공인 주소
    pub public_ip: IpAddr,
    /// DNS 수신 포트
    pub dns_port: u16,
    /// 관리 포트
    pub admin_port: u16,
    /// 관리 콘솔 URL
    pub admin_url: String,
    /// 차단 동작 모드
    pub mode: FilterMode,
    /// 라이브 상태 라벨
    pub status: String,
    /// 실행 중 여부
    pub running: bool,
    /// 생성 시각
    pub created_at: SystemTime,
}

impl InstanceDescriptor {
    /// 레코드와 라이브 상태로부터 공개 뷰를 만듭니다.
    pub fn from_record(record: &InstanceRecord, live: &ContainerState) -> Self {
        Self {
            id: record.id,
            tenant_id: record.tenant_id.clone(),
            container_name: record.container_name.clone(),
            internal_ip: record.internal_ip,
            public_ip: record.public_ip,
            dns_port: record.dns_port,
            admin_port: record.admin_port,
            admin_url: format!("http://localhost:{}/admin", record.admin_port),
            mode: record.mode,
            status: live.status.clone(),
            running: live.running,
            created_at: record.created_at,
        }
    }
}
