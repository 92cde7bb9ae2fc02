//! 오케스트레이터 설정
//!
//! [`OrchestratorConfig`]는 core의 [`DnsfenceConfig`](dnsfence_core::config::DnsfenceConfig)
//! 에서 엔진이 사용하는 섹션(runtime, addressing, routing)을 추려 만든
//! 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use dnsfence_core::config::DnsfenceConfig;
//! use dnsfence_orchestrator::config::OrchestratorConfig;
//!
//! let core_config = DnsfenceConfig::default();
//! let config = OrchestratorConfig::from_core(&core_config);
//! ```

use dnsfence_core::config::{DnsfenceConfig, RoutingConfig};
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// 설정 상한값 상수
const MAX_EXEC_TIMEOUT_SECS: u64 = 300;
const MAX_STOP_GRACE_SECS: u64 = 120;

/// 오케스트레이터 설정
///
/// core 설정의 runtime/addressing 섹션을 평탄화하고 routing 섹션을
/// 그대로 포함합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Docker 소켓 경로
    pub docker_socket: String,
    /// 인스턴스가 연결되는 공유 네트워크 이름
    pub network: String,
    /// 필터링 인스턴스 이미지
    pub image: String,
    /// 컨테이너 타임존
    pub timezone: String,
    /// 업스트림 DNS 리졸버 목록
    pub upstream_resolvers: Vec<String>,
    /// exec 호출 타임아웃 (초)
    pub exec_timeout_secs: u64,
    /// 정지 유예 시간 (초)
    pub stop_grace_secs: u64,
    /// 재시작 유예 시간 (초)
    pub restart_grace_secs: u64,
    /// 내부 서브넷 프리픽스 (세 옥텟)
    pub subnet_prefix: String,
    /// 내부 주소 할당 시작 옥텟
    pub ip_offset: u8,
    /// 관리 포트 할당 시작값
    pub admin_port_base: u16,
    /// 관리 포트 할당 상한값
    pub admin_port_ceiling: u16,
    /// 라우팅 설정 생성기 설정
    pub routing: RoutingConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_core(&DnsfenceConfig::default())
    }
}

impl OrchestratorConfig {
    /// core의 `DnsfenceConfig`에서 엔진 설정을 생성합니다.
    pub fn from_core(core: &DnsfenceConfig) -> Self {
        Self {
            docker_socket: core.runtime.docker_socket.clone(),
            network: core.runtime.network.clone(),
            image: core.runtime.image.clone(),
            timezone: core.runtime.timezone.clone(),
            upstream_resolvers: core.runtime.upstream_resolvers.clone(),
            exec_timeout_secs: core.runtime.exec_timeout_secs,
            stop_grace_secs: core.runtime.stop_grace_secs,
            restart_grace_secs: core.runtime.restart_grace_secs,
            subnet_prefix: core.addressing.subnet_prefix.clone(),
            ip_offset: core.addressing.ip_offset,
            admin_port_base: core.addressing.admin_port_base,
            admin_port_ceiling: core.addressing.admin_port_ceiling,
            routing: core.routing.clone(),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.exec_timeout_secs == 0 || self.exec_timeout_secs > MAX_EXEC_TIMEOUT_SECS {
            return Err(OrchestratorError::Config {
                field: "exec_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_EXEC_TIMEOUT_SECS}"),
            });
        }

        if self.stop_grace_secs == 0 || self.stop_grace_secs > MAX_STOP_GRACE_SECS {
            return Err(OrchestratorError::Config {
                field: "stop_grace_secs".to_owned(),
                reason: format!("must be 1-{MAX_STOP_GRACE_SECS}"),
            });
        }

        if self.restart_grace_secs == 0 || self.restart_grace_secs > MAX_STOP_GRACE_SECS {
            return Err(OrchestratorError::Config {
                field: "restart_grace_secs".to_owned(),
                reason: format!("must be 1-{MAX_STOP_GRACE_SECS}"),
            });
        }

        if self.ip_offset < 2 {
            return Err(OrchestratorError::Config {
                field: "ip_offset".to_owned(),
                reason: "must be 2-254".to_owned(),
            });
        }

        if self.admin_port_ceiling < self.admin_port_base {
            return Err(OrchestratorError::Config {
                field: "admin_port_ceiling".to_owned(),
                reason: "must be >= admin_port_base".to_owned(),
            });
        }

        if self.upstream_resolvers.is_empty() {
            return Err(OrchestratorError::Config {
                field: "upstream_resolvers".to_owned(),
                reason: "at least one upstream resolver is required".to_owned(),
            });
        }

        if self.network.is_empty() {
            return Err(OrchestratorError::Config {
                field: "network".to_owned(),
                reason: "network must not be empty".to_owned(),
            });
        }

        if self.image.is_empty() {
            return Err(OrchestratorError::Config {
                field: "image".to_owned(),
                reason: "image must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}

/// 오케스트레이터 설정 빌더
#[derive(Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    /// 기본값으로 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// Docker 소켓 경로를 설정합니다.
    pub fn docker_socket(mut self, socket: impl Into<String>) -> Self {
        self.config.docker_socket = socket.into();
        self
    }

    /// 공유 네트워크 이름을 설정합니다.
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.config.network = network.into();
        self
    }

    /// 필터링 인스턴스 이미지를 설정합니다.
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.config.image = image.into();
        self
    }

    /// 업스트림 리졸버 목록을 설정합니다.
    pub fn upstream_resolvers(mut self, resolvers: Vec<String>) -> Self {
        self.config.upstream_resolvers = resolvers;
        self
    }

    /// exec 타임아웃(초)을 설정합니다.
    pub fn exec_timeout_secs(mut self, secs: u64) -> Self {
        self.config.exec_timeout_secs = secs;
        self
    }

    /// 서브넷 프리픽스를 설정합니다.
    pub fn subnet_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.subnet_prefix = prefix.into();
        self
    }

    /// 내부 주소 시작 옥텟을 설정합니다.
    pub fn ip_offset(mut self, offset: u8) -> Self {
        self.config.ip_offset = offset;
        self
    }

    /// 관리 포트 범위를 설정합니다.
    pub fn admin_port_range(mut self, base: u16, ceiling: u16) -> Self {
        self.config.admin_port_base = base;
        self.config.admin_port_ceiling = ceiling;
        self
    }

    /// 설정을 검증하고 `OrchestratorConfig`를 생성합니다.
    pub fn build(self) -> Result<OrchestratorConfig, OrchestratorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
