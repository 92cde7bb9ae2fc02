//! 설정 관리 — dnsfence.toml 파싱 및 런타임 설정
//!
//! [`DnsfenceConfig`]는 모든 크레이트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DNSFENCE_RUNTIME_NETWORK=dnsfence-net` 형식)
//! 3. 설정 파일 (`dnsfence.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), dnsfence_core::error::DnsfenceError> {
//! use dnsfence_core::config::DnsfenceConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DnsfenceConfig::load("dnsfence.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DnsfenceConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::net::Ipv4Addr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DnsfenceError};

/// Dnsfence 통합 설정
///
/// `dnsfence.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 크레이트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsfenceConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 컨테이너 런타임 설정
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// 주소/포트 풀 설정
    #[serde(default)]
    pub addressing: AddressingConfig,
    /// 라우팅 설정 생성기 설정
    #[serde(default)]
    pub routing: RoutingConfig,
}

impl DnsfenceConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DnsfenceError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DnsfenceError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DnsfenceError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DnsfenceError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DnsfenceError> {
        toml::from_str(toml_str).map_err(|e| {
            DnsfenceError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DNSFENCE_{SECTION}_{FIELD}`
    /// 예: `DNSFENCE_RUNTIME_DOCKER_SOCKET=/run/docker.sock`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DNSFENCE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DNSFENCE_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "DNSFENCE_GENERAL_DATA_DIR");

        // Runtime
        override_string(
            &mut self.runtime.docker_socket,
            "DNSFENCE_RUNTIME_DOCKER_SOCKET",
        );
        override_string(&mut self.runtime.network, "DNSFENCE_RUNTIME_NETWORK");
        override_string(&mut self.runtime.image, "DNSFENCE_RUNTIME_IMAGE");
        override_string(&mut self.runtime.timezone, "DNSFENCE_RUNTIME_TIMEZONE");
        override_csv(
            &mut self.runtime.upstream_resolvers,
            "DNSFENCE_RUNTIME_UPSTREAM_RESOLVERS",
        );
        override_u64(
            &mut self.runtime.exec_timeout_secs,
            "DNSFENCE_RUNTIME_EXEC_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.runtime.stop_grace_secs,
            "DNSFENCE_RUNTIME_STOP_GRACE_SECS",
        );
        override_u64(
            &mut self.runtime.restart_grace_secs,
            "DNSFENCE_RUNTIME_RESTART_GRACE_SECS",
        );

        // Addressing
        override_string(
            &mut self.addressing.subnet_prefix,
            "DNSFENCE_ADDRESSING_SUBNET_PREFIX",
        );
        override_u8(&mut self.addressing.ip_offset, "DNSFENCE_ADDRESSING_IP_OFFSET");
        override_u16(
            &mut self.addressing.admin_port_base,
            "DNSFENCE_ADDRESSING_ADMIN_PORT_BASE",
        );
        override_u16(
            &mut self.addressing.admin_port_ceiling,
            "DNSFENCE_ADDRESSING_ADMIN_PORT_CEILING",
        );

        // Routing
        override_string(&mut self.routing.listen, "DNSFENCE_ROUTING_LISTEN");
        override_string(
            &mut self.routing.fallback_resolver,
            "DNSFENCE_ROUTING_FALLBACK_RESOLVER",
        );
        override_string(
            &mut self.routing.webserver_listen,
            "DNSFENCE_ROUTING_WEBSERVER_LISTEN",
        );
        override_u32(
            &mut self.routing.cache_max_entries,
            "DNSFENCE_ROUTING_CACHE_MAX_ENTRIES",
        );
        override_u32(
            &mut self.routing.cache_max_ttl_secs,
            "DNSFENCE_ROUTING_CACHE_MAX_TTL_SECS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DnsfenceError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // 서브넷 프리픽스는 dotted-quad 세 옥텟이어야 함
        let probe = format!("{}.1", self.addressing.subnet_prefix);
        if probe.parse::<Ipv4Addr>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "addressing.subnet_prefix".to_owned(),
                reason: "must be three dotted octets, e.g. '172.20.0'".to_owned(),
            }
            .into());
        }

        if self.addressing.ip_offset < 2 {
            return Err(ConfigError::InvalidValue {
                field: "addressing.ip_offset".to_owned(),
                reason: "must be 2-254 (.0 is the network, .1 the gateway)".to_owned(),
            }
            .into());
        }

        if self.addressing.admin_port_base < 1024 {
            return Err(ConfigError::InvalidValue {
                field: "addressing.admin_port_base".to_owned(),
                reason: "must be >= 1024".to_owned(),
            }
            .into());
        }

        if self.addressing.admin_port_ceiling < self.addressing.admin_port_base {
            return Err(ConfigError::InvalidValue {
                field: "addressing.admin_port_ceiling".to_owned(),
                reason: "must be >= admin_port_base".to_owned(),
            }
            .into());
        }

        if self.runtime.upstream_resolvers.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "runtime.upstream_resolvers".to_owned(),
                reason: "at least one upstream resolver is required".to_owned(),
            }
            .into());
        }

        if self.runtime.exec_timeout_secs == 0 || self.runtime.exec_timeout_secs > 300 {
            return Err(ConfigError::InvalidValue {
                field: "runtime.exec_timeout_secs".to_owned(),
                reason: "must be 1-300".to_owned(),
            }
            .into());
        }

        if self.runtime.image.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "runtime.image".to_owned(),
                reason: "image must not be empty".to_owned(),
            }
            .into());
        }

        if self.runtime.network.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "runtime.network".to_owned(),
                reason: "network must not be empty".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

// Default는 derive 매크로로 자동 생성 (각 필드가 Default를 구현하므로)

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/dnsfence".to_owned(),
        }
    }
}

/// 컨테이너 런타임 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
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
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            docker_socket: "/var/run/docker.sock".to_owned(),
            network: "dnsfence-net".to_owned(),
            image: "pihole/pihole:latest".to_owned(),
            timezone: "UTC".to_owned(),
            upstream_resolvers: vec!["1.1.1.1".to_owned(), "8.8.8.8".to_owned()],
            exec_timeout_secs: 30,
            stop_grace_secs: 10,
            restart_grace_secs: 10,
        }
    }
}

/// 주소/포트 풀 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressingConfig {
    /// 내부 서브넷 프리픽스 (세 옥텟, 예: "172.20.0")
    pub subnet_prefix: String,
    /// 내부 주소 할당 시작 옥텟
    pub ip_offset: u8,
    /// 관리 포트 할당 시작값
    pub admin_port_base: u16,
    /// 관리 포트 할당 상한값
    pub admin_port_ceiling: u16,
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            subnet_prefix: "172.20.0".to_owned(),
            ip_offset: 10,
            admin_port_base: 8100,
            admin_port_ceiling: 9999,
        }
    }
}

/// 라우팅 설정 생성기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// 라우터 수신 주소
    pub listen: String,
    /// 기본 풀 폴백 리졸버 (address:port)
    pub fallback_resolver: String,
    /// 라우터 웹 인터페이스 수신 주소
    pub webserver_listen: String,
    /// 풀별 패킷 캐시 최대 엔트리 수
    pub cache_max_entries: u32,
    /// 풀별 패킷 캐시 최대 TTL (초)
    pub cache_max_ttl_secs: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5353".to_owned(),
            fallback_resolver: "8.8.8.8:53".to_owned(),
            webserver_listen: "0.0.0.0:8053".to_owned(),
            cache_max_entries: 10_000,
            cache_max_ttl_secs: 86_400,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_u8(target: &mut u8, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u8>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u8 from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split(',').map(|s| s.trim().to_owned()).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = DnsfenceConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.runtime.network, "dnsfence-net");
        assert_eq!(config.addressing.subnet_prefix, "172.20.0");
        assert_eq!(config.addressing.ip_offset, 10);
        assert_eq!(config.routing.fallback_resolver, "8.8.8.8:53");
    }

    #[test]
    fn default_config_passes_validation() {
        let config = DnsfenceConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = DnsfenceConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.runtime.image, "pihole/pihole:latest");
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[runtime]
network = "edge-net"
"#;
        let config = DnsfenceConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        // log_format은 기본값 유지
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.runtime.network, "edge-net");
        assert_eq!(config.runtime.docker_socket, "/var/run/docker.sock");
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[general]
log_level = "warn"
log_format = "pretty"
data_dir = "/opt/dnsfence/data"

[runtime]
docker_socket = "/run/docker.sock"
network = "filters"
image = "pihole/pihole:2024.07"
timezone = "America/Sao_Paulo"
upstream_resolvers = ["9.9.9.9"]
exec_timeout_secs = 60
stop_grace_secs = 5
restart_grace_secs = 5

[addressing]
subnet_prefix = "10.30.0"
ip_offset = 20
admin_port_base = 9000
admin_port_ceiling = 9500

[routing]
listen = "0.0.0.0:53"
fallback_resolver = "1.1.1.1:53"
"#;
        let config = DnsfenceConfig::parse(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.runtime.timezone, "America/Sao_Paulo");
        assert_eq!(config.runtime.upstream_resolvers, vec!["9.9.9.9"]);
        assert_eq!(config.addressing.subnet_prefix, "10.30.0");
        assert_eq!(config.addressing.admin_port_base, 9000);
        assert_eq!(config.routing.listen, "0.0.0.0:53");
    }

    #[test]
    fn parse_invalid_toml_fails() {
        let result = DnsfenceConfig::parse("[general\nlog_level = ");
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_bad_log_level() {
        let mut config = DnsfenceConfig::default();
        config.general.log_level = "verbose".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_subnet_prefix() {
        let mut config = DnsfenceConfig::default();
        config.addressing.subnet_prefix = "172.20".to_owned();
        assert!(config.validate().is_err());

        config.addressing.subnet_prefix = "999.1.1".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_reserved_ip_offset() {
        let mut config = DnsfenceConfig::default();
        config.addressing.ip_offset = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_port_range() {
        let mut config = DnsfenceConfig::default();
        config.addressing.admin_port_base = 9000;
        config.addressing.admin_port_ceiling = 8000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_privileged_port_base() {
        let mut config = DnsfenceConfig::default();
        config.addressing.admin_port_base = 80;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_resolvers() {
        let mut config = DnsfenceConfig::default();
        config.runtime.upstream_resolvers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_exec_timeout() {
        let mut config = DnsfenceConfig::default();
        config.runtime.exec_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn from_file_missing_reports_file_not_found() {
        let result = DnsfenceConfig::from_file("/nonexistent/dnsfence.toml").await;
        match result {
            Err(DnsfenceError::Config(ConfigError::FileNotFound { path })) => {
                assert!(path.contains("dnsfence.toml"));
            }
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dnsfence.toml");
        tokio::fs::write(&path, "[general]\nlog_level = \"trace\"\n")
            .await
            .unwrap();

        let config = DnsfenceConfig::from_file(&path).await.unwrap();
        assert_eq!(config.general.log_level, "trace");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = DnsfenceConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let back = DnsfenceConfig::parse(&toml_str).unwrap();
        assert_eq!(back.runtime.network, config.runtime.network);
        assert_eq!(back.addressing.ip_offset, config.addressing.ip_offset);
    }
}
