//! 에러 타입 — 도메인별 에러 정의

/// Dnsfence 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DnsfenceError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 인스턴스 오케스트레이션 에러
    #[error("instance error: {0}")]
    Instance(#[from] InstanceError),

    /// 스토어 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 인스턴스 오케스트레이션 에러
///
/// 오케스트레이터 크레이트의 도메인 에러가 상위 레이어로 전파될 때
/// 사용하는 공통 표현입니다.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    /// 테넌트 또는 인스턴스를 찾을 수 없음
    #[error("not found: {0}")]
    NotFound(String),

    /// 테넌트에 이미 인스턴스가 존재함
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// 주소/포트 풀 고갈
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// 컨테이너 런타임에 연결할 수 없음
    #[error("runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// 컨테이너 런타임 API 호출 실패
    #[error("runtime api error: {0}")]
    RuntimeApi(String),

    /// 프로비저닝 실패 (레코드 미기록, 재시도 가능)
    #[error("provision failed for tenant '{tenant}': {reason}")]
    ProvisionFailed { tenant: String, reason: String },

    /// 디프로비저닝 실패 (레코드 유지, 재시도 가능)
    #[error("deprovision failed for tenant '{tenant}': {reason}")]
    DeprovisionFailed { tenant: String, reason: String },

    /// 런타임 호출 타임아웃
    #[error("operation '{operation}' timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },
}

/// 스토어 에러
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 백엔드 접근 실패
    #[error("backend error: {0}")]
    Backend(String),

    /// 조회/변경 실패
    #[error("query failed: {0}")]
    Query(String),

    /// 직렬화/역직렬화 실패
    #[error("serialization failed: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_error_display_contains_context() {
        let err = InstanceError::ProvisionFailed {
            tenant: "acme".to_owned(),
            reason: "container create failed".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("acme"));
        assert!(msg.contains("container create failed"));
    }

    #[test]
    fn timeout_error_display() {
        let err = InstanceError::Timeout {
            operation: "exec".to_owned(),
            secs: 30,
        };
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn config_error_converts_to_top_level() {
        let err = ConfigError::InvalidValue {
            field: "addressing.ip_offset".to_owned(),
            reason: "must be 2-254".to_owned(),
        };
        let top: DnsfenceError = err.into();
        assert!(matches!(top, DnsfenceError::Config(_)));
        assert!(top.to_string().contains("addressing.ip_offset"));
    }

    #[test]
    fn store_error_converts_to_top_level() {
        let err = StoreError::Query("no such tenant".to_owned());
        let top: DnsfenceError = err.into();
        assert!(matches!(top, DnsfenceError::Store(_)));
    }

    #[test]
    fn io_error_converts_to_top_level() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let top: DnsfenceError = io.into();
        assert!(matches!(top, DnsfenceError::Io(_)));
    }
}
