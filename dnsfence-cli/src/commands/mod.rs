//! Command handlers -- one module per subcommand group

use std::path::PathBuf;
use std::sync::Arc;

use dnsfence_core::config::DnsfenceConfig;
use dnsfence_orchestrator::{
    DockerRuntime, InstanceManager, InstanceManagerBuilder, OrchestratorConfig,
};

use crate::error::CliError;
use crate::state::JsonFileStore;

pub mod config;
pub mod instance;
pub mod routing;
pub mod sync;
pub mod tenant;

/// 상태 파일 경로 (`{data_dir}/state.json`)
pub(crate) fn state_path(config: &DnsfenceConfig) -> PathBuf {
    PathBuf::from(&config.general.data_dir).join("state.json")
}

/// 상태 저장소를 엽니다.
pub(crate) async fn open_store(config: &DnsfenceConfig) -> Result<Arc<JsonFileStore>, CliError> {
    Ok(Arc::new(JsonFileStore::open(state_path(config)).await?))
}

/// 런타임 드라이버와 저장소를 조립해 인스턴스 관리자를 만듭니다.
pub(crate) async fn build_manager(
    config: &DnsfenceConfig,
) -> Result<(InstanceManager<DockerRuntime, JsonFileStore>, Arc<JsonFileStore>), CliError> {
    let runtime = Arc::new(
        DockerRuntime::connect_with_socket(&config.runtime.docker_socket)
            .map_err(|e| CliError::RuntimeUnreachable(e.to_string()))?,
    );
    let store = open_store(config).await?;

    let manager = InstanceManagerBuilder::new()
        .runtime(runtime)
        .store(Arc::clone(&store))
        .config(OrchestratorConfig::from_core(config))
        .build()?;

    Ok((manager, store))
}
