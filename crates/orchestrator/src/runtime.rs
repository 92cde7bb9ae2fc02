//! Container runtime abstraction for testability.
//!
//! The [`ContainerRuntime`] trait abstracts the bollard Docker API, allowing
//! production code to use [`DockerRuntime`] while tests use `MockRuntime`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   ┌────────────────┐
//! │ InstanceManager │   │ RuleReconciler │
//! └────────┬────────┘   └───────┬────────┘
//!          │                    │
//!          ▼                    ▼
//!        ┌──────────────────────┐
//!        │   ContainerRuntime   │ (trait)
//!        └──────────────────────┘
//!              │           │
//!              ▼           ▼
//!        ┌─────────┐  ┌──────┐
//!        │ Docker  │  │ Mock │
//!        └────┬────┘  └──────┘
//!             │
//!             ▼
//!        Docker Daemon
//! ```
//!
//! # Command Construction
//!
//! In-container commands are built as a typed argument vector
//! ([`ExecCommand`]) and validated before dispatch: no empty argv, no
//! empty program name, no control characters in any argument. Nothing is
//! ever passed through a shell.
//!
//! # Container Name Validation
//!
//! All methods that accept container names validate them before making
//! API calls: 1-128 characters, leading alphanumeric, then alphanumerics
//! plus `_`, `.`, `-`.

use std::collections::HashMap;
use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use dnsfence_core::types::ContainerState;

use crate::error::OrchestratorError;

/// Validates a container name before it reaches the runtime API.
///
/// Docker accepts `[a-zA-Z0-9][a-zA-Z0-9_.-]*`; anything else is rejected
/// here so a malformed tenant identifier cannot turn into a malformed API
/// call.
pub fn validate_container_name(name: &str) -> Result<(), OrchestratorError> {
    if name.is_empty() || name.len() > 128 {
        return Err(OrchestratorError::RuntimeApi(format!(
            "invalid container name: length {} (must be 1-128)",
            name.len()
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or(' ');
    if !first.is_ascii_alphanumeric() {
        return Err(OrchestratorError::RuntimeApi(
            "invalid container name: must start with an alphanumeric character".to_owned(),
        ));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return Err(OrchestratorError::RuntimeApi(
            "invalid container name: contains characters outside [a-zA-Z0-9_.-]".to_owned(),
        ));
    }
    Ok(())
}

/// A typed in-container command.
///
/// Replaces string-shelled command construction: arguments are kept as a
/// vector end to end, and [`validate`](Self::validate) runs before every
/// dispatch so argument-injection is structurally impossible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCommand {
    argv: Vec<String>,
}

impl ExecCommand {
    /// Creates a command for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            argv: vec![program.into()],
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    /// Returns the full argument vector (program first).
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Validates the command before dispatch.
    ///
    /// Rejects an empty program name and control characters (including
    /// newlines and NUL) in any argument.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        let program = self
            .argv
            .first()
            .ok_or_else(|| OrchestratorError::InvalidCommand("empty argv".to_owned()))?;
        if program.is_empty() {
            return Err(OrchestratorError::InvalidCommand(
                "empty program name".to_owned(),
            ));
        }
        for arg in &self.argv {
            if arg.chars().any(|c| c.is_control()) {
                return Err(OrchestratorError::InvalidCommand(format!(
                    "control character in argument {arg:?}"
                )));
            }
        }
        Ok(())
    }

    /// Single-line rendering for log output.
    pub fn display_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Result of one in-container command.
///
/// Every exec call resolves to this single shape (exit code + captured
/// output) so callers aggregate successes and failures uniformly.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    /// Process exit code (-1 when the runtime did not report one)
    pub exit_code: i64,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ExecOutput {
    /// True iff the command exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A named volume mounted into an instance container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    /// Named volume on the host side
    pub source: String,
    /// Mount path inside the container
    pub target: String,
}

/// A container port published on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPublication {
    /// TCP port inside the container
    pub container_port: u16,
    /// Host port it is published on
    pub host_port: u16,
}

/// Everything needed to create one filtering instance container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Container name (also used as hostname)
    pub name: String,
    /// Image reference
    pub image: String,
    /// Environment variables as key/value pairs
    pub env: Vec<(String, String)>,
    /// Named volumes to mount (survive container recreation)
    pub volumes: Vec<VolumeMount>,
    /// Ports published on the host
    pub published_ports: Vec<PortPublication>,
    /// In-container DNS servers
    pub dns: Vec<String>,
    /// Added Linux capabilities
    pub cap_add: Vec<String>,
    /// Apply an `unless-stopped` restart policy
    pub restart_unless_stopped: bool,
}

/// Trait abstracting container runtime operations.
///
/// All runtime calls go through this trait, enabling testability via
/// mocking. The trait is `Send + Sync + 'static`, allowing safe sharing
/// across async contexts.
///
/// # Implementations
///
/// - [`DockerRuntime`]: Production implementation using the `bollard` library
/// - `MockRuntime`: Test implementation with configurable responses (available in tests only)
///
/// # Error Handling
///
/// - **404 errors**: Converted to `OrchestratorError::ContainerNotFound`
/// - **Connection errors**: Wrapped as `OrchestratorError::RuntimeUnavailable`
/// - **Other API failures**: Wrapped as `OrchestratorError::RuntimeApi`
/// - **Exec deadline**: `OrchestratorError::ExecTimeout`, distinct from
///   explicit failure so callers can decide on retry
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Checks runtime daemon connectivity.
    fn ping(&self) -> impl Future<Output = Result<(), OrchestratorError>> + Send;

    /// Creates and starts a container from the given spec.
    ///
    /// Returns the runtime-assigned container id.
    fn create_container(
        &self,
        spec: &ContainerSpec,
    ) -> impl Future<Output = Result<String, OrchestratorError>> + Send;

    /// Stops a container with the given grace period.
    fn stop_container(
        &self,
        name: &str,
        grace: Duration,
    ) -> impl Future<Output = Result<(), OrchestratorError>> + Send;

    /// Removes a container, optionally together with its named volumes.
    fn remove_container(
        &self,
        name: &str,
        remove_volumes: bool,
    ) -> impl Future<Output = Result<(), OrchestratorError>> + Send;

    /// Restarts a container with the given grace period.
    fn restart_container(
        &self,
        name: &str,
        grace: Duration,
    ) -> impl Future<Output = Result<(), OrchestratorError>> + Send;

    /// Inspects a container's live state.
    ///
    /// # Errors
    ///
    /// - `OrchestratorError::ContainerNotFound`: container does not exist (404)
    /// - `OrchestratorError::RuntimeApi`: invalid name or other API errors
    fn inspect_container(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<ContainerState, OrchestratorError>> + Send;

    /// Attaches a container to a network at a fixed IPv4 address.
    fn connect_network(
        &self,
        name: &str,
        network: &str,
        ipv4: Ipv4Addr,
    ) -> impl Future<Output = Result<(), OrchestratorError>> + Send;

    /// Runs a command inside a container with a bounded deadline.
    ///
    /// Captures stdout/stderr and the exit code into one [`ExecOutput`].
    /// A deadline overrun yields `OrchestratorError::ExecTimeout`.
    fn exec(
        &self,
        name: &str,
        command: &ExecCommand,
        timeout: Duration,
    ) -> impl Future<Output = Result<ExecOutput, OrchestratorError>> + Send;
}

/// Production runtime implementation using `bollard`.
///
/// Communicates with the Docker daemon via a Unix socket or TCP
/// connection. Internally uses `Arc<bollard::Docker>` for safe sharing
/// across async tasks.
pub struct DockerRuntime {
    docker: Arc<bollard::Docker>,
}

impl DockerRuntime {
    /// Connects to Docker using the default local socket.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::RuntimeUnavailable` if the connection
    /// fails (socket not found, permission denied, daemon not running).
    pub fn connect_local() -> Result<Self, OrchestratorError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            OrchestratorError::RuntimeUnavailable(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to Docker using a specific socket path.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, OrchestratorError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    OrchestratorError::RuntimeUnavailable(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    fn map_api_error(context: &str, name: &str, e: &bollard::errors::Error) -> OrchestratorError {
        let text = e.to_string();
        if text.contains("404") {
            OrchestratorError::ContainerNotFound(name.to_owned())
        } else {
            OrchestratorError::RuntimeApi(format!("{context} '{name}' failed: {text}"))
        }
    }
}

impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<(), OrchestratorError> {
        self.docker.ping().await.map_err(|e| {
            OrchestratorError::RuntimeUnavailable(format!("ping failed: {e}"))
        })?;
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, OrchestratorError> {
        use bollard::container::{Config, CreateContainerOptions, StartContainerOptions};
        use bollard::models::{HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum};

        validate_container_name(&spec.name)?;

        let mut exposed_ports = HashMap::new();
        let mut port_bindings = HashMap::new();
        for publication in &spec.published_ports {
            let key = format!("{}/tcp", publication.container_port);
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(publication.host_port.to_string()),
                }]),
            );
        }

        let binds: Vec<String> = spec
            .volumes
            .iter()
            .map(|mount| format!("{}:{}", mount.source, mount.target))
            .collect();

        let host_config = HostConfig {
            binds: (!binds.is_empty()).then_some(binds),
            port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
            dns: (!spec.dns.is_empty()).then_some(spec.dns.clone()),
            cap_add: (!spec.cap_add.is_empty()).then_some(spec.cap_add.clone()),
            restart_policy: spec.restart_unless_stopped.then_some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
                maximum_retry_count: None,
            }),
            ..Default::default()
        };

        let env: Vec<String> = spec
            .env
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();

        let config = Config {
            image: Some(spec.image.clone()),
            hostname: Some(spec.name.clone()),
            env: Some(env),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: spec.name.clone(),
                    platform: None,
                }),
                config,
            )
            .await
            .map_err(|e| {
                OrchestratorError::RuntimeApi(format!(
                    "create container '{}' failed: {e}",
                    spec.name
                ))
            })?;

        self.docker
            .start_container(&spec.name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Self::map_api_error("start container", &spec.name, &e))?;

        Ok(created.id)
    }

    async fn stop_container(&self, name: &str, grace: Duration) -> Result<(), OrchestratorError> {
        use bollard::container::StopContainerOptions;

        validate_container_name(name)?;

        let grace_secs = i64::try_from(grace.as_secs()).unwrap_or(i64::MAX);
        match self
            .docker
            .stop_container(name, Some(StopContainerOptions { t: grace_secs }))
            .await
        {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(e) if e.to_string().contains("304") => Ok(()),
            Err(e) => Err(Self::map_api_error("stop container", name, &e)),
        }
    }

    async fn remove_container(
        &self,
        name: &str,
        remove_volumes: bool,
    ) -> Result<(), OrchestratorError> {
        use bollard::container::RemoveContainerOptions;

        validate_container_name(name)?;

        self.docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    v: remove_volumes,
                    force: false,
                    link: false,
                }),
            )
            .await
            .map_err(|e| Self::map_api_error("remove container", name, &e))
    }

    async fn restart_container(
        &self,
        name: &str,
        grace: Duration,
    ) -> Result<(), OrchestratorError> {
        use bollard::container::RestartContainerOptions;

        validate_container_name(name)?;

        let grace_secs = isize::try_from(grace.as_secs()).unwrap_or(isize::MAX);
        self.docker
            .restart_container(name, Some(RestartContainerOptions { t: grace_secs }))
            .await
            .map_err(|e| Self::map_api_error("restart container", name, &e))
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerState, OrchestratorError> {
        validate_container_name(name)?;

        let details = self
            .docker
            .inspect_container(name, None)
            .await
            .map_err(|e| Self::map_api_error("inspect container", name, &e))?;

        let id = details.id;
        let state = details.state.unwrap_or_default();
        let status = state
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_owned());
        let running = state.running.unwrap_or(false);
        let health = state
            .health
            .and_then(|h| h.status)
            .map(|h| h.to_string());

        Ok(ContainerState {
            id,
            status,
            health,
            running,
        })
    }

    async fn connect_network(
        &self,
        name: &str,
        network: &str,
        ipv4: Ipv4Addr,
    ) -> Result<(), OrchestratorError> {
        use bollard::models::{EndpointIpamConfig, EndpointSettings};
        use bollard::network::ConnectNetworkOptions;

        validate_container_name(name)?;

        let options = ConnectNetworkOptions {
            container: name.to_owned(),
            endpoint_config: EndpointSettings {
                ipam_config: Some(EndpointIpamConfig {
                    ipv4_address: Some(ipv4.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        };

        self.docker
            .connect_network(network, options)
            .await
            .map_err(|e| {
                OrchestratorError::RuntimeApi(format!(
                    "connect container '{name}' to network '{network}' failed: {e}"
                ))
            })
    }

    async fn exec(
        &self,
        name: &str,
        command: &ExecCommand,
        timeout: Duration,
    ) -> Result<ExecOutput, OrchestratorError> {
        use bollard::container::LogOutput;
        use bollard::exec::{CreateExecOptions, StartExecResults};

        validate_container_name(name)?;
        command.validate()?;

        let run = async {
            let exec = self
                .docker
                .create_exec(
                    name,
                    CreateExecOptions {
                        cmd: Some(command.argv().to_vec()),
                        attach_stdout: Some(true),
                        attach_stderr: Some(true),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| Self::map_api_error("create exec in", name, &e))?;

            let mut stdout = String::new();
            let mut stderr = String::new();
            match self
                .docker
                .start_exec(&exec.id, None)
                .await
                .map_err(|e| Self::map_api_error("start exec in", name, &e))?
            {
                StartExecResults::Attached { mut output, .. } => {
                    while let Some(chunk) = output.next().await {
                        match chunk {
                            Ok(LogOutput::StdOut { message }) => {
                                stdout.push_str(&String::from_utf8_lossy(&message));
                            }
                            Ok(LogOutput::StdErr { message }) => {
                                stderr.push_str(&String::from_utf8_lossy(&message));
                            }
                            Ok(_) => {}
                            Err(e) => {
                                return Err(OrchestratorError::RuntimeApi(format!(
                                    "exec output stream in '{name}' failed: {e}"
                                )));
                            }
                        }
                    }
                }
                StartExecResults::Detached => {}
            }

            let inspected = self
                .docker
                .inspect_exec(&exec.id)
                .await
                .map_err(|e| Self::map_api_error("inspect exec in", name, &e))?;

            Ok(ExecOutput {
                exit_code: inspected.exit_code.unwrap_or(-1),
                stdout,
                stderr,
            })
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_elapsed) => Err(OrchestratorError::ExecTimeout {
                container: name.to_owned(),
                secs: timeout.as_secs(),
            }),
        }
    }
}

/// 테스트용 Mock 런타임
///
/// 설정 가능한 응답을 반환하여 Docker 없이도 테스트할 수 있습니다.
/// exec 응답은 argv 문자열에 대한 부분 일치로 스크립팅합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockRuntime {
    containers: std::sync::Mutex<HashMap<String, ContainerState>>,
    specs: std::sync::Mutex<Vec<ContainerSpec>>,
    network_attachments: std::sync::Mutex<Vec<(String, String, Ipv4Addr)>>,
    exec_log: std::sync::Mutex<Vec<(String, Vec<String>)>>,
    exec_scripts: std::sync::Mutex<Vec<(String, ExecOutput)>>,
    fail_ping: bool,
    fail_create: bool,
    fail_stop: bool,
    fail_remove: bool,
}

#[cfg(test)]
impl MockRuntime {
    /// 빈 mock 런타임을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 실행 중 상태의 컨테이너를 등록합니다.
    pub fn with_running_container(self, name: &str) -> Self {
        self.containers.lock().unwrap().insert(
            name.to_owned(),
            ContainerState {
                id: Some(format!("mock-{name}")),
                status: "running".to_owned(),
                health: Some("healthy".to_owned()),
                running: true,
            },
        );
        self
    }

    /// ping이 실패하도록 설정합니다.
    pub fn with_failing_ping(mut self) -> Self {
        self.fail_ping = true;
        self
    }

    /// create_container가 실패하도록 설정합니다.
    pub fn with_failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// stop_container가 실패하도록 설정합니다.
    pub fn with_failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// remove_container가 실패하도록 설정합니다.
    pub fn with_failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    /// argv에 `needle`이 포함된 exec 호출의 응답을 등록합니다.
    ///
    /// 등록 순서대로 첫 일치가 적용되며, 일치가 없으면 성공(빈 출력)을
    /// 반환합니다.
    pub fn with_exec_script(self, needle: &str, output: ExecOutput) -> Self {
        self.exec_scripts
            .lock()
            .unwrap()
            .push((needle.to_owned(), output));
        self
    }

    /// 기록된 exec 호출 목록을 반환합니다.
    pub fn exec_calls(&self) -> Vec<(String, Vec<String>)> {
        self.exec_log.lock().unwrap().clone()
    }

    /// create_container에 전달된 spec 목록을 반환합니다.
    pub fn created_specs(&self) -> Vec<ContainerSpec> {
        self.specs.lock().unwrap().clone()
    }

    /// 기록된 네트워크 연결 목록을 반환합니다.
    pub fn network_attachments(&self) -> Vec<(String, String, Ipv4Addr)> {
        self.network_attachments.lock().unwrap().clone()
    }

    /// 컨테이너 존재 여부를 반환합니다.
    pub fn has_container(&self, name: &str) -> bool {
        self.containers.lock().unwrap().contains_key(name)
    }
}

#[cfg(test)]
impl ContainerRuntime for MockRuntime {
    async fn ping(&self) -> Result<(), OrchestratorError> {
        if self.fail_ping {
            return Err(OrchestratorError::RuntimeUnavailable(
                "mock ping failure".to_owned(),
            ));
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, OrchestratorError> {
        validate_container_name(&spec.name)?;
        if self.fail_create {
            return Err(OrchestratorError::RuntimeApi(
                "mock create failure".to_owned(),
            ));
        }
        let mut containers = self.containers.lock().unwrap();
        if containers.contains_key(&spec.name) {
            return Err(OrchestratorError::RuntimeApi(format!(
                "create container '{}' failed: 409 name conflict",
                spec.name
            )));
        }
        containers.insert(
            spec.name.clone(),
            ContainerState {
                id: Some(format!("mock-{}", spec.name)),
                status: "running".to_owned(),
                health: Some("healthy".to_owned()),
                running: true,
            },
        );
        self.specs.lock().unwrap().push(spec.clone());
        Ok(format!("mock-{}", spec.name))
    }

    async fn stop_container(&self, name: &str, _grace: Duration) -> Result<(), OrchestratorError> {
        validate_container_name(name)?;
        if self.fail_stop {
            return Err(OrchestratorError::RuntimeApi("mock stop failure".to_owned()));
        }
        let mut containers = self.containers.lock().unwrap();
        match containers.get_mut(name) {
            Some(state) => {
                state.status = "exited".to_owned();
                state.running = false;
                Ok(())
            }
            None => Err(OrchestratorError::ContainerNotFound(name.to_owned())),
        }
    }

    async fn remove_container(
        &self,
        name: &str,
        _remove_volumes: bool,
    ) -> Result<(), OrchestratorError> {
        validate_container_name(name)?;
        if self.fail_remove {
            return Err(OrchestratorError::RuntimeApi(
                "mock remove failure".to_owned(),
            ));
        }
        let mut containers = self.containers.lock().unwrap();
        if containers.remove(name).is_none() {
            return Err(OrchestratorError::ContainerNotFound(name.to_owned()));
        }
        Ok(())
    }

    async fn restart_container(
        &self,
        name: &str,
        _grace: Duration,
    ) -> Result<(), OrchestratorError> {
        validate_container_name(name)?;
        let mut containers = self.containers.lock().unwrap();
        match containers.get_mut(name) {
            Some(state) => {
                state.status = "running".to_owned();
                state.running = true;
                Ok(())
            }
            None => Err(OrchestratorError::ContainerNotFound(name.to_owned())),
        }
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerState, OrchestratorError> {
        validate_container_name(name)?;
        self.containers
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| OrchestratorError::ContainerNotFound(name.to_owned()))
    }

    async fn connect_network(
        &self,
        name: &str,
        network: &str,
        ipv4: Ipv4Addr,
    ) -> Result<(), OrchestratorError> {
        validate_container_name(name)?;
        if !self.has_container(name) {
            return Err(OrchestratorError::ContainerNotFound(name.to_owned()));
        }
        self.network_attachments
            .lock()
            .unwrap()
            .push((name.to_owned(), network.to_owned(), ipv4));
        Ok(())
    }

    async fn exec(
        &self,
        name: &str,
        command: &ExecCommand,
        _timeout: Duration,
    ) -> Result<ExecOutput, OrchestratorError> {
        validate_container_name(name)?;
        command.validate()?;
        if !self.has_container(name) {
            return Err(OrchestratorError::ContainerNotFound(name.to_owned()));
        }
        self.exec_log
            .lock()
            .unwrap()
            .push((name.to_owned(), command.argv().to_vec()));

        let line = command.display_line();
        let scripts = self.exec_scripts.lock().unwrap();
        for (needle, output) in scripts.iter() {
            if line.contains(needle.as_str()) {
                return Ok(output.clone());
            }
        }
        Ok(ExecOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec(name: &str) -> ContainerSpec {
        ContainerSpec {
            name: name.to_owned(),
            image: "pihole/pihole:latest".to_owned(),
            env: vec![("TZ".to_owned(), "UTC".to_owned())],
            volumes: vec![VolumeMount {
                source: format!("{name}_etc"),
                target: "/etc/pihole".to_owned(),
            }],
            published_ports: vec![PortPublication {
                container_port: 80,
                host_port: 8100,
            }],
            dns: vec!["127.0.0.1".to_owned()],
            cap_add: vec!["NET_ADMIN".to_owned()],
            restart_unless_stopped: true,
        }
    }

    #[test]
    fn container_name_accepts_valid_names() {
        validate_container_name("dnsfence-tenant-acme").unwrap();
        validate_container_name("a").unwrap();
        validate_container_name("web_1.test").unwrap();
    }

    #[test]
    fn container_name_rejects_empty() {
        assert!(validate_container_name("").is_err());
    }

    #[test]
    fn container_name_rejects_leading_separator() {
        assert!(validate_container_name("-leading").is_err());
        assert!(validate_container_name(".hidden").is_err());
    }

    #[test]
    fn container_name_rejects_shell_metacharacters() {
        assert!(validate_container_name("name;rm").is_err());
        assert!(validate_container_name("name a").is_err());
        assert!(validate_container_name("name$(x)").is_err());
    }

    #[test]
    fn container_name_rejects_overlong() {
        let name = "a".repeat(129);
        assert!(validate_container_name(&name).is_err());
    }

    #[test]
    fn exec_command_builds_argv_in_order() {
        let cmd = ExecCommand::new("pihole").arg("-b").arg("ads.example.com");
        assert_eq!(cmd.argv(), ["pihole", "-b", "ads.example.com"]);
        assert_eq!(cmd.display_line(), "pihole -b ads.example.com");
    }

    #[test]
    fn exec_command_validates_clean_args() {
        let cmd = ExecCommand::new("pihole")
            .arg("-regex")
            .arg(r"(^|\.)doubleclick\.net$");
        cmd.validate().unwrap();
    }

    #[test]
    fn exec_command_rejects_empty_program() {
        assert!(ExecCommand::new("").validate().is_err());
    }

    #[test]
    fn exec_command_rejects_control_characters() {
        let cmd = ExecCommand::new("pihole").arg("bad\ndomain");
        assert!(cmd.validate().is_err());

        let cmd = ExecCommand::new("pihole").arg("bad\0domain");
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn exec_output_success_follows_exit_code() {
        assert!(ExecOutput::default().success());
        let failed = ExecOutput {
            exit_code: 1,
            ..Default::default()
        };
        assert!(!failed.success());
    }

    #[tokio::test]
    async fn mock_create_then_inspect() {
        let runtime = MockRuntime::new();
        runtime.create_container(&sample_spec("web-1")).await.unwrap();

        let state = runtime.inspect_container("web-1").await.unwrap();
        assert!(state.running);
        assert_eq!(state.status, "running");
    }

    #[tokio::test]
    async fn mock_create_records_spec() {
        let runtime = MockRuntime::new();
        runtime.create_container(&sample_spec("web-1")).await.unwrap();

        let specs = runtime.created_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].image, "pihole/pihole:latest");
    }

    #[tokio::test]
    async fn mock_create_rejects_duplicate_name() {
        let runtime = MockRuntime::new();
        runtime.create_container(&sample_spec("web-1")).await.unwrap();
        let result = runtime.create_container(&sample_spec("web-1")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn mock_inspect_missing_is_not_found() {
        let runtime = MockRuntime::new();
        let result = runtime.inspect_container("ghost").await;
        assert!(matches!(
            result.unwrap_err(),
            OrchestratorError::ContainerNotFound(_)
        ));
    }

    #[tokio::test]
    async fn mock_stop_marks_exited() {
        let runtime = MockRuntime::new().with_running_container("web-1");
        runtime
            .stop_container("web-1", Duration::from_secs(10))
            .await
            .unwrap();

        let state = runtime.inspect_container("web-1").await.unwrap();
        assert!(!state.running);
        assert_eq!(state.status, "exited");
    }

    #[tokio::test]
    async fn mock_remove_missing_is_not_found() {
        let runtime = MockRuntime::new();
        let result = runtime.remove_container("ghost", true).await;
        assert!(matches!(
            result.unwrap_err(),
            OrchestratorError::ContainerNotFound(_)
        ));
    }

    #[tokio::test]
    async fn mock_exec_scripts_match_in_order() {
        let runtime = MockRuntime::new()
            .with_running_container("web-1")
            .with_exec_script(
                "sqlite3",
                ExecOutput {
                    exit_code: 0,
                    stdout: "a.com\nb.com\n".to_owned(),
                    stderr: String::new(),
                },
            )
            .with_exec_script(
                "pihole",
                ExecOutput {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: "boom".to_owned(),
                },
            );

        let read = runtime
            .exec(
                "web-1",
                &ExecCommand::new("sqlite3").arg("/etc/pihole/gravity.db"),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(read.stdout, "a.com\nb.com\n");

        let add = runtime
            .exec(
                "web-1",
                &ExecCommand::new("pihole").arg("-b").arg("c.com"),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(!add.success());
    }

    #[tokio::test]
    async fn mock_exec_default_is_success() {
        let runtime = MockRuntime::new().with_running_container("web-1");
        let output = runtime
            .exec(
                "web-1",
                &ExecCommand::new("pihole").arg("-b").arg("x.com"),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(runtime.exec_calls().len(), 1);
    }

    #[tokio::test]
    async fn mock_exec_missing_container_is_not_found() {
        let runtime = MockRuntime::new();
        let result = runtime
            .exec(
                "ghost",
                &ExecCommand::new("pihole"),
                Duration::from_secs(5),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn mock_connect_network_records_attachment() {
        let runtime = MockRuntime::new().with_running_container("web-1");
        runtime
            .connect_network("web-1", "dnsfence-net", Ipv4Addr::new(172, 20, 0, 10))
            .await
            .unwrap();

        let attachments = runtime.network_attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].1, "dnsfence-net");
    }

    #[tokio::test]
    async fn mock_failing_ping() {
        let runtime = MockRuntime::new().with_failing_ping();
        assert!(matches!(
            runtime.ping().await.unwrap_err(),
            OrchestratorError::RuntimeUnavailable(_)
        ));
    }

    #[test]
    fn runtime_trait_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<MockRuntime>();
        assert_send_sync::<DockerRuntime>();
    }
}
