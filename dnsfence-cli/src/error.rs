//! CLI-specific error types and exit code mapping

use dnsfence_core::error::DnsfenceError;
use dnsfence_orchestrator::OrchestratorError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Cannot reach the container runtime.
    #[error("container runtime not reachable: {0}")]
    RuntimeUnreachable(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from dnsfence-core.
    #[error("{0}")]
    Core(#[from] DnsfenceError),

    /// Orchestration engine error.
    #[error("{0}")]
    Engine(OrchestratorError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                      |
    /// |------|------------------------------|
    /// | 0    | Success                      |
    /// | 1    | General / command error      |
    /// | 2    | Configuration error          |
    /// | 3    | Container runtime unreachable |
    /// | 10   | IO error                     |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::RuntimeUnreachable(_) => 3,
            Self::Engine(OrchestratorError::RuntimeUnavailable(_)) => 3,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) | Self::Engine(_) => 1,
        }
    }
}

impl From<OrchestratorError> for CliError {
    fn from(e: OrchestratorError) -> Self {
        Self::Engine(e)
    }
}
