#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`OrchestratorError`)
//! - [`config`]: Engine configuration (`OrchestratorConfig`, builder)
//! - [`runtime`]: Container runtime abstraction (`ContainerRuntime` trait, `DockerRuntime`)
//! - [`allocator`]: Internal address / admin port allocation (`ResourcePool`)
//! - [`lifecycle`]: Instance lifecycle manager (`InstanceManager`, builder)
//! - [`reconciler`]: Declared-vs-live rule reconciliation (`RuleReconciler`, `SyncOutcome`)
//! - [`routing`]: Deterministic routing config generation (`RoutingDocument`)
//!
//! # Architecture
//!
//! ```text
//! provision ──> ResourcePool ──> ContainerRuntime ──> InstanceStore
//!                  (allocate)       (create/attach)      (persist)
//!
//! reconcile ──> RuleReconciler ──> ContainerRuntime.exec ──> SyncOutcome
//!                  (set diff)        (add/remove/reload)
//!
//! routing   ──> InstanceStore ──> RoutingDocument (byte-reproducible)
//! ```

pub mod allocator;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod reconciler;
pub mod routing;
pub mod runtime;

// --- Public API Re-exports ---

// Lifecycle (main orchestrator)
pub use lifecycle::{DeprovisionOutcome, InstanceManager, InstanceManagerBuilder, RestartOutcome};

// Configuration
pub use config::{OrchestratorConfig, OrchestratorConfigBuilder};

// Error
pub use error::OrchestratorError;

// Container runtime
pub use runtime::{ContainerRuntime, ContainerSpec, DockerRuntime, ExecCommand, ExecOutput};

// Allocation
pub use allocator::ResourcePool;

// Reconciliation
pub use reconciler::{RuleChange, RuleFailure, RuleOp, RuleReconciler, SyncOutcome, OWNERSHIP_TAG};

// Routing config
pub use routing::{render_routing_config, RoutingDocument};
