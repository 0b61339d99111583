//! Phase-driven order orchestration for ORBIT.
//!
//! One run takes an order through five phases, strictly in order:
//!
//! ```text
//! ┌──────────────────────┐   ┌─────────────────┐   ┌─────────────────────────┐
//! │ pre-flight-validation│──►│ order-discovery │──►│ atomic-image-processing │
//! └──────────────────────┘   └─────────────────┘   └─────────────────────────┘
//!                                                               │
//!                      ┌───────────────────┐   ┌────────────────▼───┐
//!                      │ email-and-cleanup │◄──│ order-finalization │
//!                      └───────────────────┘   └────────────────────┘
//! ```
//!
//! Every remote step is wrapped by the [`RetryExecutor`], which picks a
//! backoff policy from the failure's [`ErrorKind`]. A unit that exhausts
//! its retries is rolled back and marked `error`; the rest of the order
//! carries on. The run always ends in a [`WorkflowReport`], whether it
//! succeeded or not.
//!
//! The orchestrator only sees the [`DataStore`], [`BlobStore`],
//! [`Notifier`], and [`ImageServices`] traits. [`Collaborators::rpc`]
//! backs all four with pooled JSON-RPC services; the `testing` feature
//! provides in-memory versions.

pub mod collaborators;
pub mod context;
pub mod error;
pub mod events;
pub mod health;
pub mod mock;
pub mod model;
pub mod orchestrator;
mod phases;
pub mod retry;
pub mod rpc_backed;
pub mod services;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use collaborators::{
    BlobEntry, BlobStore, Collaborators, CompletionNotice, DataStore, EmbedRequest, EmbedResult,
    ImageAnalysis, ImageServices, Notifier,
};
pub use context::{ErrorRecord, ExecutionStats, Phase, PhaseStatus, PhaseStatuses, WorkflowContext};
pub use error::{ErrorKind, Result, WorkflowError, classify_message};
pub use events::{EventSink, WorkflowEvent};
pub use health::{ComponentHealth, HealthReport, HealthStatus, ReadinessReport};
pub use mock::MockImageServices;
pub use model::{
    FolderLayout, ImageUnit, Order, OrderStatus, OrderUpdate, PaymentStatus, ProcessingStage,
    UnitStatus, UnitUpdate,
};
pub use orchestrator::{
    Action, Orchestrator, ProcessRequest, UnitCounts, WorkflowReport, WorkflowSettings,
};
pub use retry::{RetryExecutor, RetryOutcome, RetryPolicies, RetryPolicy};
pub use rpc_backed::{RpcBlobStore, RpcDataStore, RpcImageServices, RpcNotifier};
pub use services::{connect_pool, service_config};
