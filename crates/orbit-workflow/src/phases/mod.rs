//! The five workflow phases.
//!
//! Each phase is a free function over a [`PhaseEnv`] and the run's
//! [`WorkflowContext`](crate::context::WorkflowContext). Phases return
//! classified errors; deciding what a failure means for the run is the
//! orchestrator's job.

pub(crate) mod discovery;
pub(crate) mod finalization;
pub(crate) mod notification;
pub(crate) mod preflight;
pub(crate) mod processing;

use orbit_rpc::ConnectionPool;

use crate::collaborators::Collaborators;
use crate::events::EventSink;
use crate::orchestrator::WorkflowSettings;
use crate::retry::RetryExecutor;

pub(crate) use discovery::Discovered;
pub(crate) use finalization::Finalized;

/// What every phase can reach.
pub(crate) struct PhaseEnv<'a> {
    pub collaborators: &'a Collaborators,
    pub settings: &'a WorkflowSettings,
    pub retry: &'a RetryExecutor,
    pub pool: &'a ConnectionPool,
    pub events: Option<&'a EventSink>,
}
