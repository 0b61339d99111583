//! HTTP routes.

pub mod health;
pub mod orders;
pub mod rpc;

pub use health::{HealthResponse, health_routes};
pub use orders::process_order_handler;
pub use rpc::rpc_handler;
