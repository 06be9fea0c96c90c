//! IntentRoute Executor
//!
//! Turns a selected quote into mined transactions and wraps whole
//! operations (quote, then execute) in a bounded recovery loop.
//!
//! - [`TransactionPipeline`] validates a quote, wraps native assets when a
//!   limit order needs it, resolves allowance gaps and executes.
//! - [`ErrorRecovery`] retries once after rewriting an unresolved token
//!   symbol into its address.
//! - [`IntentRouter`] is the entry point for swap, stake and bridge.

pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod recovery;
pub mod router;
pub mod stage;

pub use config::{ApprovalPolicy, PipelineConfig, RecoveryConfig, RouterConfig};
pub use metrics::{Metrics, MetricsSnapshot};
pub use pipeline::{Execution, TransactionPipeline};
pub use recovery::{ErrorRecovery, RequestContext};
pub use router::IntentRouter;
pub use stage::{PipelineStage, PipelineTrace};
