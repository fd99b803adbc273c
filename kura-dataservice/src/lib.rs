pub mod control;
pub mod hooks;
pub mod lifecycle;
pub mod metric;
pub mod negotiator;
pub mod orchestrator;
pub mod retry;

pub use control::{DataServiceControl, ProbeStatus, ScriptControl};
pub use lifecycle::{DaemonLifecycleState, LifecycleController};
pub use negotiator::{FailoverRole, Negotiator, Target};
pub use orchestrator::{Orchestrator, OrchestratorContext};
pub use retry::{backoff_delay, RetryBudget};
