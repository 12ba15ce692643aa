mod assertion;
mod context;
mod events;
mod expression;
mod order;
mod repeat;
mod resources;
mod runner;
mod state;
mod steps;
mod store;
mod transform;

pub use assertion::{CheckRecord, CheckReport, JsonChecker};
pub use context::{RunContext, RunOptions, ScenarioScope};
pub use events::EngineEvent;
pub use expression::{
    Expression, contains_expression, display_value, eval_expr, interpolate, is_expression, query,
    resolve, resolve_list, substitute,
};
pub use order::{OrderDirection, check_order, compare_values};
pub use repeat::{
    Observation, RepeatController, RepeatDecision, TRANSIENT_ATTEMPTS, TRANSIENT_BACKOFF,
    invoke_with_retry,
};
pub use resources::{InvokerRegistry, apply_config_override};
pub use runner::{RunReport, run_scenario};
pub use state::{ScenarioRuntime, StepRuntimeState, StepStatus};
pub use store::ResultStore;
pub use transform::{Namespace, PredicateHook, TransformHook, TransformRegistry, is_truthy};
