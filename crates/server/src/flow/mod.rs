pub mod builder;
pub mod condition;
pub mod engine;
pub mod payload;
pub mod progression;
pub mod status;
pub mod step;
pub mod task;
pub mod user;

pub use builder::{build_flow, default_flow, StepDefinition, TaskDefinition};
pub use condition::Condition;
pub use engine::{CompletionOutcome, FlowEngine};
pub use payload::{FieldValue, TaskPayload};
pub use progression::{current_position, progress};
pub use status::Status;
pub use step::Step;
pub use task::{Task, CONDITION_VAR};
pub use user::{StepSelector, User};
