mod record;
mod state;

pub use record::{ApplicationRecord, ApplicationStatus, FailureCause, Step};
pub use state::{StateMachine, Transition, TransitionError};
