mod registry;
mod scheduler;

pub use registry::{Trigger, TriggerId, TriggerRegistry};
pub use scheduler::Time;
