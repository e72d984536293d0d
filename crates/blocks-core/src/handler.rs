//! Function-value types stored by the building blocks.
//!
//! Callers register plain closures returning `Result<Value, E>` for any
//! displayable `E`. Registration boxes them behind a uniform signature whose
//! error is always [`BlocksError::HandlerFailure`], so the blocks never need to
//! know the caller's error type.

use std::any::Any;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use crate::error::{BlocksError, Result};
use crate::message::Message;

/// Handler bound to a service route. Receives the optional request payload.
pub type RouteHandler = Arc<dyn Fn(Option<&Value>) -> Result<Value> + Send + Sync>;

/// Handler bound to a queue message type.
pub type SubscriberHandler = Arc<dyn Fn(&Message) -> Result<Value> + Send + Sync>;

/// Work function bound to a worker job type.
pub type JobHandler = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Callback fired by a recurring trigger.
pub type TriggerCallback = Arc<dyn Fn() + Send + Sync>;

/// Box a route handler.
pub fn route_handler<F, E>(f: F) -> RouteHandler
where
    F: Fn(Option<&Value>) -> std::result::Result<Value, E> + Send + Sync + 'static,
    E: Display,
{
    Arc::new(move |payload: Option<&Value>| f(payload).map_err(failure))
}

/// Box a subscriber handler.
pub fn subscriber_handler<F, E>(f: F) -> SubscriberHandler
where
    F: Fn(&Message) -> std::result::Result<Value, E> + Send + Sync + 'static,
    E: Display,
{
    Arc::new(move |message: &Message| f(message).map_err(failure))
}

/// Box a job work function.
pub fn job_handler<F, E>(f: F) -> JobHandler
where
    F: Fn(&Value) -> std::result::Result<Value, E> + Send + Sync + 'static,
    E: Display,
{
    Arc::new(move |payload: &Value| f(payload).map_err(failure))
}

fn failure<E: Display>(e: E) -> BlocksError {
    BlocksError::HandlerFailure(e.to_string())
}

/// Message carried by a handler failure, or the full error text otherwise.
pub fn failure_message(err: BlocksError) -> String {
    match err {
        BlocksError::HandlerFailure(message) => message,
        other => other.to_string(),
    }
}

/// Run a handler invocation, turning a panic into `HandlerFailure`.
pub fn guard<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(BlocksError::HandlerFailure(panic_message(payload.as_ref()))),
    }
}

/// Extract a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
