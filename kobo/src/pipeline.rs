use async_trait::async_trait;
use kobo_core::{CoreError, PendingEvent};
use tracing::{debug, info, warn};
use validator::{Validate, ValidationErrors};

use crate::context::AppContext;

/// A state-changing request. The handler owns a fresh unit of work, commits
/// it, and hands the committed events back for post-commit dispatch.
#[async_trait]
pub trait Command: Validate + Send + Sync {
    type Output: Send;

    async fn handle(&self, ctx: &AppContext) -> Result<CommandOutcome<Self::Output>, CoreError>;
}

/// A read-only request returning a projection DTO.
#[async_trait]
pub trait Query: Validate + Send + Sync {
    type Output: Send;

    async fn fetch(&self, ctx: &AppContext) -> Result<Self::Output, CoreError>;
}

pub struct CommandOutcome<T> {
    pub output: T,
    pub events: Vec<PendingEvent>,
}

impl<T> CommandOutcome<T> {
    pub fn new(output: T) -> Self {
        Self {
            output,
            events: Vec::new(),
        }
    }

    pub fn with_events(output: T, events: Vec<PendingEvent>) -> Self {
        Self { output, events }
    }
}

/// The request pipeline: logging, then validation, then the handler, then —
/// only on success — domain-event dispatch to the in-process subscribers.
/// The stages are composed here explicitly; nothing is discovered at
/// runtime.
#[derive(Clone)]
pub struct Pipeline {
    ctx: AppContext,
}

impl Pipeline {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub async fn execute<C: Command>(&self, command: C) -> Result<C::Output, CoreError> {
        let request = request_name::<C>();
        debug!(request, "executing command");

        if let Err(errors) = command.validate() {
            let violations = collect_violations(&errors);
            warn!(request, ?violations, "command rejected by validation");
            return Err(CoreError::Validation(violations));
        }

        match command.handle(&self.ctx).await {
            Ok(outcome) => {
                // The events are already durable in the outbox; a subscriber
                // failure here is logged by the dispatcher and never reaches
                // the caller.
                for event in &outcome.events {
                    let _ = self.ctx.dispatcher.publish(event).await;
                }

                info!(request, events = outcome.events.len(), "command succeeded");
                Ok(outcome.output)
            }
            Err(e) => {
                warn!(request, error = %e, "command failed");
                Err(e)
            }
        }
    }

    pub async fn query<Q: Query>(&self, query: Q) -> Result<Q::Output, CoreError> {
        let request = request_name::<Q>();
        debug!(request, "executing query");

        if let Err(errors) = query.validate() {
            let violations = collect_violations(&errors);
            warn!(request, ?violations, "query rejected by validation");
            return Err(CoreError::Validation(violations));
        }

        match query.fetch(&self.ctx).await {
            Ok(output) => {
                debug!(request, "query succeeded");
                Ok(output)
            }
            Err(e) => {
                warn!(request, error = %e, "query failed");
                Err(e)
            }
        }
    }
}

fn request_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Flattens derive-level violations into one list so a caller sees every
/// problem at once.
fn collect_violations(errors: &ValidationErrors) -> Vec<String> {
    let mut violations = Vec::new();

    for (field, field_errors) in errors.field_errors() {
        for error in field_errors.iter() {
            match &error.message {
                Some(message) => violations.push(format!("{field}: {message}")),
                None => violations.push(format!("{field}: {}", error.code)),
            }
        }
    }

    violations.sort();
    violations
}
