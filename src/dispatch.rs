//! One invocation, start to finish.
//!
//! ```text
//! START -> CONTEXT_LOADED -> COMMAND_RESOLVED -> EXECUTING
//!       -> {SUCCESS | EXTERNAL_FAILURE} -> CONTEXT_PERSISTED -> END
//! ```
//!
//! Resolution failures stop before anything runs, so the context is never
//! touched. Once a command has run, the context is saved again whatever the
//! outcome; keys the command committed before failing stay committed.

use std::path::PathBuf;

use crate::commands::Capture;
use crate::context::{Context, ContextOptions};
use crate::errors::{DispatchError, RegistryError};
use crate::registry::Registry;

/// Where an invocation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Start,
    ContextLoaded,
    CommandResolved,
    Executing,
    Success,
    ExternalFailure,
    ContextPersisted,
}

impl InvocationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationState::Start => "start",
            InvocationState::ContextLoaded => "context_loaded",
            InvocationState::CommandResolved => "command_resolved",
            InvocationState::Executing => "executing",
            InvocationState::Success => "success",
            InvocationState::ExternalFailure => "external_failure",
            InvocationState::ContextPersisted => "context_persisted",
        }
    }
}

impl std::fmt::Display for InvocationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub command: String,
    pub args: Vec<String>,
    pub capture: Capture,
}

/// Runs commands from a registry against one context backing.
pub struct Dispatcher {
    registry: Registry,
    context_path: PathBuf,
    options: ContextOptions,
}

impl Dispatcher {
    pub fn new(registry: Registry, context_path: impl Into<PathBuf>, options: ContextOptions) -> Self {
        Self {
            registry,
            context_path: context_path.into(),
            options,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn context_path(&self) -> &std::path::Path {
        &self.context_path
    }

    /// Run `command` with `args`. `None` means no command was given, which
    /// is reported like an unknown one.
    pub async fn run(&self, command: Option<&str>, args: &[String]) -> Result<Outcome, DispatchError> {
        trace_state(InvocationState::Start, command);

        let mut ctx =
            Context::load(&self.context_path, self.options).map_err(|source| DispatchError::Store {
                command: command.map(str::to_string),
                source,
            })?;
        tracing::debug!(
            path = %self.context_path.display(),
            keys = ctx.len(),
            "context loaded"
        );
        trace_state(InvocationState::ContextLoaded, command);

        let Some(name) = command else {
            return Err(DispatchError::NoCommand {
                available: self.registry.list(),
            });
        };

        let module = match self.registry.resolve(name) {
            Ok(module) => module,
            Err(RegistryError::Malformed { name, reason }) => {
                return Err(DispatchError::MalformedCommand {
                    name,
                    reason,
                    available: self.registry.list(),
                });
            }
            Err(err) => {
                tracing::debug!(error = %err, "command resolution failed");
                return Err(DispatchError::UnknownCommand {
                    name: name.to_string(),
                    available: self.registry.list(),
                });
            }
        };
        trace_state(InvocationState::CommandResolved, command);

        trace_state(InvocationState::Executing, command);
        let result = module.execute(&mut ctx, args).await;

        match &result {
            Ok(_) => trace_state(InvocationState::Success, command),
            Err(err) => {
                tracing::warn!(command = %name, error = %err, "command failed");
                trace_state(InvocationState::ExternalFailure, command);
            }
        }

        // Every set was already written through; this covers modules that
        // only touched the store indirectly.
        let saved = ctx.save();
        match (result, saved) {
            (Ok(capture), Ok(())) => {
                trace_state(InvocationState::ContextPersisted, command);
                Ok(Outcome {
                    command: name.to_string(),
                    args: args.to_vec(),
                    capture,
                })
            }
            (Ok(_), Err(source)) => Err(DispatchError::Store {
                command: Some(name.to_string()),
                source,
            }),
            (Err(source), saved) => {
                match saved {
                    Ok(()) => trace_state(InvocationState::ContextPersisted, command),
                    Err(err) => tracing::error!(error = %err, "final context save failed"),
                }
                Err(DispatchError::Command {
                    command: name.to_string(),
                    source,
                })
            }
        }
    }
}

fn trace_state(state: InvocationState, command: Option<&str>) {
    tracing::debug!(state = %state, command = command.unwrap_or("-"), "invocation state");
}
