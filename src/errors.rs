//! Typed error hierarchy for relay.
//!
//! Four enums follow the layers an invocation passes through:
//! - `ContextError`: loading, locking and persisting the context backing
//! - `RegistryError`: resolving a command name
//! - `CommandError`: failures raised by a command module while it runs
//! - `DispatchError`: what the dispatcher reports back to `main`

use std::path::PathBuf;

use thiserror::Error;

use crate::registry::CommandInfo;

/// Errors from the context store.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Failed to read context file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Context file at {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Context file at {path} must contain a JSON object at the top level")]
    NotAnObject { path: PathBuf },

    #[error("Failed to write context file at {path}{}: {source}", key_suffix(.key))]
    Write {
        path: PathBuf,
        key: Option<String>,
        #[source]
        source: std::io::Error,
    },

    #[error("Context file at {path} is in use by another invocation")]
    Locked { path: PathBuf },

    #[error("Failed to lock context file at {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Key '{key}' not found in context")]
    KeyNotFound { key: String },
}

fn key_suffix(key: &Option<String>) -> String {
    match key {
        Some(key) => format!(" (while setting '{}')", key),
        None => String::new(),
    }
}

/// Errors from command resolution.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Command '{name}' not found")]
    NotFound { name: String },

    #[error("Command '{name}' is installed but cannot run: {reason}")]
    Malformed { name: String, reason: String },

    #[error("Command '{name}' is registered more than once")]
    DuplicateCommand { name: String },
}

/// Errors raised by a command module during execution.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Usage(String),

    #[error("Key '{key}' not found in context. Run the command that produces it first.")]
    MissingKey { key: String },

    #[error("Context value under '{key}' is not usable: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Unknown chain '{chain}'. Known chains: {known}")]
    UnknownChain { chain: String, known: String },

    #[error("{program} exited with {}", describe_status(.status))]
    External {
        program: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Could not parse {what}: {source}")]
    InvalidOutput {
        what: String,
        #[source]
        source: serde_json::Error,
        stdout: String,
        stderr: String,
    },

    #[error(transparent)]
    Context(ContextError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl From<ContextError> for CommandError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::KeyNotFound { key } => CommandError::MissingKey { key },
            other => CommandError::Context(other),
        }
    }
}

impl From<clap::Error> for CommandError {
    fn from(err: clap::Error) -> Self {
        CommandError::Usage(err.to_string().trim_end().to_string())
    }
}

impl CommandError {
    /// Captured (stdout, stderr) of a failed or unparsable external step, if any.
    pub fn captured(&self) -> Option<(&str, &str)> {
        match self {
            CommandError::External { stdout, stderr, .. }
            | CommandError::InvalidOutput { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }

    /// Whether the failure was caused by the caller's input rather than the outside world.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CommandError::Usage(_) | CommandError::UnknownChain { .. }
        )
    }
}

fn command_prefix(command: &Option<String>) -> String {
    match command {
        Some(command) => format!("Command '{}': ", command),
        None => String::new(),
    }
}

/// Errors the dispatcher hands back to `main`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No command given")]
    NoCommand { available: Vec<CommandInfo> },

    #[error("Command '{name}' not found")]
    UnknownCommand {
        name: String,
        available: Vec<CommandInfo>,
    },

    #[error("Command '{name}' is installed but cannot run: {reason}")]
    MalformedCommand {
        name: String,
        reason: String,
        available: Vec<CommandInfo>,
    },

    #[error("{}{source}", command_prefix(.command))]
    Store {
        command: Option<String>,
        #[source]
        source: ContextError,
    },

    #[error("Command '{command}' failed: {source}")]
    Command {
        command: String,
        #[source]
        source: CommandError,
    },
}

impl DispatchError {
    /// Process exit code for this failure. Every variant is non-zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            DispatchError::NoCommand { .. } | DispatchError::UnknownCommand { .. } => 2,
            DispatchError::MalformedCommand { .. } => 4,
            DispatchError::Store { .. } => 3,
            DispatchError::Command { source, .. } => match source {
                CommandError::Context(ContextError::KeyNotFound { .. }) => 1,
                CommandError::Context(_) => 3,
                err if err.is_user_error() => 2,
                _ => 1,
            },
        }
    }

    /// The command listing to show alongside the diagnostic, for resolution failures.
    pub fn listing(&self) -> Option<&[CommandInfo]> {
        match self {
            DispatchError::NoCommand { available }
            | DispatchError::UnknownCommand { available, .. }
            | DispatchError::MalformedCommand { available, .. } => Some(available),
            _ => None,
        }
    }
}
