//! Command modules and the contract they implement.
//!
//! A command module has a stable name, an optional one-line description and
//! an async `execute(context, args)` entry point returning the captured
//! output of whatever external work it did. Modules keep no state between
//! invocations; anything a later step needs goes into the [`Context`].
//!
//! | Module      | Commands                                                          |
//! |-------------|-------------------------------------------------------------------|
//! | `store`     | `get`, `set`, `unset`, `keys`                                     |
//! | `devnet`    | `chain_id`, `deploy_emitter`, `emit`, `executing_message`, `add_dependency` |
//! | `ls`        | `ls`                                                              |
//! | `script`    | `[[commands]]` entries from `relay.toml`                          |
//!
//! Adding a builtin means writing the module and listing it in [`builtin`].

pub mod devnet;
pub mod ls;
pub mod script;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DevnetConfig;
use crate::context::Context;
use crate::errors::CommandError;
use crate::exec::{ProcessOutput, Runner};

/// What a command captured from its external work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capture {
    pub stdout: String,
    pub stderr: String,
}

impl Capture {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl From<ProcessOutput> for Capture {
    fn from(output: ProcessOutput) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// A discoverable unit of work.
#[async_trait]
pub trait Command: Send + Sync {
    /// Lookup name, e.g. `deploy_emitter`.
    fn name(&self) -> &str;

    /// One-line description for the command listing.
    fn description(&self) -> Option<&str> {
        None
    }

    async fn execute(&self, ctx: &mut Context, args: &[String]) -> Result<Capture, CommandError>;
}

/// Shared collaborators handed to builtin commands at registration time.
#[derive(Clone)]
pub struct CommandEnv {
    pub runner: Arc<dyn Runner>,
    pub devnet: Arc<DevnetConfig>,
}

impl CommandEnv {
    pub fn new(runner: Arc<dyn Runner>, devnet: DevnetConfig) -> Self {
        Self {
            runner,
            devnet: Arc::new(devnet),
        }
    }
}

/// Every builtin command module.
pub fn builtin(env: &CommandEnv) -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(store::Get),
        Arc::new(store::Set),
        Arc::new(store::Unset),
        Arc::new(store::Keys),
        Arc::new(ls::Ls::new(env.runner.clone())),
        Arc::new(devnet::ChainId::new(env.clone())),
        Arc::new(devnet::DeployEmitter::new(env.clone())),
        Arc::new(devnet::Emit::new(env.clone())),
        Arc::new(devnet::ExecutingMessage::new(env.clone())),
        Arc::new(devnet::AddDependency::new(env.clone())),
    ]
}

/// Parse a command's trailing args with clap, reporting problems as usage errors.
pub(crate) fn parse_args<P: clap::Parser>(name: &str, args: &[String]) -> Result<P, CommandError> {
    let argv = std::iter::once(name.to_string()).chain(args.iter().cloned());
    P::try_parse_from(argv).map_err(CommandError::from)
}
