//! `ls`: list a directory and keep the listing in the context.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use serde_json::Value;

use super::{Capture, Command, parse_args};
use crate::context::Context;
use crate::errors::CommandError;
use crate::exec::{Runner, Script};

/// Key the listing is stored under.
pub const LISTING_KEY: &str = "directory_listing";

pub struct Ls {
    runner: Arc<dyn Runner>,
}

impl Ls {
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        Self { runner }
    }
}

#[derive(Parser, Debug)]
struct LsArgs {
    /// Directory to list (defaults to the working directory)
    dir: Option<String>,
}

#[async_trait]
impl Command for Ls {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> Option<&str> {
        Some("List the contents of a directory and save to context.")
    }

    async fn execute(&self, ctx: &mut Context, args: &[String]) -> Result<Capture, CommandError> {
        let args: LsArgs = parse_args(self.name(), args)?;
        let script = Script::new("ls", r#"ls -- "${1:-.}""#).args(args.dir);
        let output = self.runner.run(&script).await?.check("ls")?;

        let lines: Vec<Value> = output
            .stdout
            .lines()
            .map(|l| Value::String(l.to_string()))
            .collect();
        ctx.set(LISTING_KEY, Value::Array(lines))?;

        println!("Directory listing saved to context.");
        Ok(output.into())
    }
}
