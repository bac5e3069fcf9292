//! Builtin commands that read and edit the context directly.

use async_trait::async_trait;
use clap::Parser;
use serde_json::Value;

use super::{Capture, Command, parse_args};
use crate::context::Context;
use crate::errors::CommandError;

/// Print the value stored under a key.
pub struct Get;

#[derive(Parser, Debug)]
#[command(about = "Print a context value")]
struct GetArgs {
    /// Context key, e.g. L2_A.ChainID
    key: String,
}

#[async_trait]
impl Command for Get {
    fn name(&self) -> &str {
        "get"
    }

    fn description(&self) -> Option<&str> {
        Some("Print the value stored under a context key.")
    }

    async fn execute(&self, ctx: &mut Context, args: &[String]) -> Result<Capture, CommandError> {
        let args: GetArgs = parse_args(self.name(), args)?;
        let value = ctx.require(&args.key)?;
        println!("{}", render_value(value));
        Ok(Capture::empty())
    }
}

/// Store a value under a key.
pub struct Set;

#[derive(Parser, Debug)]
#[command(about = "Store a context value")]
struct SetArgs {
    key: String,
    #[arg(allow_hyphen_values = true)]
    value: String,
    /// Parse VALUE as JSON instead of storing it as a string
    #[arg(long)]
    json: bool,
}

#[async_trait]
impl Command for Set {
    fn name(&self) -> &str {
        "set"
    }

    fn description(&self) -> Option<&str> {
        Some("Store a value under a context key (string, or JSON with --json).")
    }

    async fn execute(&self, ctx: &mut Context, args: &[String]) -> Result<Capture, CommandError> {
        let args: SetArgs = parse_args(self.name(), args)?;
        let value = if args.json {
            serde_json::from_str(&args.value).map_err(|err| {
                CommandError::Usage(format!("Value for '{}' is not valid JSON: {}", args.key, err))
            })?
        } else {
            Value::String(args.value)
        };
        ctx.set(args.key.as_str(), value)?;
        println!("Set {}", args.key);
        Ok(Capture::empty())
    }
}

/// Remove a key.
pub struct Unset;

#[derive(Parser, Debug)]
struct UnsetArgs {
    key: String,
}

#[async_trait]
impl Command for Unset {
    fn name(&self) -> &str {
        "unset"
    }

    fn description(&self) -> Option<&str> {
        Some("Remove a context key.")
    }

    async fn execute(&self, ctx: &mut Context, args: &[String]) -> Result<Capture, CommandError> {
        let args: UnsetArgs = parse_args(self.name(), args)?;
        match ctx.remove(&args.key)? {
            Some(_) => println!("Removed {}", args.key),
            None => println!("{} was not set", args.key),
        }
        Ok(Capture::empty())
    }
}

/// List keys, optionally under a dotted prefix.
pub struct Keys;

#[derive(Parser, Debug)]
struct KeysArgs {
    /// Only keys equal to PREFIX or starting with "PREFIX."
    prefix: Option<String>,
}

#[async_trait]
impl Command for Keys {
    fn name(&self) -> &str {
        "keys"
    }

    fn description(&self) -> Option<&str> {
        Some("List context keys, optionally under a dotted prefix.")
    }

    async fn execute(&self, ctx: &mut Context, args: &[String]) -> Result<Capture, CommandError> {
        let args: KeysArgs = parse_args(self.name(), args)?;
        for key in matching_keys(ctx, args.prefix.as_deref()) {
            println!("{}", key);
        }
        Ok(Capture::empty())
    }
}

fn matching_keys<'c>(ctx: &'c Context, prefix: Option<&str>) -> Vec<&'c str> {
    ctx.keys()
        .filter(|key| prefix.is_none_or(|prefix| in_namespace(key, prefix)))
        .collect()
}

fn in_namespace(key: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('.');
    key == prefix
        || key
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Strings print raw; everything else as compact JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
