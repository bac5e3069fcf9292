use async_trait::async_trait;
use clap::Parser;

use super::{DevKey, devkey_script, rpc_url, tool_json};
use crate::commands::{Capture, Command, CommandEnv, parse_args};
use crate::context::Context;
use crate::errors::CommandError;

// $1 = data, $2 = emitter address
const EMIT_DATA: &str = r#"message=$(cast from-utf8 "$1")
cast send --json --private-key="$RAW_PRIVATE_KEY" "$2" 'emitData(bytes)' "$message""#;

/// Emit an event through a previously deployed emitter contract.
pub struct Emit {
    env: CommandEnv,
}

impl Emit {
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[derive(Parser, Debug)]
struct EmitArgs {
    /// Chain the emitter contract lives on
    chain: String,
    /// Idempotency key for event lookup
    #[arg(long, default_value = "default")]
    key: String,
    /// Data to emit
    #[arg(long, default_value = "Hello Superchain!", allow_hyphen_values = true)]
    data: String,
}

#[async_trait]
impl Command for Emit {
    fn name(&self) -> &str {
        "emit"
    }

    fn description(&self) -> Option<&str> {
        Some("Use the Emitter Contract to emit an event.")
    }

    async fn execute(&self, ctx: &mut Context, args: &[String]) -> Result<Capture, CommandError> {
        let args: EmitArgs = parse_args(self.name(), args)?;
        let devnet = &self.env.devnet;
        let rpc = rpc_url(devnet, &args.chain)?;

        let emitter_key = format!("{}.EmitterContractAddress", args.chain);
        let emitter = ctx
            .require(&emitter_key)?
            .as_str()
            .ok_or_else(|| CommandError::InvalidValue {
                key: emitter_key.clone(),
                reason: "expected an address string".to_string(),
            })?
            .to_string();
        if emitter.is_empty() {
            return Err(CommandError::MissingKey { key: emitter_key });
        }

        let script = devkey_script(devnet, "cast send", DevKey::user(&args.chain), rpc, EMIT_DATA)
            .args([args.data.clone(), emitter]);
        let output = self.env.runner.run(&script).await?.check("cast send")?;

        let receipt = tool_json(&output, "cast send receipt")?;
        ctx.set(format!("{}.Emitted.{}", args.chain, args.key), receipt.clone())?;

        println!("Event emitted: {}", receipt);
        Ok(output.into())
    }
}
