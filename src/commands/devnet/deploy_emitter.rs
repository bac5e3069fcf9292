use async_trait::async_trait;
use clap::Parser;
use serde_json::Value;

use super::{DevKey, devkey_script, rpc_url, tool_json};
use crate::commands::{Capture, Command, CommandEnv, parse_args};
use crate::context::Context;
use crate::errors::CommandError;

const CREATE_EMITTER: &str = r#"cd op-e2e/e2eutils/interop/contracts
forge create --private-key="$RAW_PRIVATE_KEY" "src/emit.sol:EmitEvent" --json"#;

/// Deploy the EmitEvent contract to a chain.
///
/// The raw `forge create` output is committed first, then the parsed
/// address; a parse failure leaves only the raw output behind.
pub struct DeployEmitter {
    env: CommandEnv,
}

impl DeployEmitter {
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[derive(Parser, Debug)]
struct DeployEmitterArgs {
    /// Chain to deploy the emitter contract to
    chain: String,
}

#[async_trait]
impl Command for DeployEmitter {
    fn name(&self) -> &str {
        "deploy_emitter"
    }

    fn description(&self) -> Option<&str> {
        Some("Deploy the emitter contract to a chain and save its address to context.")
    }

    async fn execute(&self, ctx: &mut Context, args: &[String]) -> Result<Capture, CommandError> {
        let args: DeployEmitterArgs = parse_args(self.name(), args)?;
        let devnet = &self.env.devnet;
        let rpc = rpc_url(devnet, &args.chain)?;

        let script = devkey_script(devnet, "forge create", DevKey::user("0"), rpc, CREATE_EMITTER);
        let output = self
            .env
            .runner
            .run(&script)
            .await?
            .check("forge create")?;

        ctx.set(
            format!("{}.CreateEmitterOutput", args.chain),
            output.stdout.as_str(),
        )?;

        let key = format!("{}.EmitterContractAddress", args.chain);
        let created = tool_json(&output, "forge create output")?;
        let address = created
            .get("deployedTo")
            .and_then(Value::as_str)
            .ok_or_else(|| CommandError::InvalidValue {
                key: format!("{}.CreateEmitterOutput", args.chain),
                reason: "forge create output has no 'deployedTo' address".to_string(),
            })?;

        ctx.set(key, address)?;
        println!("Emitter deployed to {} on {}", address, args.chain);
        Ok(output.into())
    }
}
