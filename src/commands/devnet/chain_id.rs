use async_trait::async_trait;
use clap::Parser;

use super::rpc_url;
use crate::commands::{Capture, Command, CommandEnv, parse_args};
use crate::context::Context;
use crate::errors::CommandError;
use crate::exec::Script;

/// Ask a chain's RPC for its chain id and remember it as `<chain>.ChainID`.
pub struct ChainId {
    env: CommandEnv,
}

impl ChainId {
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[derive(Parser, Debug)]
struct ChainIdArgs {
    /// Chain alias from [devnet.rpc], e.g. L2_A
    chain: String,
}

#[async_trait]
impl Command for ChainId {
    fn name(&self) -> &str {
        "chain_id"
    }

    fn description(&self) -> Option<&str> {
        Some("Get the chain ID of a chain from cast.")
    }

    async fn execute(&self, ctx: &mut Context, args: &[String]) -> Result<Capture, CommandError> {
        let args: ChainIdArgs = parse_args(self.name(), args)?;
        let rpc = rpc_url(&self.env.devnet, &args.chain)?;

        let script = Script::new("cast chain-id", "cast chain-id").env("ETH_RPC_URL", rpc);
        let output = self
            .env
            .runner
            .run(&script)
            .await?
            .check("cast chain-id")?;

        let chain_id = output.stdout.trim();
        if chain_id.is_empty() {
            return Err(CommandError::External {
                program: "cast chain-id".to_string(),
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        ctx.set(format!("{}.ChainID", args.chain), chain_id)?;
        println!("Chain ID: {}", chain_id);
        Ok(output.into())
    }
}
