use std::path::PathBuf;

use anyhow::Context as _;
use async_trait::async_trait;
use clap::Parser;
use serde::Deserialize;

use super::{DevKey, devkey_script, rpc_url};
use crate::commands::{Capture, Command, CommandEnv, parse_args};
use crate::config::DevnetConfig;
use crate::context::Context;
use crate::errors::CommandError;

// $1 = SystemConfigProxy, $2 $3 = chain ids
const ADD_DEPENDENCIES: &str = r#"cast send --json --private-key="$RAW_PRIVATE_KEY" "$1" 'addDependency(uint256)' "$2"
cast send --json --private-key="$RAW_PRIVATE_KEY" "$1" 'addDependency(uint256)' "$3""#;

/// Make two chains depend on each other for interop.
///
/// Each chain's SystemConfig is updated by its own owner key over L1. The
/// `ChainDependency.<chain>.<other>` flag is committed as soon as that
/// chain's transactions succeed, so a failure on the second chain keeps the
/// first one's record.
pub struct AddDependency {
    env: CommandEnv,
}

impl AddDependency {
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[derive(Parser, Debug)]
struct AddDependencyArgs {
    /// First chain id
    chain_a: String,
    /// Second chain id
    chain_b: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct L2Addresses {
    system_config_proxy: String,
}

fn addresses_path(devnet: &DevnetConfig, chain: &str) -> PathBuf {
    devnet
        .monorepo_root
        .join(".devnet-interop/deployments/l2")
        .join(chain)
        .join("addresses.json")
}

/// Look up a chain's SystemConfigProxy in the devnet deployment output.
fn system_config_proxy(devnet: &DevnetConfig, chain: &str) -> anyhow::Result<String> {
    let path = addresses_path(devnet, chain);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read deployment addresses: {}", path.display()))?;
    let addresses: L2Addresses = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse deployment addresses: {}", path.display()))?;
    Ok(addresses.system_config_proxy)
}

#[async_trait]
impl Command for AddDependency {
    fn name(&self) -> &str {
        "add_dependency"
    }

    fn description(&self) -> Option<&str> {
        Some("Add two chains to each other's interop dependency set.")
    }

    async fn execute(&self, ctx: &mut Context, args: &[String]) -> Result<Capture, CommandError> {
        let args: AddDependencyArgs = parse_args(self.name(), args)?;
        let devnet = &self.env.devnet;
        let l1 = rpc_url(devnet, "L1")?;

        let mut capture = Capture::empty();
        for (chain, other) in [
            (&args.chain_a, &args.chain_b),
            (&args.chain_b, &args.chain_a),
        ] {
            let proxy = system_config_proxy(devnet, chain)?;
            tracing::info!(%chain, %proxy, "adding interop dependencies");

            let script = devkey_script(
                devnet,
                "cast send",
                DevKey::system_config_owner(chain),
                l1,
                ADD_DEPENDENCIES,
            )
            .args([proxy, args.chain_a.clone(), args.chain_b.clone()]);
            let output = self.env.runner.run(&script).await?.check("cast send")?;

            ctx.set(format!("ChainDependency.{}.{}", chain, other), true)?;
            capture.stdout.push_str(&output.stdout);
            capture.stderr.push_str(&output.stderr);
        }

        println!(
            "Dependencies added between {} and {}",
            args.chain_a, args.chain_b
        );
        Ok(capture)
    }
}
