//! Command modules for a local interop devnet.
//!
//! They drive `cast`, `forge` and the monorepo's `op-node` dev-key helper
//! against the chains listed in `[devnet.rpc]`, and record what they learn
//! under `<chain>.*` keys so later steps can pick it up:
//!
//! ```text
//! relay chain_id L2_A                 -> L2_A.ChainID
//! relay deploy_emitter L2_A           -> L2_A.CreateEmitterOutput, L2_A.EmitterContractAddress
//! relay emit L2_A --key hello         -> L2_A.Emitted.hello
//! relay executing_message L2_B L2_A --key hello
//!                                     -> L2_B.ExeMessage.L2_A.hello
//! relay add_dependency 900200 900201  -> ChainDependency.900200.900201, ChainDependency.900201.900200
//! ```
//!
//! Values go to the scripts as positional parameters, never spliced into
//! the script text.

mod add_dependency;
mod chain_id;
mod deploy_emitter;
mod emit;
mod executing_message;

pub use add_dependency::AddDependency;
pub use chain_id::ChainId;
pub use deploy_emitter::DeployEmitter;
pub use emit::Emit;
pub use executing_message::ExecutingMessage;

use serde_json::Value;

use crate::config::DevnetConfig;
use crate::errors::CommandError;
use crate::exec::{ProcessOutput, Script};

/// Derives `RAW_PRIVATE_KEY` from the `OP_INTEROP_*` environment.
const DEVKEY_SECRET: &str = "RAW_PRIVATE_KEY=0x$(go run ./op-node/cmd interop devkey secret)";

/// Dev key selector understood by `op-node interop devkey`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DevKey<'a> {
    pub chain_id: &'a str,
    pub domain: &'a str,
    pub name: &'a str,
}

impl<'a> DevKey<'a> {
    pub fn user(chain_id: &'a str) -> Self {
        Self {
            chain_id,
            domain: "user",
            name: "0",
        }
    }

    pub fn system_config_owner(chain_id: &'a str) -> Self {
        Self {
            chain_id,
            domain: "chain-operator",
            name: "system-config-owner",
        }
    }
}

/// RPC URL for a chain alias.
pub(crate) fn rpc_url<'c>(devnet: &'c DevnetConfig, chain: &str) -> Result<&'c str, CommandError> {
    devnet
        .rpc
        .get(chain)
        .map(String::as_str)
        .ok_or_else(|| CommandError::UnknownChain {
            chain: chain.to_string(),
            known: devnet.rpc.keys().cloned().collect::<Vec<_>>().join(", "),
        })
}

/// A script that runs in the monorepo root with a dev key derived into
/// `$RAW_PRIVATE_KEY` before `body`.
pub(crate) fn devkey_script(
    devnet: &DevnetConfig,
    label: &str,
    key: DevKey<'_>,
    rpc_url: &str,
    body: &str,
) -> Script {
    Script::new(label, format!("set -eu\n{}\n{}\n", DEVKEY_SECRET, body))
        .current_dir(&devnet.monorepo_root)
        .env("OP_INTEROP_MNEMONIC", devnet.mnemonic.clone())
        .env("OP_INTEROP_DEVKEY_CHAINID", key.chain_id)
        .env("OP_INTEROP_DEVKEY_DOMAIN", key.domain)
        .env("OP_INTEROP_DEVKEY_NAME", key.name)
        .env("ETH_RPC_URL", rpc_url)
}

/// Parse the JSON document a tool printed. Tools like `forge` may print
/// progress lines first, so the last line that parses as JSON wins.
/// On failure the error keeps both streams.
pub(crate) fn tool_json(output: &ProcessOutput, what: &str) -> Result<Value, CommandError> {
    let trimmed = output.stdout.trim();
    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(value),
        Err(source) => trimmed
            .lines()
            .rev()
            .filter(|line| line.trim_start().starts_with('{'))
            .find_map(|line| serde_json::from_str(line.trim()).ok())
            .ok_or_else(|| CommandError::InvalidOutput {
                what: what.to_string(),
                source,
                stdout: output.stdout.clone(),
                stderr: output.stderr.clone(),
            }),
    }
}
