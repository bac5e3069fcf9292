use async_trait::async_trait;
use clap::Parser;
use serde_json::Value;

use super::{DevKey, devkey_script, rpc_url, tool_json};
use crate::commands::{Capture, Command, CommandEnv, parse_args};
use crate::context::Context;
use crate::errors::CommandError;

// $1 $2 = topics, $3 = block number, $4 = inbox, $5 = origin, $6 = source chain id
const EXECUTE_MESSAGE: &str = r#"combined_hash=$(cast concat-hex "$1" "$2")
timestamp=$(cast block -f timestamp "$3")
cast send --json --private-key="$RAW_PRIVATE_KEY" "$4" \
  "executeMessage((address,uint256,uint256,uint256,uint256),address,bytes)" \
  "($5, $3, 0, $timestamp, $6)" \
  '0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa' \
  "$combined_hash""#;

/// Create an executing message on one chain for an event emitted on another.
pub struct ExecutingMessage {
    env: CommandEnv,
}

impl ExecutingMessage {
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[derive(Parser, Debug)]
struct ExecutingMessageArgs {
    /// Chain to put this Executing Message on
    chain: String,
    /// Chain where the Initiating Message is
    src_chain: String,
    /// Idempotency key for event lookup
    #[arg(long, default_value = "default")]
    key: String,
}

/// The parts of an emitted receipt an executing message refers to.
#[derive(Debug, PartialEq, Eq)]
struct Initiating {
    origin: String,
    block_number: u64,
    topics: [String; 2],
}

impl Initiating {
    fn from_receipt(key: &str, receipt: &Value) -> Result<Self, CommandError> {
        let invalid = |reason: &str| CommandError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let log = receipt
            .get("logs")
            .and_then(|logs| logs.get(0))
            .ok_or_else(|| invalid("receipt has no logs"))?;
        let origin = log
            .get("address")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("first log has no address"))?;
        let topic = |i: usize| {
            log.get("topics")
                .and_then(|t| t.get(i))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| invalid("first log needs two topics"))
        };
        let block_number = receipt
            .get("blockNumber")
            .and_then(Value::as_str)
            .and_then(parse_quantity)
            .ok_or_else(|| invalid("receipt has no hex blockNumber"))?;

        Ok(Self {
            origin: origin.to_string(),
            block_number,
            topics: [topic(0)?, topic(1)?],
        })
    }
}

/// Parse a `0x`-prefixed hex quantity (decimal is accepted too).
fn parse_quantity(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

#[async_trait]
impl Command for ExecutingMessage {
    fn name(&self) -> &str {
        "executing_message"
    }

    fn description(&self) -> Option<&str> {
        Some("Create an Executing Message referencing a prior Initiating Message.")
    }

    async fn execute(&self, ctx: &mut Context, args: &[String]) -> Result<Capture, CommandError> {
        let args: ExecutingMessageArgs = parse_args(self.name(), args)?;
        let devnet = &self.env.devnet;
        let rpc = rpc_url(devnet, &args.chain)?;

        let event_key = format!("{}.Emitted.{}", args.src_chain, args.key);
        let initiating = Initiating::from_receipt(&event_key, ctx.require(&event_key)?)?;

        // The identifier needs a numeric chain id; use the recorded one when the
        // source was given as an alias.
        let src_chain_id = ctx
            .get_str(&format!("{}.ChainID", args.src_chain))
            .unwrap_or(args.src_chain.as_str())
            .to_string();

        let [topic0, topic1] = initiating.topics;
        let script = devkey_script(
            devnet,
            "cast send",
            DevKey::user(&args.chain),
            rpc,
            EXECUTE_MESSAGE,
        )
        .args([
            topic0,
            topic1,
            initiating.block_number.to_string(),
            devnet.cross_l2_inbox.clone(),
            initiating.origin,
            src_chain_id,
        ]);
        let output = self.env.runner.run(&script).await?.check("cast send")?;

        let receipt = tool_json(&output, "cast send receipt")?;
        ctx.set(
            format!("{}.ExeMessage.{}.{}", args.chain, args.src_chain, args.key),
            receipt.clone(),
        )?;

        println!("Executing Message created: {}", receipt);
        Ok(output.into())
    }
}
