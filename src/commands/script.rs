//! Commands declared in `relay.toml` under `[[commands]]`.
//!
//! The script runs through the shell with the trailing args as `$1..$n`.
//! It receives the current context as JSON on stdin and the environment
//! variables `RELAY_CONTEXT` (backing path) and `RELAY_COMMAND` (its name).
//!
//! A script can write back to the context by printing a JSON object with a
//! `set` member as its stdout:
//!
//! ```json
//! {"set": {"L2_A.Ready": true, "L2_A.Port": 9145}}
//! ```
//!
//! Each entry goes through the normal write-through `set`, in key order.
//! Any other stdout is just captured.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{Capture, Command};
use crate::config::ScriptCommandConfig;
use crate::context::Context;
use crate::errors::{CommandError, RegistryError};
use crate::exec::{Runner, Script};
use crate::registry::Registry;

pub struct ScriptCommand {
    name: String,
    description: Option<String>,
    run: String,
    working_dir: PathBuf,
    runner: Arc<dyn Runner>,
}

#[derive(Debug, Deserialize)]
struct ScriptReply {
    set: Map<String, Value>,
}

impl ScriptCommand {
    pub fn new(
        name: impl Into<String>,
        run: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        runner: Arc<dyn Runner>,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            run: run.into(),
            working_dir: working_dir.into(),
            runner,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

#[async_trait]
impl Command for ScriptCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    async fn execute(&self, ctx: &mut Context, args: &[String]) -> Result<Capture, CommandError> {
        let snapshot = serde_json::to_string(&ctx.snapshot())
            .map_err(|e| CommandError::Other(anyhow::Error::new(e)))?;

        let script = Script::new(self.name.clone(), self.run.clone())
            .current_dir(&self.working_dir)
            .env(crate::config::CONTEXT_ENV, ctx.path().display().to_string())
            .env("RELAY_COMMAND", self.name.clone())
            .args(args.iter().cloned())
            .stdin(snapshot);

        let output = self.runner.run(&script).await?.check(&self.name)?;

        let reply = parse_reply(&output.stdout).map_err(|source| CommandError::InvalidOutput {
            what: format!("'{}' reply", self.name),
            source,
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
        })?;
        if let Some(reply) = reply {
            for (key, value) in reply.set {
                ctx.set(key, value)?;
            }
        }

        Ok(output.into())
    }
}

/// A reply is a JSON object with a `set` member. Anything else is plain
/// output; a reply that doesn't parse as one is an error.
fn parse_reply(stdout: &str) -> Result<Option<ScriptReply>, serde_json::Error> {
    let trimmed = stdout.trim();
    if !trimmed.starts_with('{') {
        return Ok(None);
    }
    let first = serde_json::Deserializer::from_str(trimmed)
        .into_iter::<Value>()
        .next();
    match first {
        Some(Ok(Value::Object(object))) if object.contains_key("set") => {
            serde_json::from_str(trimmed).map(Some)
        }
        _ => Ok(None),
    }
}

/// Register every `[[commands]]` entry. Entries without a `run` are
/// registered as malformed.
pub fn register_all(
    registry: &mut Registry,
    entries: &[ScriptCommandConfig],
    base_dir: &Path,
    runner: &Arc<dyn Runner>,
) -> Result<(), RegistryError> {
    for entry in entries {
        let name = entry.name.trim();
        if name.is_empty() {
            tracing::warn!("skipping [[commands]] entry without a name");
            continue;
        }

        match entry.run.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(run) => {
                let working_dir = match &entry.working_dir {
                    Some(dir) if dir.is_absolute() => dir.clone(),
                    Some(dir) => base_dir.join(dir),
                    None => base_dir.to_path_buf(),
                };
                let command = ScriptCommand::new(name, run, working_dir, runner.clone())
                    .with_description(entry.description.clone());
                registry.register(Arc::new(command))?;
            }
            None => {
                registry.register_malformed(
                    name,
                    entry.description.clone(),
                    "declared in relay.toml without a 'run' entry",
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextOptions, WriteMode};
    use crate::exec::ShellRunner;
    use crate::exec::testing::StubRunner;
    use serde_json::json;

    fn context(dir: &tempfile::TempDir) -> Context {
        let options = ContextOptions {
            write_mode: WriteMode::Atomic,
            lock: false,
        };
        Context::load(dir.path().join("context.json"), options).unwrap()
    }

    #[tokio::test]
    async fn test_reply_sets_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir);
        let runner = Arc::new(StubRunner::new().ok(r#"{"set": {"b": 2, "a": "one"}}"#));
        let cmd = ScriptCommand::new("boot", "./boot.sh", dir.path(), runner.clone());

        cmd.execute(&mut ctx, &["x".to_string()]).await.unwrap();

        assert_eq!(ctx.get("a"), Some(&json!("one")));
        assert_eq!(ctx.get("b"), Some(&json!(2)));

        let script = &runner.scripts()[0];
        assert_eq!(script.args, vec!["x".to_string()]);
        assert!(script.env.iter().any(|(k, v)| k == "RELAY_COMMAND" && v == "boot"));
        assert_eq!(script.stdin.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_plain_stdout_is_only_captured() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir);
        let runner = Arc::new(StubRunner::new().ok("all good\n"));
        let cmd = ScriptCommand::new("boot", "./boot.sh", dir.path(), runner);

        let capture = cmd.execute(&mut ctx, &[]).await.unwrap();
        assert_eq!(capture.stdout, "all good\n");
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_external_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir);
        let runner = Arc::new(StubRunner::new().fail(5, "boom"));
        let cmd = ScriptCommand::new("boot", "./boot.sh", dir.path(), runner);

        let err = cmd.execute(&mut ctx, &[]).await.unwrap_err();
        assert!(matches!(err, CommandError::External { status: Some(5), .. }));
    }

    #[tokio::test]
    async fn test_script_sees_context_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir);
        ctx.set("L2_A.ChainID", "900200").unwrap();
        let runner: Arc<dyn Runner> = Arc::new(ShellRunner::default());
        let cmd = ScriptCommand::new(
            "echo_ctx",
            r#"input=$(cat); printf '{"set": {"seen": %s, "arg": "%s"}}' "$input" "$1""#,
            dir.path(),
            runner,
        );

        cmd.execute(&mut ctx, &["first".to_string()]).await.unwrap();

        assert_eq!(ctx.get("seen"), Some(&json!({"L2_A.ChainID": "900200"})));
        assert_eq!(ctx.get("arg"), Some(&json!("first")));
    }

    #[test]
    fn test_register_all_marks_missing_run_as_malformed() {
        let mut registry = Registry::new();
        let runner: Arc<dyn Runner> = Arc::new(StubRunner::new());
        let entries = vec![
            ScriptCommandConfig {
                name: "ok".into(),
                run: Some("true".into()),
                ..Default::default()
            },
            ScriptCommandConfig {
                name: "broken".into(),
                description: Some("Never finished".into()),
                run: Some("   ".into()),
                ..Default::default()
            },
            ScriptCommandConfig::default(),
        ];

        register_all(&mut registry, &entries, Path::new("/work"), &runner).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("ok").is_ok());
        assert!(matches!(
            registry.resolve("broken").err(),
            Some(RegistryError::Malformed { .. })
        ));
    }

    #[test]
    fn test_parse_reply_ignores_other_output() {
        assert!(parse_reply(r#"{"status": "ok"}"#).unwrap().is_none());
        assert!(parse_reply("[1,2]").unwrap().is_none());
        assert!(parse_reply("{ not json at all").unwrap().is_none());
        assert!(parse_reply(r#"  {"set": {}}  "#).unwrap().is_some());
    }

    #[test]
    fn test_parse_reply_rejects_malformed_set() {
        assert!(parse_reply(r#"{"set": ["L2_A.Ready", true]}"#).is_err());
        assert!(parse_reply(r#"{"set": {"k": 1}} trailing"#).is_err());
    }

    #[tokio::test]
    async fn test_malformed_reply_fails_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir);
        let runner = Arc::new(StubRunner::new().ok(r#"{"set": ["L2_A.Ready", true]}"#));
        let cmd = ScriptCommand::new("boot", "./boot.sh", dir.path(), runner);

        let err = cmd.execute(&mut ctx, &[]).await.unwrap_err();

        assert!(matches!(&err, CommandError::InvalidOutput { what, .. } if what == "'boot' reply"));
        assert_eq!(err.captured().map(|(out, _)| out), Some(r#"{"set": ["L2_A.Ready", true]}"#));
        assert!(ctx.is_empty());
    }
}
