//! Integration tests for relay
//!
//! Each test drives the real binary in a temporary directory, so every
//! `relay` call below is a separate process sharing state only through the
//! context file.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a relay Command running in `dir`
fn relay(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("relay");
    cmd.current_dir(dir.path())
        .env_remove("RELAY_CONTEXT")
        .env_remove("RELAY_LOG");
    cmd
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

fn write_config(dir: &TempDir, content: &str) {
    fs::write(dir.path().join("relay.toml"), content).unwrap();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_relay_help() {
        let dir = create_temp_project();
        relay(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--context"));
    }

    #[test]
    fn test_relay_version() {
        let dir = create_temp_project();
        relay(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_no_command_prints_listing() {
        let dir = create_temp_project();
        relay(&dir)
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Available commands:"))
            .stderr(predicate::str::contains("chain_id:"));
    }

    #[test]
    fn test_unknown_command_lists_all_commands() {
        let dir = create_temp_project();
        relay(&dir)
            .arg("bogus")
            .assert()
            .failure()
            .code(2)
            .stderr(predicate::str::contains("Command 'bogus' not found"))
            .stderr(predicate::str::contains("  get: "))
            .stderr(predicate::str::contains("  set: "))
            .stderr(predicate::str::contains("  add_dependency: "));

        // Nothing ran, so nothing was written.
        assert!(!dir.path().join("context.json").exists());
    }
}

// =============================================================================
// Context Store Tests
// =============================================================================

mod context_store {
    use super::*;

    #[test]
    fn test_value_persists_across_invocations() {
        let dir = create_temp_project();

        relay(&dir)
            .args(["set", "chainA.id", "900200"])
            .assert()
            .success();

        relay(&dir)
            .args(["get", "chainA.id"])
            .assert()
            .success()
            .stdout(predicate::str::diff("900200\n"));
    }

    #[test]
    fn test_backing_file_is_pretty_json() {
        let dir = create_temp_project();

        relay(&dir).args(["set", "b", "2"]).assert().success();
        relay(&dir)
            .args(["set", "a", "[1]", "--json"])
            .assert()
            .success();

        let content = fs::read_to_string(dir.path().join("context.json")).unwrap();
        assert_eq!(
            content,
            "{\n    \"a\": [\n        1\n    ],\n    \"b\": \"2\"\n}\n"
        );
    }

    #[test]
    fn test_get_missing_key_names_the_key() {
        let dir = create_temp_project();
        relay(&dir)
            .args(["get", "L2_A.EmitterContractAddress"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("L2_A.EmitterContractAddress"))
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn test_unset_and_keys() {
        let dir = create_temp_project();
        relay(&dir).args(["set", "L2_A.ChainID", "900200"]).assert().success();
        relay(&dir).args(["set", "L2_B.ChainID", "900201"]).assert().success();
        relay(&dir).args(["set", "L2_AB", "x"]).assert().success();

        relay(&dir)
            .args(["keys", "L2_A"])
            .assert()
            .success()
            .stdout(predicate::str::diff("L2_A.ChainID\n"));

        relay(&dir).args(["unset", "L2_A.ChainID"]).assert().success();
        relay(&dir)
            .args(["get", "L2_A.ChainID"])
            .assert()
            .code(1);
    }

    #[test]
    fn test_corrupt_context_is_a_store_failure() {
        let dir = create_temp_project();
        fs::write(dir.path().join("context.json"), "{ not json").unwrap();

        relay(&dir)
            .args(["get", "anything"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("Command 'get'"))
            .stderr(predicate::str::contains("not valid JSON"));
    }

    #[test]
    fn test_set_invalid_json_is_a_usage_error() {
        let dir = create_temp_project();
        relay(&dir)
            .args(["set", "flags", "{oops", "--json"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Value for 'flags' is not valid JSON"));
    }

    #[test]
    fn test_verbose_get_prints_value_once() {
        let dir = create_temp_project();
        relay(&dir).args(["set", "chainA.id", "900200"]).assert().success();

        let output = relay(&dir)
            .args(["--verbose", "get", "chainA.id"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert_eq!(stdout.matches("900200").count(), 1);
    }

    #[test]
    fn test_context_path_from_flag_and_env() {
        let dir = create_temp_project();

        relay(&dir)
            .args(["--context", "state/one.json", "set", "k", "flag"])
            .assert()
            .success();
        assert!(dir.path().join("state/one.json").exists());

        relay(&dir)
            .env("RELAY_CONTEXT", "state/one.json")
            .args(["get", "k"])
            .assert()
            .success()
            .stdout(predicate::str::diff("flag\n"));
    }

    #[test]
    fn test_context_path_from_config() {
        let dir = create_temp_project();
        write_config(&dir, "[context]\npath = \"ctx/devnet.json\"\nwrite = \"direct\"\n");

        relay(&dir).args(["set", "k", "v"]).assert().success();
        assert!(dir.path().join("ctx/devnet.json").exists());
        assert!(!dir.path().join("context.json").exists());
    }

    #[test]
    fn test_locked_context_fails_fast() {
        let dir = create_temp_project();
        let held = relay::context::Context::load(
            dir.path().join("context.json"),
            relay::context::ContextOptions::default(),
        )
        .unwrap();

        relay(&dir)
            .args(["set", "k", "v"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("in use"));

        relay(&dir)
            .args(["--no-lock", "set", "k", "v"])
            .assert()
            .success();

        drop(held);
    }
}

// =============================================================================
// Command Module Tests
// =============================================================================

mod command_modules {
    use super::*;

    #[test]
    fn test_verbose_prints_captured_streams() {
        let dir = create_temp_project();
        fs::write(dir.path().join("marker.txt"), "").unwrap();

        relay(&dir)
            .args(["--verbose", "ls"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ls - OUT:"))
            .stdout(predicate::str::contains("marker.txt"))
            .stdout(predicate::str::contains("--\nls - ERR:"));

        let content = fs::read_to_string(dir.path().join("context.json")).unwrap();
        assert!(content.contains("\"directory_listing\""));
    }

    #[test]
    fn test_script_command_writes_back_to_context() {
        let dir = create_temp_project();
        write_config(
            &dir,
            r#"
[[commands]]
name = "mark"
description = "Record a marker"
run = "printf '{\"set\": {\"marked\": \"%s\"}}' \"$1\""
"#,
        );

        relay(&dir)
            .assert()
            .code(2)
            .stderr(predicate::str::contains("  mark: Record a marker"));

        relay(&dir).args(["mark", "yes"]).assert().success();
        relay(&dir)
            .args(["get", "marked"])
            .assert()
            .success()
            .stdout(predicate::str::diff("yes\n"));
    }

    #[test]
    fn test_failing_script_surfaces_stderr() {
        let dir = create_temp_project();
        write_config(
            &dir,
            r#"
[[commands]]
name = "broken_tool"
run = "echo 'rpc unavailable' >&2; exit 7"
"#,
        );

        relay(&dir)
            .arg("broken_tool")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("exit code 7"))
            .stderr(predicate::str::contains("rpc unavailable"));
    }

    #[test]
    fn test_malformed_set_reply_fails_and_shows_output() {
        let dir = create_temp_project();
        write_config(
            &dir,
            r#"
[[commands]]
name = "bad_reply"
run = "echo '{\"set\": [\"marked\"]}'"
"#,
        );

        relay(&dir)
            .arg("bad_reply")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Could not parse 'bad_reply' reply"))
            .stderr(predicate::str::contains(r#"{"set": ["marked"]}"#));

        relay(&dir).args(["get", "marked"]).assert().code(1);
    }

    #[test]
    fn test_command_without_entry_point_is_malformed() {
        let dir = create_temp_project();
        write_config(
            &dir,
            r#"
[[commands]]
name = "half_done"
"#,
        );

        relay(&dir)
            .arg("half_done")
            .assert()
            .code(4)
            .stderr(predicate::str::contains("cannot run"))
            .stderr(predicate::str::contains("  half_done: No description available."));
    }

    #[test]
    fn test_unknown_chain_is_a_usage_error() {
        let dir = create_temp_project();
        relay(&dir)
            .args(["chain_id", "L9"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Unknown chain 'L9'"));
    }

    #[test]
    fn test_missing_command_argument_is_a_usage_error() {
        let dir = create_temp_project();
        relay(&dir)
            .arg("emit")
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Usage"));
    }

    #[test]
    fn test_emit_needs_deployed_emitter() {
        let dir = create_temp_project();
        relay(&dir)
            .args(["emit", "L2_A", "--key", "hello"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("L2_A.EmitterContractAddress"));
    }
}
