//! CLI tests for the sq-core binary.
//!
//! Every test runs against a config file in a temp dir so the user's own
//! configuration never leaks in.

mod support;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::PathBuf;
use support::{write_file, FORK_PROBLEM};
use tempfile::TempDir;

/// Get a Command for the sq-core binary.
fn sq_core() -> Command {
    let mut cmd = Command::cargo_bin("sq-core").expect("sq-core binary should exist");
    cmd.env_remove("SQ_CONFIG")
        .env_remove("SQ_CONFIG_DIR")
        .env("SQ_LOG", "error");
    cmd
}

struct Fixture {
    dir: TempDir,
    config: PathBuf,
    problem: PathBuf,
}

impl Fixture {
    fn new(config_json: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let config = write_file(dir.path(), "config.json", config_json);
        let problem = write_file(dir.path(), "problem.json", FORK_PROBLEM);
        Self {
            dir,
            config,
            problem,
        }
    }

    fn cmd(&self, args: &[&str]) -> Command {
        let mut cmd = sq_core();
        cmd.arg("--config").arg(&self.config).args(args);
        cmd
    }
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// ============================================================================
// search
// ============================================================================

mod search {
    use super::*;

    #[test]
    fn reports_relevant_constraints() {
        let fx = Fixture::new("{}");
        let output = fx
            .cmd(&["search"])
            .arg(&fx.problem)
            .assert()
            .success()
            .get_output()
            .clone();
        let json = stdout_json(&output);
        assert_eq!(json["relevant"], serde_json::json!([0, 1]));
        assert_eq!(json["complete"], true);
        assert_eq!(json["mode"], "incremental");
        assert_eq!(json["dominating"].as_array().map(Vec::len), Some(3));
        assert!(json["schema_version"].is_string());
    }

    #[test]
    fn brute_force_agrees() {
        let fx = Fixture::new("{}");
        let output = fx
            .cmd(&["search", "--brute-force", "--no-prune"])
            .arg(&fx.problem)
            .assert()
            .success()
            .get_output()
            .clone();
        let json = stdout_json(&output);
        assert_eq!(json["relevant"], serde_json::json!([0, 1]));
        assert_eq!(json["stats"]["evaluated"], 4);
    }

    #[test]
    fn exhausted_budget_is_incomplete() {
        let fx = Fixture::new("{}");
        let output = fx
            .cmd(&["search", "--budget", "0"])
            .arg(&fx.problem)
            .assert()
            .code(1)
            .get_output()
            .clone();
        assert_eq!(stdout_json(&output)["complete"], false);
    }

    #[test]
    fn unusable_budget_is_args_error() {
        let fx = Fixture::new("{}");
        for budget in ["-1", "NaN", "inf"] {
            fx.cmd(&["search", "--budget", budget])
                .arg(&fx.problem)
                .assert()
                .code(10)
                .stdout(predicate::str::is_empty())
                .stderr(predicate::str::contains("--budget"))
                .stderr(predicate::str::contains("\"status\": \"error\""));
        }
    }

    #[test]
    fn missing_problem_file_is_io_error() {
        let fx = Fixture::new("{}");
        fx.cmd(&["search"])
            .arg(fx.dir.path().join("nope.json"))
            .assert()
            .code(21)
            .stderr(predicate::str::contains("\"status\": \"error\""));
    }

    #[test]
    fn malformed_problem_is_problem_error() {
        let fx = Fixture::new("{}");
        let bad = write_file(fx.dir.path(), "bad.json", r#"{"states": 2}"#);
        fx.cmd(&["search"]).arg(&bad).assert().code(12);
    }
}

// ============================================================================
// query / session
// ============================================================================

mod queries {
    use super::*;

    #[test]
    fn myopic_query_reports_evoi() {
        let fx = Fixture::new("{}");
        let output = fx
            .cmd(&["query"])
            .arg(&fx.problem)
            .assert()
            .success()
            .get_output()
            .clone();
        let json = stdout_json(&output);
        assert_eq!(json["method"], "myopic");
        assert_eq!(json["query"]["kind"], "constraint");
        assert_eq!(json["query"]["payload"], 0);
        let evoi = json["evoi"].as_f64().expect("evoi is a number");
        assert!((evoi - 0.15).abs() < 1e-9, "evoi = {evoi}");
        assert!((json["prior_value"].as_f64().unwrap() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn expensive_queries_are_not_asked() {
        let fx = Fixture::new(r#"{"query": {"cost_of_query": 5.0}}"#);
        let output = fx
            .cmd(&["query"])
            .arg(&fx.problem)
            .assert()
            .success()
            .get_output()
            .clone();
        assert!(stdout_json(&output)["query"].is_null());
    }

    #[test]
    fn sampling_query_is_seeded() {
        let fx = Fixture::new("{}");
        let run = || {
            let output = fx
                .cmd(&["query", "--method", "sampling", "--seed", "7"])
                .arg(&fx.problem)
                .assert()
                .success()
                .get_output()
                .clone();
            let json = stdout_json(&output);
            assert_eq!(json["method"], "sampling");
            assert!(json["evoi"].is_null());
            json["query"].clone()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn myopic_session_finds_the_true_optimum() {
        let fx = Fixture::new(r#"{"query": {"cost_of_query": 0.01}}"#);
        let output = fx
            .cmd(&["session"])
            .arg(&fx.problem)
            .assert()
            .success()
            .get_output()
            .clone();
        let session = &stdout_json(&output)["session"];
        assert_eq!(session["method"], "myopic");
        assert_eq!(session["stop_reason"], "no_query");
        assert_eq!(session["true_value"], 1.0);
        assert_eq!(session["queries"][0]["answer"], "free");
    }

    #[test]
    fn session_respects_round_limit() {
        let fx = Fixture::new(r#"{"query": {"cost_of_query": 0.01}}"#);
        let output = fx
            .cmd(&["session", "--max-rounds", "1"])
            .arg(&fx.problem)
            .assert()
            .success()
            .get_output()
            .clone();
        let session = &stdout_json(&output)["session"];
        assert_eq!(session["rounds"], 1);
        assert_eq!(session["stop_reason"], "max_rounds");
    }

    #[test]
    fn session_without_truth_fails() {
        let fx = Fixture::new("{}");
        let mut problem: Value = serde_json::from_str(FORK_PROBLEM).unwrap();
        problem.as_object_mut().unwrap().remove("truth");
        let path = write_file(fx.dir.path(), "no_truth.json", &problem.to_string());
        fx.cmd(&["session"])
            .arg(&path)
            .assert()
            .code(12)
            .stderr(predicate::str::contains("truth"));
    }
}

// ============================================================================
// config
// ============================================================================

mod config {
    use super::*;

    #[test]
    fn show_prints_effective_config() {
        let fx = Fixture::new(r#"{"query": {"cost_of_query": 0.3}}"#);
        let output = fx
            .cmd(&["config", "show"])
            .assert()
            .success()
            .get_output()
            .clone();
        let json = stdout_json(&output);
        assert_eq!(json["config"]["query"]["cost_of_query"], 0.3);
        assert_eq!(json["config"]["oracle"]["backend"], "path");
        assert_eq!(json["source"], "CLI argument");
    }

    #[test]
    fn validate_accepts_good_config() {
        let fx = Fixture::new(r#"{"search": {"early_stop_secs": 2.0}}"#);
        fx.cmd(&["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"valid\""));
    }

    #[test]
    fn validate_rejects_negative_cost() {
        let fx = Fixture::new(r#"{"query": {"cost_of_query": -1.0}}"#);
        fx.cmd(&["config", "validate"]).assert().code(11);
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let fx = Fixture::new(r#"{"oracle": {"backend": "simplex"}}"#);
        fx.cmd(&["search"])
            .arg(&fx.problem)
            .assert()
            .code(11)
            .stderr(predicate::str::contains("simplex"));
    }

    #[test]
    fn missing_config_file_fails() {
        sq_core()
            .args(["--config", "/nonexistent/sq/config.toml", "config", "show"])
            .assert()
            .code(11);
    }
}

// ============================================================================
// argument errors
// ============================================================================

mod arguments {
    use super::*;

    #[test]
    fn unknown_command_fails() {
        sq_core()
            .arg("nonexistent-command")
            .assert()
            .failure()
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn unknown_method_fails() {
        sq_core()
            .args(["query", "p.json", "--method", "greedy"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("greedy"));
    }

    #[test]
    fn help_lists_commands() {
        sq_core()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("search"))
            .stdout(predicate::str::contains("session"));
    }
}
