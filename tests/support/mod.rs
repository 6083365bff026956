#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Scratch data directory for one test
pub struct TestHome {
    dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("tasks.db")
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join("config.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    /// `task` binary pointed at this directory
    pub fn cmd(&self) -> Command {
        let mut cmd = task_cmd();
        cmd.env("TASK_DIR", self.dir.path());
        cmd
    }

    /// Run a command that must succeed
    pub fn run(&self, args: &[&str]) {
        self.cmd().args(args).assert().success();
    }

    /// Run with `--json` and return the `data` member of the envelope
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .output()
            .expect("run task");
        assert!(
            output.status.success(),
            "task {args:?} failed: {}",
            String::from_utf8_lossy(&output.stdout)
        );
        let envelope: Value = serde_json::from_slice(&output.stdout).expect("json envelope");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }

    pub fn descriptions(&self, args: &[&str]) -> Vec<String> {
        let data = self.json(args);
        data["tasks"]
            .as_array()
            .expect("tasks array")
            .iter()
            .map(|task| task["description"].as_str().expect("description").to_string())
            .collect()
    }
}

pub fn task_cmd() -> Command {
    let mut cmd = Command::cargo_bin("task").expect("binary");
    cmd.env_remove("RUST_LOG");
    cmd
}
