//! Test helpers for behavioral specifications.
//!
//! Provides a high-level DSL for driving the `legion` CLI as a
//! black box: spawn a process, assert on stdout/stderr/exit code.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Returns the path to a binary, checking llvm-cov's target directory
/// first, then falling back to resolving relative to this test binary
/// itself (CARGO_MANIFEST_DIR can be stale under some coverage setups).
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

fn legion_binary() -> PathBuf {
    std::env::var("CARGO_BIN_EXE_legion")
        .map(PathBuf::from)
        .unwrap_or_else(|_| binary_path("legion"))
}

fn legion_cmd() -> Command {
    Command::new(legion_binary())
}

/// Start a CLI builder for a `legion` invocation.
pub fn cli() -> CliBuilder {
    CliBuilder::new()
}

/// Fluent builder for one `legion` invocation.
pub struct CliBuilder {
    args: Vec<String>,
    dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl CliBuilder {
    fn new() -> Self {
        Self {
            args: Vec::new(),
            dir: None,
            envs: Vec::new(),
        }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn pwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.dir = Some(path.into());
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.envs.push((key.to_string(), value.as_ref().to_string()));
        self
    }

    pub fn command(self) -> Command {
        let mut cmd = legion_cmd();
        cmd.args(&self.args);
        if let Some(dir) = self.dir {
            cmd.current_dir(dir);
        }
        for (key, value) in self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    /// Run and expect success (exit code 0).
    pub fn passes(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    /// Run and expect failure (non-zero exit code).
    pub fn fails(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            !output.status.success(),
            "expected command to fail, but it passed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    /// Run and expect a specific exit code.
    pub fn fails_with(self, code: i32) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert_eq!(
            output.status.code(),
            Some(code),
            "stdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }
}

/// Result of a CLI run, for chaining assertions.
pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    /// Parse stdout as JSON (every command emits JSON by default).
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout())
            .unwrap_or_else(|e| panic!("stdout is not valid JSON: {e}\nstdout: {}", self.stdout()))
    }

    /// Asserts stdout parses to exactly `expected`, with a readable
    /// field-by-field diff on mismatch instead of two dumped blobs.
    pub fn json_is(self, expected: serde_json::Value) -> Self {
        similar_asserts::assert_eq!(self.json(), expected);
        self
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(stdout.contains(expected), "stdout does not contain '{expected}'\nstdout: {stdout}");
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(stderr.contains(expected), "stderr does not contain '{expected}'\nstderr: {stderr}");
        self
    }
}

/// Poll a condition until it returns true or the timeout elapses.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(timeout_ms);
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    false
}

/// An isolated fleet: its own datastore file, work dir, and docs dir,
/// so tests never share state with one another.
pub struct Fleet {
    dir: tempfile::TempDir,
}

impl Fleet {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("minion.db")
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.dir.path().join("docs")
    }

    /// Write a flow document under `docs/flows/<name>.toml`.
    pub fn flow(&self, name: &str, content: &str) {
        let flows_dir = self.docs_dir().join("flows");
        std::fs::create_dir_all(&flows_dir).unwrap();
        std::fs::write(flows_dir.join(format!("{name}.toml")), content).unwrap();
    }

    /// Run `legion` scoped to this fleet, acting as `caller` with
    /// authorization class `class`.
    pub fn legion(&self, caller: &str, class: &str) -> CliBuilder {
        cli()
            .env("DOCS_DIR", self.docs_dir().to_str().unwrap())
            .args(&["--db", self.db_path().to_str().unwrap()])
            .args(&["--project", "demo", "--as", caller, "--class", class])
    }
}
