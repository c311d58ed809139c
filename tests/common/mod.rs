//! Common test utilities for execmux tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use execmux::{ExecResult, Runner};
use tempfile::TempDir;

/// Slack allowed around expected durations
pub const TIMING_SLACK: Duration = Duration::from_millis(500);

/// Run `f` and assert it took roughly `expected` (never less, at most
/// `expected + TIMING_SLACK`). Returns what `f` returned.
pub fn assert_takes_almost<T>(expected: Duration, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let value = f();
    let elapsed = start.elapsed();

    assert!(
        elapsed + Duration::from_millis(20) >= expected,
        "took {:?}, expected about {:?}",
        elapsed,
        expected
    );
    assert!(
        elapsed <= expected + TIMING_SLACK,
        "took {:?}, expected about {:?}",
        elapsed,
        expected
    );
    value
}

/// Runner used by the integration tests
pub fn local_runner() -> Runner {
    Runner::local()
}

/// Kill a result and wait until the exit is observed
pub fn kill_and_reap(result: &mut ExecResult) {
    result.kill().expect("Failed to kill");
    let deadline = Instant::now() + Duration::from_secs(5);
    while result.poll().expect("Failed to poll").is_none() {
        assert!(Instant::now() < deadline, "{} did not exit", result);
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Creates a temporary directory holding an executable shell script
pub fn create_script(name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let script_path = dir.path().join(name);
    std::fs::write(&script_path, content).expect("Failed to write script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&script_path)
            .expect("Failed to get metadata")
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script_path, perms).expect("Failed to set permissions");
    }

    (dir, script_path)
}

/// Script writing `chunks` lines of 64 KiB to stdout with short pauses
pub fn large_output_script(chunks: usize) -> String {
    format!(
        r#"#!/bin/sh
i=0
while [ $i -lt {chunks} ]; do
    head -c 65535 /dev/zero | tr '\0' "$(printf '%s' $((i % 10)))"
    echo
    sleep 0.01
    i=$((i + 1))
done
echo done >&2
"#
    )
}
