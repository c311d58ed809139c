//! End-to-end behaviour of the runner entry points on real processes

#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{assert_takes_almost, create_script, kill_and_reap, large_output_script, local_runner};
use execmux::{wait_async, ExecError, ExecOptions, RemoteLauncher, Runner};

#[test]
fn test_execute_echo() {
    let result = local_runner()
        .execute("echo hello", &ExecOptions::default())
        .unwrap();

    assert_eq!(result.exit_code(), Some(0));
    assert_eq!(result.stdout(), b"hello\n");
    assert!(result.stderr().is_empty());
}

#[test]
fn test_execute_captures_stderr_separately() {
    let result = local_runner()
        .execute("echo out; echo err >&2", &ExecOptions::default())
        .unwrap();

    assert_eq!(result.stdout(), b"out\n");
    assert_eq!(result.stderr(), b"err\n");
}

#[test]
fn test_execute_argv_without_shell() {
    let result = local_runner()
        .execute(
            ["printf", "%s|", "a b", "$HOME"],
            &ExecOptions::default().without_shell(),
        )
        .unwrap();

    assert_eq!(result.stdout(), b"a b|$HOME|");
}

#[test]
fn test_execute_argv_through_shell_is_quoted() {
    let result = local_runner()
        .execute(["echo", "hello   there"], &ExecOptions::default())
        .unwrap();

    assert_eq!(result.stdout(), b"hello   there\n");
}

#[test]
fn test_stdin_round_trip() {
    let result = local_runner()
        .execute("cat", &ExecOptions::default().with_stdin("hello"))
        .unwrap();

    assert_eq!(result.stdout(), b"hello");
}

#[test]
fn test_stdin_through_pipeline() {
    let result = local_runner()
        .execute("cat | cat", &ExecOptions::default().with_stdin("hello"))
        .unwrap();

    assert_eq!(result.stdout(), b"hello");
}

#[test]
fn test_stdin_sees_eof_without_payload() {
    let result = assert_takes_almost(Duration::ZERO, || {
        local_runner()
            .execute("cat", &ExecOptions::default())
            .unwrap()
    });

    assert!(result.stdout().is_empty());
}

#[test]
fn test_background_descendant_does_not_hold_up_execute() {
    // The subshell keeps stdout's write end open long after `sh` exits.
    let result = assert_takes_almost(Duration::ZERO, || {
        local_runner()
            .execute("echo hi; (sleep 2; echo late) &", &ExecOptions::default())
            .unwrap()
    });

    assert_eq!(result.exit_code(), Some(0));
    assert_eq!(result.stdout(), b"hi\n");
    assert!(result.stderr().is_empty());
}

#[test]
fn test_nonzero_exit_without_assert() {
    let result = local_runner()
        .execute("false", &ExecOptions::default())
        .unwrap();

    assert_eq!(result.exit_code(), Some(1));
}

#[test]
fn test_execute_assert_success_carries_output() {
    let err = local_runner()
        .execute_assert_success(
            "echo some output; echo some error >&2; exit 7",
            &ExecOptions::default(),
        )
        .unwrap_err();

    assert!(err.is_execution_error());
    assert!(!err.is_timeout());
    match err {
        ExecError::Execution(e) => {
            assert_eq!(e.exit_code, 7);
            assert_eq!(e.stdout, b"some output\n");
            assert_eq!(e.stderr, b"some error\n");
            assert!(e.command.contains("exit 7"));
        }
        other => panic!("Expected Execution error, got {:?}", other),
    }
}

#[test]
fn test_execute_assert_success_passes_on_zero() {
    let result = local_runner()
        .execute_assert_success("true", &ExecOptions::default())
        .unwrap();

    assert_eq!(result.exit_code(), Some(0));
}

#[test]
fn test_async_execution_returns_immediately() {
    let runner = local_runner();

    let mut result = assert_takes_almost(Duration::ZERO, || {
        runner
            .execute_async("sleep 1", &ExecOptions::default())
            .unwrap()
    });
    assert!(!result.is_finished().unwrap());
    assert_eq!(result.exit_code(), None);

    let finished = assert_takes_almost(Duration::from_secs(1), || result.wait(None).unwrap());
    assert!(finished);
    assert_eq!(result.exit_code(), Some(0));
}

#[test]
fn test_timeout_raises_and_leaves_process_running() {
    let err = assert_takes_almost(Duration::from_secs(1), || {
        local_runner()
            .execute("sleep 100", &ExecOptions::default().with_timeout_secs(1))
            .unwrap_err()
    });

    assert!(err.is_execution_error());
    match err {
        ExecError::Timeout(mut timed_out) => {
            let mut result = timed_out.take_result().unwrap();
            assert!(!result.is_finished().unwrap());
            assert_eq!(result.pid(), timed_out.pid);
            kill_and_reap(&mut result);
            assert_eq!(result.exit_code(), Some(-15));
        }
        other => panic!("Expected Timeout error, got {:?}", other),
    }
}

#[test]
fn test_wait_timeout_on_held_result() {
    let mut result = local_runner()
        .execute_async("sleep 100", &ExecOptions::default())
        .unwrap();

    let err = assert_takes_almost(Duration::from_millis(300), || {
        result.wait(Some(Duration::from_millis(300))).unwrap_err()
    });

    match err {
        ExecError::Timeout(timed_out) => assert!(timed_out.result.is_none()),
        other => panic!("Expected Timeout error, got {:?}", other),
    }
    assert!(!result.is_finished().unwrap());
    kill_and_reap(&mut result);
}

#[test]
fn test_deadline_is_absolute_across_waits() {
    let mut result = local_runner()
        .execute_async(
            "sleep 100",
            &ExecOptions::default().with_timeout(Duration::from_millis(600)),
        )
        .unwrap();

    // The first wait finds nothing; the deadline set at launch keeps running.
    assert_takes_almost(Duration::from_millis(200), || {
        result.wait(Some(Duration::from_millis(200))).unwrap_err()
    });
    assert_takes_almost(Duration::from_millis(400), || result.wait(None).unwrap_err());

    kill_and_reap(&mut result);
}

#[test]
fn test_kill_then_wait() {
    let mut result = local_runner()
        .execute_async("sleep 100", &ExecOptions::default())
        .unwrap();

    result.kill().unwrap();
    assert!(result.wait(Some(Duration::from_secs(5))).unwrap());
    assert_eq!(result.exit_code(), Some(-15));

    // Killing a finished process is a no-op
    result.kill().unwrap();
}

#[test]
fn test_large_output_is_fully_captured() {
    let chunks = 8;
    let (_dir, script) = create_script("big.sh", &large_output_script(chunks));

    let result = local_runner()
        .execute(script.to_str().unwrap(), &ExecOptions::default())
        .unwrap();

    let stdout = result.stdout();
    assert_eq!(stdout.len(), chunks * 64 * 1024);
    for (i, line) in stdout.split(|b| *b == b'\n').take(chunks).enumerate() {
        let digit = b'0' + (i % 10) as u8;
        assert_eq!(line.len(), 65535);
        assert!(line.iter().all(|b| *b == digit), "line {} corrupted", i);
    }
    assert_eq!(result.stderr(), b"done\n");
}

#[test]
fn test_large_stdin_round_trip() {
    let input = (0..200_000).map(|i| (b'a' + (i % 26) as u8) as char).collect::<String>();

    let result = local_runner()
        .execute("cat", &ExecOptions::default().with_stdin(input.clone()))
        .unwrap();

    assert_eq!(result.stdout(), input.as_bytes());
}

#[test]
fn test_output_is_stable_after_finish() {
    let mut result = local_runner()
        .execute("echo once", &ExecOptions::default())
        .unwrap();
    assert!(result.is_finished().unwrap());

    let first = result.stdout().to_vec();
    result.poll().unwrap();
    result.wait(None).unwrap();

    assert_eq!(result.stdout(), first.as_slice());
    assert_eq!(result.stdout(), result.stdout());
}

#[test]
fn test_partial_output_visible_while_running() {
    let mut result = local_runner()
        .execute_async("echo early; sleep 100", &ExecOptions::default())
        .unwrap();

    result.wait(Some(Duration::from_millis(300))).unwrap_err();

    assert_eq!(result.stdout(), b"early\n");
    kill_and_reap(&mut result);
}

#[test]
fn test_display_names_pid_and_command() {
    let result = local_runner()
        .execute("echo repr", &ExecOptions::default())
        .unwrap();

    assert_eq!(
        result.to_string(),
        format!("<pid {}: echo repr>", result.pid())
    );
}

#[test]
fn test_env_and_clear_env() {
    let result = local_runner()
        .execute(
            "echo \"$ONLY_THIS\" \"${HOME:-unset}\"",
            &ExecOptions::default()
                .with_clear_env()
                .with_env("ONLY_THIS", "here"),
        )
        .unwrap();

    assert_eq!(result.stdout(), b"here unset\n");
}

#[test]
fn test_spawn_failure_is_reported() {
    let err = local_runner()
        .execute(
            ["/nonexistent/binary"],
            &ExecOptions::default().without_shell(),
        )
        .unwrap_err();

    assert!(matches!(err, ExecError::SpawnFailed { .. }));
}

#[test]
fn test_remote_runner_goes_through_ssh_command() {
    // "sh -c <quoted command>" stands in for "ssh <host> <quoted command>":
    // the far side gets one word and hands it to a shell.
    let runner = Runner::new(RemoteLauncher::new("-c").with_ssh_command("sh"));

    let result = runner
        .execute(["echo", "hello \"there\"", "it's"], &ExecOptions::default())
        .unwrap();

    assert_eq!(result.stdout(), b"hello \"there\" it's\n");
}

#[test]
fn test_through_ssh_from_local_runner() {
    let runner = local_runner().through_ssh("-c").with_ssh_command("sh");

    let result = runner
        .execute("echo $((6 * 7))", &ExecOptions::default())
        .unwrap();

    assert_eq!(result.stdout(), b"42\n");
}

#[tokio::test]
async fn test_execute_tokio_timeout() {
    let runner = local_runner();

    let err = runner
        .execute_tokio("sleep 100", &ExecOptions::default().with_timeout_secs(1))
        .await
        .unwrap_err();

    match err {
        ExecError::Timeout(mut timed_out) => {
            let mut result = timed_out.take_result().unwrap();
            result.kill().unwrap();
            let result = wait_async(result, None).await.unwrap();
            assert_eq!(result.exit_code(), Some(-15));
        }
        other => panic!("Expected Timeout error, got {:?}", other),
    }
}
