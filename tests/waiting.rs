//! Waiting on many processes at once

#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{assert_takes_almost, kill_and_reap, local_runner};
use execmux::{wait_for_many_async, wait_for_many_results, ExecOptions, ExecResult, Waiter};

fn launch(command: &str) -> ExecResult {
    local_runner()
        .execute_async(command, &ExecOptions::default())
        .unwrap()
}

#[test]
fn test_sleepers_finish_in_parallel() {
    let mut results = (0..10).map(|_| launch("sleep 1")).collect::<Vec<_>>();

    let finished = assert_takes_almost(Duration::from_secs(1), || {
        wait_for_many_results(results.iter_mut(), None)
            .unwrap()
            .into_iter()
            .map(|r| r.is_some())
            .collect::<Vec<_>>()
    });

    assert_eq!(finished, vec![true; 10]);
    assert!(results.iter().all(|r| r.exit_code() == Some(0)));
}

#[test]
fn test_mixed_exit_codes_keep_input_order() {
    let mut results = vec![launch("exit 3"), launch("sleep 0.2; exit 0"), launch("exit 5")];

    let done = wait_for_many_results(results.iter_mut(), None).unwrap();
    let codes = done
        .iter()
        .map(|r| r.as_ref().and_then(|r| r.exit_code()))
        .collect::<Vec<_>>();

    assert_eq!(codes, vec![Some(3), Some(0), Some(5)]);
}

#[test]
fn test_overall_timeout_reports_unfinished() {
    let mut quick = launch("echo quick");
    let mut stuck = launch("sleep 100");

    let done = assert_takes_almost(Duration::from_millis(500), || {
        wait_for_many_results([&mut quick, &mut stuck], Some(Duration::from_millis(500)))
            .unwrap()
            .into_iter()
            .map(|r| r.is_some())
            .collect::<Vec<_>>()
    });

    assert_eq!(done, vec![true, false]);
    assert_eq!(quick.stdout(), b"quick\n");
    assert!(!stuck.is_finished().unwrap());
    kill_and_reap(&mut stuck);
}

#[test]
fn test_earliest_result_deadline_wins() {
    let mut short = local_runner()
        .execute_async(
            "sleep 100",
            &ExecOptions::default().with_timeout(Duration::from_millis(300)),
        )
        .unwrap();
    let mut long = launch("sleep 100");

    assert_takes_almost(Duration::from_millis(300), || {
        wait_for_many_results([&mut short, &mut long], Some(Duration::from_secs(30))).unwrap();
    });

    kill_and_reap(&mut short);
    kill_and_reap(&mut long);
}

#[test]
fn test_interleaved_output_stays_separate() {
    let mut results = (0..4)
        .map(|i| launch(&format!("for n in 1 2 3; do echo {i}-$n; sleep 0.05; done")))
        .collect::<Vec<_>>();

    wait_for_many_results(results.iter_mut(), None).unwrap();

    for (i, result) in results.iter().enumerate() {
        let expected = format!("{i}-1\n{i}-2\n{i}-3\n");
        assert_eq!(result.stdout(), expected.as_bytes());
    }
}

#[test]
fn test_waiter_with_short_interval() {
    let waiter = Waiter::new(Duration::from_millis(1));
    let mut result = launch("sleep 0.2; echo tick");

    let done = waiter.wait_for_many([&mut result], None).unwrap();

    assert!(done[0].is_some());
    assert_eq!(result.stdout(), b"tick\n");
}

#[tokio::test]
async fn test_wait_for_many_async_hands_results_back() {
    let results = vec![launch("echo a"), launch("sleep 100")];

    let (mut results, finished) = wait_for_many_async(results, Some(Duration::from_millis(300)))
        .await
        .unwrap();

    assert_eq!(finished, vec![true, false]);
    assert_eq!(results[0].stdout(), b"a\n");
    kill_and_reap(&mut results[1]);
}
