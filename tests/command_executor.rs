// tests/command_executor.rs

mod common;

use std::time::Duration;

use common::{TestResult, init_tracing};
use dockship::errors::DockshipError;
use dockship::exec::{Outcome, ShellRunner, execute, execute_sequence};
use dockship_test_utils::fake_runner::FakeRunner;

#[cfg(unix)]
fn process_gone(pid: i32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid), None) {
        Err(Errno::ESRCH) => true,
        // An unreaped zombie still answers signals but is no longer running.
        _ => std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .map(|stat| {
                stat.rsplit_once(')')
                    .map(|(_, rest)| rest.trim_start().starts_with('Z'))
                    .unwrap_or(false)
            })
            .unwrap_or(false),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn timed_out_command_and_its_children_are_killed() -> TestResult {
    init_tracing();

    let started = std::time::Instant::now();
    let out = execute("sleep 5 & echo $!; wait", Duration::from_secs(1)).await?;
    assert_eq!(out.outcome, Outcome::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(4));

    let pid: i32 = out.output.trim().parse()?;
    let mut gone = false;
    for _ in 0..50 {
        if process_gone(pid) {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(gone, "background sleep {pid} survived the timeout");

    match out.into_result() {
        Err(DockshipError::Timeout { timeout, .. }) => assert_eq!(timeout, Duration::from_secs(1)),
        other => panic!("expected Timeout, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn output_interleaves_stdout_and_stderr() -> TestResult {
    init_tracing();
    let out = execute("echo one; echo two >&2; echo three", Duration::from_secs(5)).await?;
    assert!(out.success());
    for word in ["one", "two", "three"] {
        assert!(out.output.contains(word), "missing {word} in {:?}", out.output);
    }
    Ok(())
}

#[tokio::test]
async fn sequence_stops_at_first_failure() -> TestResult {
    init_tracing();
    let runner = FakeRunner::failing_on("second", 2);
    let hooks = vec![
        "echo first".to_string(),
        "echo second".to_string(),
        "echo third".to_string(),
    ];

    let err = execute_sequence(&runner, &hooks, Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(matches!(err, DockshipError::ExternalCommandFailure { code: 2, .. }));
    assert_eq!(runner.commands(), vec!["echo first", "echo second"]);
    Ok(())
}

#[tokio::test]
async fn empty_or_blank_sequence_spawns_nothing() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new();

    execute_sequence(&runner, &[], Duration::from_secs(1)).await?;
    execute_sequence(&runner, &["   ".to_string(), String::new()], Duration::from_secs(1)).await?;

    assert!(runner.commands().is_empty());
    Ok(())
}

#[tokio::test]
async fn shell_runner_runs_real_hooks_in_order() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let log = dir.path().join("hooks.log");
    let hooks = vec![
        format!("echo a >> {}", log.display()),
        format!("echo b >> {}", log.display()),
    ];

    execute_sequence(&ShellRunner, &hooks, Duration::from_secs(5)).await?;

    assert_eq!(std::fs::read_to_string(&log)?, "a\nb\n");
    Ok(())
}
