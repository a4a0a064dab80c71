//! Regression tests for concurrent stdout/stderr capture, echo and stdin feeding

use command_executor::{BufferedEcho, ExecOptions, LogSource, execute};
use smol::Timer;
use std::sync::Arc;
use std::time::Duration;

const LINES: usize = 300_000;

/// Both pipes receive well over the OS pipe buffer size at the same time. A
/// reader draining one stream before the other would hang here forever.
#[smol_potat::test]
async fn test_large_output_on_both_streams_does_not_deadlock() {
    let command = format!("yes out | head -n {LINES} & yes err | head -n {LINES} >&2; wait");

    let outcome = smol::future::or(
        async { Some(execute(&command, &ExecOptions::new()).await) },
        async {
            Timer::after(Duration::from_secs(60)).await;
            None
        },
    )
    .await;

    let result = outcome.expect("execution did not finish in time").unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout.len(), LINES * "out\n".len());
    assert_eq!(result.stderr.len(), LINES * "err\n".len());
    assert!(result.stdout.lines().all(|l| l == "out"));
    assert!(result.stderr.lines().all(|l| l == "err"));
}

#[smol_potat::test]
async fn test_echo_matches_captured_output() {
    let echo = Arc::new(BufferedEcho::new("TEST: "));
    let options = ExecOptions::new().with_echo(echo.clone());

    let result = execute(
        "printf 'a\\nb\\n'; printf 'err1\\nerr2\\n' >&2; printf 'tail-no-newline'",
        &options,
    )
    .await
    .unwrap();

    assert_eq!(result.stdout, "a\nb\ntail-no-newline");
    assert_eq!(result.stderr, "err1\nerr2\n");
    assert_eq!(echo.unprefixed(LogSource::Stdout), result.stdout);
    assert_eq!(echo.unprefixed(LogSource::Stderr), result.stderr);
    assert_eq!(echo.stderr(), "TEST: err1\nTEST: err2\n");
}

#[smol_potat::test]
async fn test_echo_sees_lines_before_exit() {
    let echo = Arc::new(BufferedEcho::new(""));
    let options = ExecOptions::new().with_echo(echo.clone());

    // The marker file only exists once the first line has been observed by
    // the echo sink, proving lines are mirrored while the process runs.
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("seen");
    let watcher = {
        let echo = echo.clone();
        let marker = marker.clone();
        async move {
            loop {
                if echo.stdout().contains("first") {
                    std::fs::write(&marker, b"1").unwrap();
                    break;
                }
                Timer::after(Duration::from_millis(10)).await;
            }
        }
    };
    let command = format!(
        "echo first; i=0; while [ ! -e '{}' ] && [ $i -lt 500 ]; do sleep 0.01; i=$((i+1)); done; echo second",
        marker.display()
    );

    let (result, ()) = futures::join!(execute(&command, &options), watcher);
    let result = result.unwrap();
    assert_eq!(result.stdout, "first\nsecond\n");
    assert!(marker.exists());
}

#[smol_potat::test]
async fn test_input_is_fed_to_stdin() {
    let options = ExecOptions::new().with_input("qsjqkjjf");
    let result = execute("cat -", &options).await.unwrap();
    assert_eq!(result.stdout, "qsjqkjjf");
    assert_eq!(result.exit_code, 0);
}

#[smol_potat::test]
async fn test_large_input_with_concurrent_output() {
    let input = vec![b'x'; 1 << 20];
    let options = ExecOptions::new().with_input(input);
    // tee echoes everything back while still consuming input
    let result = execute("tee /dev/stderr | wc -c", &options).await.unwrap();
    assert_eq!(result.stdout.trim(), (1 << 20).to_string());
    assert_eq!(result.stderr.len(), 1 << 20);
}

#[smol_potat::test]
async fn test_input_ignored_by_process_is_not_an_error() {
    let options = ExecOptions::new().with_input(vec![b'y'; 1 << 20]);
    let result = execute("exit 0", &options).await.unwrap();
    assert_eq!(result.exit_code, 0);
}
