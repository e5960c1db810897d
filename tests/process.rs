//! External process runner tests.
//!
//! Tests drive `/bin/sh` and return early where it is not available.

use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use sub2srt::process::{LiveWindow, describe, run_captured, run_with_live_window_into};
use sub2srt::{CancellationToken, Sub2SrtError};

const SHELL: &str = "/bin/sh";

fn shell(script: &str) -> Option<Command> {
    if !Path::new(SHELL).exists() {
        return None;
    }
    let mut command = Command::new(SHELL);
    command.arg("-c").arg(script);
    Some(command)
}

#[test]
fn captured_run_reports_streams_and_exit_code() {
    let Some(mut command) = shell("echo out; echo err >&2; exit 3") else {
        return;
    };

    let output = run_captured(&mut command).expect("Shell should start");

    assert_eq!(output.exit_code, Some(3));
    assert_eq!(output.stdout, "out\n");
    assert_eq!(output.stderr, "err\n");
    assert!(!output.success());

    let failure = output.check().expect_err("Non-zero exit should fail check");
    assert_eq!(failure.exit_code, Some(3));
    assert_eq!(failure.stderr, "err\n");
    assert!(failure.to_string().contains("exited with code 3"));
}

#[test]
fn captured_run_succeeds_on_zero_exit() {
    let Some(mut command) = shell("printf 'a\\nb\\n'") else {
        return;
    };

    let output = run_captured(&mut command)
        .expect("Shell should start")
        .check()
        .expect("Zero exit should pass check");
    assert_eq!(output.stdout.lines().count(), 2);
}

#[test]
fn missing_program_is_a_process_failure() {
    let mut command = Command::new("/nonexistent/sub2srt-test-binary");
    let result = run_captured(&mut command);

    match result {
        Err(Sub2SrtError::Process(failure)) => {
            assert_eq!(failure.exit_code, None);
            assert!(failure.command.contains("sub2srt-test-binary"));
        }
        other => panic!("Expected a process failure, got {other:?}"),
    }
}

#[test]
fn describe_joins_program_and_arguments() {
    let mut command = Command::new("mkvextract");
    command.args(["movie.mkv", "tracks", "2:movie.2.eng.sup"]);
    assert_eq!(describe(&command), "mkvextract movie.mkv tracks 2:movie.2.eng.sup");
}

#[test]
fn live_window_paints_header_and_output() {
    let Some(mut command) = shell("echo one; printf 'two\\rthree\\n'; echo four >&2") else {
        return;
    };
    let window = LiveWindow::new(5)
        .with_width(10)
        .with_header(vec!["Extracting tracks".to_string()]);
    let mut painted = Vec::new();

    run_with_live_window_into(&mut command, &window, None, &mut painted)
        .expect("Successful run should not fail");

    let painted = String::from_utf8(painted).expect("Output should be UTF-8");
    assert!(painted.starts_with("\x1b[2J"));
    assert!(painted.contains("Extracting tracks"));
    assert!(painted.contains("----------"));
    for line in ["one", "two", "three", "four"] {
        assert!(painted.contains(line), "Missing {line:?} in window output");
    }
    assert!(!painted.contains("two\rthree"));
}

#[test]
fn live_window_keeps_output_tail_on_failure() {
    let Some(mut command) =
        shell("i=0; while [ $i -lt 30 ]; do echo line$i; i=$((i+1)); done; exit 2")
    else {
        return;
    };
    let mut painted = Vec::new();

    let result = run_with_live_window_into(&mut command, &LiveWindow::new(3), None, &mut painted);

    match result {
        Err(Sub2SrtError::Process(failure)) => {
            assert_eq!(failure.exit_code, Some(2));
            let tail: Vec<&str> = failure.stderr.lines().collect();
            assert_eq!(tail.len(), 20);
            assert_eq!(tail.first(), Some(&"line10"));
            assert_eq!(tail.last(), Some(&"line29"));
        }
        other => panic!("Expected a process failure, got {other:?}"),
    }
}

#[test]
fn cancelled_live_window_terminates_child() {
    let Some(mut command) = shell("exec sleep 5") else {
        return;
    };
    let token = CancellationToken::new();
    token.cancel();
    let mut painted = Vec::new();

    let started = Instant::now();
    let result =
        run_with_live_window_into(&mut command, &LiveWindow::new(3), Some(&token), &mut painted);

    assert!(matches!(result, Err(Sub2SrtError::Interrupted { .. })));
    assert!(started.elapsed() < Duration::from_secs(4));
}
