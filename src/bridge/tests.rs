use super::*;
use crate::subprocess::CloseReason;
use std::path::{Path, PathBuf};
use std::time::Instant;

const WINDOW: Duration = Duration::from_millis(50);

async fn spawn_sh(home: Option<PathBuf>) -> ProcessBridge {
    let shell = ShellConfig {
        program: "/bin/sh".to_string(),
        home_dir: home,
        ..ShellConfig::default()
    };
    ProcessBridge::spawn(&shell, WINDOW).await.unwrap()
}

/// Drain `source` until the accumulated output contains `needle`
async fn drain_until(bridge: &ProcessBridge, source: StreamSource, needle: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut output = Vec::new();
    while Instant::now() < deadline {
        output.extend(bridge.drain(source).await.unwrap());
        if String::from_utf8_lossy(&output).contains(needle) {
            return String::from_utf8_lossy(&output).into_owned();
        }
    }
    panic!(
        "{} never contained {:?}; got {:?}",
        source,
        needle,
        String::from_utf8_lossy(&output)
    );
}

async fn wait_for_exit(bridge: &ProcessBridge) -> ExitStatus {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Some(status) = bridge.status().await.unwrap() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("shell did not exit");
}

#[tokio::test]
async fn test_echo_reaches_stdout() {
    let bridge = spawn_sh(None).await;

    bridge.write_stdin("echo hello").await.unwrap();
    let output = drain_until(&bridge, StreamSource::Stdout, "hello").await;

    assert_eq!(output, "hello\n");
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_stderr_is_drained_separately() {
    let bridge = spawn_sh(None).await;

    bridge.write_stdin("echo oops 1>&2").await.unwrap();
    let errors = drain_until(&bridge, StreamSource::Stderr, "oops").await;

    assert_eq!(errors, "oops\n");
    assert!(bridge.drain_stdout().await.unwrap().is_empty());
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_pending_flag_follows_output_and_drains() {
    let bridge = spawn_sh(None).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!bridge.has_pending_output());

    bridge.write_stdin("echo ping").await.unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !bridge.has_pending_output() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(bridge.has_pending_output());

    // Checking the flag does not consume anything
    assert_eq!(bridge.drain_stdout().await.unwrap(), b"ping\n");
    assert!(!bridge.has_pending_output());
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_acknowledge_resets_both_flags() {
    let bridge = spawn_sh(None).await;

    bridge.write_stdin("echo out; echo err 1>&2").await.unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !(bridge.stdout.is_ready() && bridge.stderr.is_ready()) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    bridge.acknowledge_pending();
    assert!(!bridge.has_pending_output());

    // Acknowledging is not draining
    assert_eq!(bridge.drain_stdout().await.unwrap(), b"out\n");
    assert_eq!(bridge.drain_stderr().await.unwrap(), b"err\n");
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_output_order_is_preserved_across_drains() {
    let bridge = spawn_sh(None).await;

    bridge
        .write_stdin("i=1; while [ $i -le 200 ]; do echo line-$i; i=$((i+1)); done")
        .await
        .unwrap();
    let output = drain_until(&bridge, StreamSource::Stdout, "line-200\n").await;

    let expected: String = (1..=200).map(|i| format!("line-{}\n", i)).collect();
    assert_eq!(output, expected);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_starts_in_home_directory() {
    let home = tempfile::tempdir().unwrap();
    let bridge = spawn_sh(Some(home.path().to_path_buf())).await;

    bridge.write_stdin("pwd").await.unwrap();
    let output = drain_until(&bridge, StreamSource::Stdout, "\n").await;

    assert_eq!(
        Path::new(output.trim()).canonicalize().unwrap(),
        home.path().canonicalize().unwrap()
    );
    assert!(bridge.drain_stderr().await.unwrap().is_empty());
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_home_directory_with_spaces_is_quoted() {
    let root = tempfile::tempdir().unwrap();
    let home = root.path().join("pen pi's home");
    std::fs::create_dir(&home).unwrap();
    let bridge = spawn_sh(Some(home.clone())).await;

    bridge.write_stdin("pwd").await.unwrap();
    let output = drain_until(&bridge, StreamSource::Stdout, "\n").await;

    assert_eq!(
        Path::new(output.trim()).canonicalize().unwrap(),
        home.canonicalize().unwrap()
    );
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_output_before_exit_is_delivered_then_closed() {
    let bridge = spawn_sh(None).await;

    bridge.write_stdin("echo bye; exit 3").await.unwrap();
    assert_eq!(wait_for_exit(&bridge).await, ExitStatus::Error(3));

    let output = drain_until(&bridge, StreamSource::Stdout, "bye").await;
    assert_eq!(output, "bye\n");

    let err = bridge.drain_stdout().await.unwrap_err();
    assert!(matches!(
        err,
        BridgeError::StreamClosed {
            stream: StreamSource::Stdout,
            reason: CloseReason::EndOfStream,
        }
    ));
    assert!(err.is_terminal());
    assert!(bridge.reader_state(StreamSource::Stdout).is_closed());
}

#[tokio::test]
async fn test_write_after_exit_fails() {
    let bridge = spawn_sh(None).await;

    bridge.write_stdin("exit").await.unwrap();
    wait_for_exit(&bridge).await;

    let first = bridge.write_stdin("echo too late").await.unwrap_err();
    assert!(first.is_terminal());

    let second = bridge.write_stdin("echo still too late").await.unwrap_err();
    assert!(matches!(second, BridgeError::StdinClosed));
}

#[tokio::test]
async fn test_shutdown_stops_shell_and_is_idempotent() {
    let bridge = spawn_sh(None).await;
    bridge.write_stdin("sleep 30 &").await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), bridge.shutdown())
        .await
        .expect("shutdown should complete");
    assert!(bridge.status().await.unwrap().is_some());
    assert!(bridge.reader_state(StreamSource::Stdout).is_closed());
    assert!(bridge.reader_state(StreamSource::Stderr).is_closed());

    bridge.shutdown().await;
    assert!(matches!(
        bridge.write_stdin("echo").await,
        Err(BridgeError::StdinClosed)
    ));
}

#[tokio::test]
async fn test_spawn_unknown_shell_fails() {
    let shell = ShellConfig {
        program: "/nonexistent/shell".to_string(),
        home_dir: None,
        ..ShellConfig::default()
    };

    let result = ProcessBridge::spawn(&shell, WINDOW).await;
    assert!(matches!(
        result,
        Err(BridgeError::Process(ProcessError::CommandNotFound(_)))
    ));
}

#[tokio::test]
async fn test_drain_is_bounded_while_shell_keeps_printing() {
    let bridge = spawn_sh(None).await;
    assert_eq!(bridge.max_drain(), WINDOW * DEFAULT_DRAIN_WINDOWS);

    bridge
        .write_stdin("while :; do echo y; sleep 0.01; done")
        .await
        .unwrap();
    drain_until(&bridge, StreamSource::Stdout, "y\n").await;

    for _ in 0..3 {
        let start = Instant::now();
        let output = tokio::time::timeout(Duration::from_secs(3), bridge.drain_stdout())
            .await
            .expect("drain should return while output keeps coming")
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(String::from_utf8_lossy(&output).chars().all(|c| c == 'y' || c == '\n'));
    }

    tokio::time::timeout(Duration::from_secs(5), bridge.shutdown())
        .await
        .expect("shutdown should stop the loop");
}

#[tokio::test]
async fn test_max_drain_can_be_configured() {
    let shell = ShellConfig {
        program: "/bin/sh".to_string(),
        home_dir: None,
        ..ShellConfig::default()
    };
    let bridge = ProcessBridge::spawn(&shell, WINDOW)
        .await
        .unwrap()
        .with_max_drain(Duration::from_millis(400));

    assert_eq!(bridge.max_drain(), Duration::from_millis(400));
    bridge.shutdown().await;
}

#[test]
fn test_group_signalled_only_while_it_can_exist() {
    assert!(should_signal_group(false, false));
    assert!(should_signal_group(false, true));
    // Reaped, but a background job still holds the pipes
    assert!(should_signal_group(true, true));
    // Reaped with nothing left: the id may belong to someone else now
    assert!(!should_signal_group(true, false));
}

#[tokio::test]
async fn test_shutdown_after_shell_was_reaped() {
    let bridge = spawn_sh(None).await;

    bridge.write_stdin("exit 0").await.unwrap();
    assert_eq!(wait_for_exit(&bridge).await, ExitStatus::Success);

    let deadline = Instant::now() + Duration::from_secs(5);
    while !(bridge.reader_state(StreamSource::Stdout).is_closed()
        && bridge.reader_state(StreamSource::Stderr).is_closed())
    {
        assert!(Instant::now() < deadline, "readers never closed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    tokio::time::timeout(Duration::from_secs(1), bridge.shutdown())
        .await
        .expect("shutdown of an exited shell should not wait");
    assert_eq!(
        bridge.reader_state(StreamSource::Stdout),
        ReaderState::Closed(CloseReason::EndOfStream)
    );
}
