#![cfg(unix)]

use std::fs;

use app_config::ServerSettings;
use tempfile::TempDir;
use web_server::BotController;

fn controller(tmp: &TempDir, command: &str, args: &[&str]) -> BotController {
    BotController::new(&ServerSettings {
        pid_file: tmp.path().join("bot.pid"),
        bot_command: command.into(),
        bot_args: args.iter().map(|a| a.to_string()).collect(),
        ..ServerSettings::default()
    })
}

#[tokio::test]
async fn start_status_stop_cycle() {
    let tmp = TempDir::new().unwrap();
    let bot = controller(&tmp, "sleep", &["30"]);

    let started = bot.start().await.unwrap();
    assert!(started.ok);
    let pid = started.pid.unwrap();
    assert_eq!(fs::read_to_string(bot.pid_file()).unwrap(), pid.to_string());

    let status = bot.status().await.unwrap();
    assert!(status.running);
    assert_eq!(status.pid, Some(pid));

    let again = bot.start().await.unwrap();
    assert!(!again.ok);
    assert_eq!(again.error.as_deref(), Some("bot already running"));

    let stopped = bot.stop().await.unwrap();
    assert!(stopped.ok);
    assert_eq!(stopped.pid, Some(pid));
    assert!(!bot.pid_file().exists());

    let status = bot.status().await.unwrap();
    assert!(!status.running);

    let again = bot.stop().await.unwrap();
    assert!(!again.ok);
    assert_eq!(again.error.as_deref(), Some("no pid file"));
}

#[tokio::test]
async fn bot_that_exits_on_its_own_is_reported_stopped() {
    let tmp = TempDir::new().unwrap();
    let bot = controller(&tmp, "true", &[]);

    assert!(bot.start().await.unwrap().ok);
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let status = bot.status().await.unwrap();
    assert!(!status.running);
    assert!(!bot.pid_file().exists());
}

#[tokio::test]
async fn stale_pid_file_is_cleaned_up() {
    let tmp = TempDir::new().unwrap();
    let mut exited = std::process::Command::new("true").spawn().unwrap();
    let dead_pid = exited.id();
    exited.wait().unwrap();

    let bot = controller(&tmp, "sleep", &["30"]);
    fs::write(bot.pid_file(), dead_pid.to_string()).unwrap();

    let status = bot.status().await.unwrap();
    assert!(!status.running);
    assert!(!bot.pid_file().exists());
}

#[tokio::test]
async fn spawn_failure_is_a_rejected_ack() {
    let tmp = TempDir::new().unwrap();
    let bot = controller(&tmp, "/nonexistent/control-tower-bot", &[]);

    let ack = bot.start().await.unwrap();
    assert!(!ack.ok);
    assert!(ack.error.is_some());
    assert!(!bot.pid_file().exists());
}

#[tokio::test]
async fn unwritable_pid_file_kills_the_spawned_bot() {
    let tmp = TempDir::new().unwrap();
    let seconds = (30_000 + std::process::id() % 10_000).to_string();
    let bot = BotController::new(&ServerSettings {
        pid_file: tmp.path().join("missing-dir").join("bot.pid"),
        bot_command: "sleep".into(),
        bot_args: vec![seconds.clone()],
        ..ServerSettings::default()
    });

    assert!(bot.start().await.is_err());

    let survivors = std::process::Command::new("pgrep")
        .arg("-fx")
        .arg(format!("sleep {seconds}"))
        .output();
    if let Ok(output) = survivors {
        assert!(output.stdout.is_empty(), "bot still running: {:?}", output.stdout);
    }
    let status = bot.status().await.unwrap();
    assert!(!status.running);
}

#[tokio::test]
async fn garbage_pid_file_reads_as_not_running() {
    let tmp = TempDir::new().unwrap();
    let bot = controller(&tmp, "sleep", &["30"]);
    fs::write(bot.pid_file(), "not-a-pid\n").unwrap();

    let status = bot.status().await.unwrap();
    assert!(!status.running);
    assert!(!bot.pid_file().exists());

    fs::write(bot.pid_file(), "garbage").unwrap();
    let stopped = bot.stop().await.unwrap();
    assert!(!stopped.ok);
    assert_eq!(stopped.error.as_deref(), Some("no pid file"));

    fs::write(bot.pid_file(), "garbage").unwrap();
    let started = bot.start().await.unwrap();
    assert!(started.ok);
    assert!(bot.stop().await.unwrap().ok);
}

#[tokio::test]
async fn pid_of_a_live_process_is_running() {
    let tmp = TempDir::new().unwrap();
    let bot = controller(&tmp, "sleep", &["30"]);
    // pid 1 is alive; as a non-root user `kill -0 1` fails with EPERM.
    fs::write(bot.pid_file(), "1").unwrap();

    let status = bot.status().await.unwrap();
    assert!(status.running);
    assert_eq!(status.pid, Some(1));
    assert!(bot.pid_file().exists());
}
