// In crates/web-server/src/control.rs

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use app_config::ServerSettings;
use core_types::{BotStatus, ControlAck};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Starts and stops the bot process.
///
/// The pid file is the source of truth for "is the bot running", so a bot
/// started by an earlier server process can still be stopped. The child
/// handle is only kept to reap the process and to notice when it exits on
/// its own.
#[derive(Debug)]
pub struct BotController {
    pid_file: PathBuf,
    command: String,
    args: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl BotController {
    pub fn new(settings: &ServerSettings) -> Self {
        Self {
            pid_file: settings.pid_file.clone(),
            command: settings.bot_command.clone(),
            args: settings.bot_args.clone(),
            child: Mutex::new(None),
        }
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Reports whether the bot is alive. A pid file left behind by a process
    /// that has exited is removed.
    pub async fn status(&self) -> Result<BotStatus> {
        let mut child = self.child.lock().await;

        if let Some(process) = child.as_mut() {
            match process.try_wait()? {
                None => {
                    return Ok(BotStatus { running: true, pid: process.id() });
                }
                Some(exit) => {
                    tracing::info!(%exit, "Bot process exited.");
                    *child = None;
                    self.remove_pid_file().await?;
                    return Ok(BotStatus::default());
                }
            }
        }

        match self.read_pid().await? {
            None => Ok(BotStatus::default()),
            Some(pid) if process_alive(pid).await => Ok(BotStatus { running: true, pid: Some(pid) }),
            Some(pid) => {
                tracing::info!(pid, "Removing stale pid file.");
                self.remove_pid_file().await?;
                Ok(BotStatus::default())
            }
        }
    }

    /// Spawns the bot unless a pid file says one is already running.
    pub async fn start(&self) -> Result<ControlAck> {
        let mut child = self.child.lock().await;

        if self.read_pid().await?.is_some() {
            return Ok(ControlAck::rejected("bot already running"));
        }

        let spawned = Command::new(&self.command)
            .args(&self.args)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        let process = match spawned {
            Ok(process) => process,
            Err(e) => {
                tracing::warn!(command = %self.command, error = %e, "Failed to spawn bot.");
                return Ok(ControlAck::rejected(e.to_string()));
            }
        };
        let Some(pid) = process.id() else {
            reap(process).await;
            return Err(Error::Internal("spawned bot has no pid".into()));
        };

        // Without a pid file nothing could find the bot again.
        if let Err(e) = tokio::fs::write(&self.pid_file, pid.to_string()).await {
            tracing::warn!(pid, path = %self.pid_file.display(), error = %e, "Failed to write pid file; killing bot.");
            reap(process).await;
            return Err(e.into());
        }
        *child = Some(process);

        tracing::info!(pid, command = %self.command, "Started bot.");
        Ok(ControlAck::accepted(pid))
    }

    /// Sends SIGTERM to the pid in the pid file and removes the file.
    pub async fn stop(&self) -> Result<ControlAck> {
        let mut child = self.child.lock().await;

        let Some(pid) = self.read_pid().await? else {
            return Ok(ControlAck::rejected("no pid file"));
        };

        if let Err(message) = terminate(pid).await {
            tracing::warn!(pid, %message, "Failed to stop bot.");
            return Ok(ControlAck::rejected(message));
        }
        self.remove_pid_file().await?;

        if let Some(mut process) = child.take() {
            if process.id() == Some(pid) {
                tokio::spawn(async move {
                    let _ = process.wait().await;
                });
            } else {
                *child = Some(process);
            }
        }

        tracing::info!(pid, "Stopped bot.");
        Ok(ControlAck::accepted(pid))
    }

    /// The pid in the pid file. A file that does not hold a pid is removed
    /// and reads as no pid file.
    async fn read_pid(&self) -> Result<Option<u32>> {
        let text = match tokio::fs::read_to_string(&self.pid_file).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match text.trim().parse() {
            Ok(pid) => Ok(Some(pid)),
            Err(e) => {
                tracing::warn!(path = %self.pid_file.display(), error = %e, "Removing unreadable pid file.");
                self.remove_pid_file().await?;
                Ok(None)
            }
        }
    }

    async fn remove_pid_file(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.pid_file).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

async fn reap(mut process: Child) {
    if let Err(e) = process.start_kill() {
        tracing::warn!(error = %e, "Failed to kill bot.");
        return;
    }
    let _ = process.wait().await;
}

async fn process_alive(pid: u32) -> bool {
    match Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .output()
        .await
    {
        Ok(output) => output.status.success() || denied(&output.stderr),
        Err(_) => false,
    }
}

/// `kill` fails with EPERM for a live process owned by another user.
fn denied(stderr: &[u8]) -> bool {
    String::from_utf8_lossy(stderr).contains("Operation not permitted")
}

async fn terminate(pid: u32) -> std::result::Result<(), String> {
    let output = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .output()
        .await
        .map_err(|e| e.to_string())?;
    if output.status.success() {
        Ok(())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}
