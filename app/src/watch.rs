// In app/src/watch.rs

use std::io::Write;
use std::time::Duration;

use anyhow::{Result, bail};
use api_client::ControlTowerApi;
use core_types::RunId;
use engine::Synchronizer;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::render::{LOG_ROWS, render};
use crate::tracing_layer::LogBuffer;

/// Check this often whether the log tail moved the frame.
const REDRAW_EVERY: Duration = Duration::from_secs(1);

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";
const HELP: &str = "Commands: select <run_id> | toggle | refresh | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Select(RunId),
    Toggle,
    Refresh,
    Quit,
}

/// Parses one line typed on the watch screen. A blank line is `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let command = match verb.to_ascii_lowercase().as_str() {
        "select" | "s" => match words.next() {
            Some(raw) => Command::Select(RunId::parse(raw)?),
            None => bail!("usage: select <run_id>"),
        },
        "toggle" | "t" => Command::Toggle,
        "refresh" | "r" => Command::Refresh,
        "quit" | "q" | "exit" => Command::Quit,
        other => bail!("unknown command {other:?}"),
    };
    if let Some(extra) = words.next() {
        bail!("unexpected argument {extra:?}");
    }
    Ok(Some(command))
}

/// Runs the live dashboard until `quit` or Ctrl-C, then shuts the
/// synchronizer down.
pub async fn run<A: ControlTowerApi + 'static>(
    sync: Synchronizer<A>,
    logs: LogBuffer,
    api_url: &str,
    initial_run: Option<RunId>,
) -> Result<()> {
    let mut changes = sync.subscribe();
    if let Some(run_id) = initial_run {
        sync.select_run(run_id);
    }
    sync.start();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut redraw = tokio::time::interval(REDRAW_EVERY);
    let mut notice: Option<String> = None;
    let mut screen = Screen::default();

    loop {
        screen.draw(frame(&sync, &logs, api_url, notice.as_deref()))?;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = redraw.tick() => {}
            line = stdin.next_line(), if stdin_open => {
                // The echoed input scrolled the frame.
                screen.invalidate();
                let Some(line) = line? else {
                    stdin_open = false;
                    continue;
                };
                match parse_command(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => tokio::select! {
                        _ = tokio::signal::ctrl_c() => break,
                        result = execute(&sync, command) => notice = result,
                    },
                    Err(e) => notice = Some(e.to_string()),
                }
            }
        }
    }

    sync.shutdown();
    Ok(())
}

async fn execute<A: ControlTowerApi + 'static>(sync: &Synchronizer<A>, command: Command) -> Option<String> {
    match command {
        Command::Select(run_id) => {
            let listed = sync.snapshot().runs.iter().any(|r| r.run_id == run_id);
            let notice = (!listed).then(|| format!("{run_id} is not in the run list"));
            sync.select_run(run_id);
            notice
        }
        Command::Toggle => {
            let action = sync.toggle_bot().await;
            Some(format!("Sent {action:?}"))
        }
        Command::Refresh => {
            sync.refresh_now().await;
            None
        }
        Command::Quit => None,
    }
}

fn frame<A: ControlTowerApi + 'static>(
    sync: &Synchronizer<A>,
    logs: &LogBuffer,
    api_url: &str,
    notice: Option<&str>,
) -> String {
    let mut frame = render(&sync.snapshot(), &logs.tail(LOG_ROWS), api_url);
    frame.push('\n');
    frame.push_str(HELP);
    frame.push('\n');
    if let Some(notice) = notice {
        frame.push_str("> ");
        frame.push_str(notice);
        frame.push('\n');
    }
    frame
}

/// The terminal, redrawn only when the frame text changes so a line being
/// typed is not wiped by an identical frame.
#[derive(Default)]
struct Screen {
    last: String,
}

impl Screen {
    /// Returns the frame when it differs from the one on screen.
    fn next(&mut self, frame: String) -> Option<&str> {
        if frame == self.last {
            return None;
        }
        self.last = frame;
        Some(&self.last)
    }

    fn invalidate(&mut self) {
        self.last.clear();
    }

    fn draw(&mut self, frame: String) -> Result<()> {
        let Some(frame) = self.next(frame) else {
            return Ok(());
        };
        let mut stdout = std::io::stdout().lock();
        write!(stdout, "{CLEAR_SCREEN}{frame}")?;
        stdout.flush()?;
        Ok(())
    }
}
