//! The supervised capture process.
//!
//! A launcher owns at most one child. Liveness is always probed from the
//! child handle itself, never read back from a remembered flag, so a child
//! that crashed or exited on its own reads as absent the next time anyone
//! asks.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Where the supervised process stands right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No child exists: never started, stopped, or exited on its own.
    Absent,
    /// A live child with this pid.
    Running(u32),
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running(_))
    }
}

/// The single capture process a launcher may own.
pub struct SupervisedChild {
    name: String,
    executable: PathBuf,
    args: Vec<String>,
    child: Option<Child>,
}

impl SupervisedChild {
    pub fn new(name: &str, executable: PathBuf, args: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            executable,
            args,
            child: None,
        }
    }

    /// Probe the current state, reaping a child that exited on its own.
    pub fn state(&mut self) -> ProcessState {
        let Some(child) = &mut self.child else {
            return ProcessState::Absent;
        };

        match child.try_wait() {
            Ok(None) => match child.id() {
                Some(pid) => ProcessState::Running(pid),
                None => {
                    self.child = None;
                    ProcessState::Absent
                }
            },
            Ok(Some(status)) => {
                log::info!("[{}] Exited on its own: {}", self.name, describe(status));
                self.child = None;
                ProcessState::Absent
            }
            Err(e) => {
                log::error!("[{}] Failed to probe child: {e}", self.name);
                self.child = None;
                ProcessState::Absent
            }
        }
    }

    /// Start the capture process unless one is already live.
    ///
    /// A repeated start is routine operator behavior, answered with a log
    /// line and nothing else. A spawn failure leaves the launcher serving
    /// with no child.
    pub fn start(&mut self) -> ProcessState {
        if let ProcessState::Running(pid) = self.state() {
            log::info!("[{}] Already running (pid {pid}), ignoring start", self.name);
            return ProcessState::Running(pid);
        }

        log::info!(
            "[{}] Starting: {} {}",
            self.name,
            self.executable.display(),
            self.args.join(" ")
        );

        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                log::error!(
                    "[{}] Failed to spawn {}: {e}",
                    self.name,
                    self.executable.display()
                );
                return ProcessState::Absent;
            }
        };

        forward_output(&mut child, &self.name);

        let pid = child.id().unwrap_or(0);
        log::info!("[{}] Started with pid {pid}", self.name);
        self.child = Some(child);
        ProcessState::Running(pid)
    }

    /// Stop the capture process: termination request, bounded grace, then
    /// forced kill. No-op when nothing is running; the child is gone in
    /// every outcome.
    pub async fn stop(&mut self, grace: Duration) -> ProcessState {
        if !self.state().is_running() {
            log::info!("[{}] Not running, ignoring stop", self.name);
            return ProcessState::Absent;
        }
        let Some(mut child) = self.child.take() else {
            return ProcessState::Absent;
        };

        log::info!("[{}] Stopping ({}s grace)", self.name, grace.as_secs());
        terminate(&mut child);

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                log::info!("[{}] {}", self.name, describe(status));
            }
            Ok(Err(e)) => {
                log::error!("[{}] Error waiting for exit: {e}", self.name);
            }
            Err(_) => {
                log::warn!(
                    "[{}] Did not exit within {}s, killing",
                    self.name,
                    grace.as_secs()
                );
                if let Err(e) = child.kill().await {
                    log::error!("[{}] Kill failed: {e}", self.name);
                }
            }
        }

        ProcessState::Absent
    }
}

/// Request graceful termination without reaping.
#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
}

/// No SIGTERM off Unix; escalate straight to kill and let the grace wait
/// collect the exit.
#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

/// Forward child output to the launcher's log, line by line.
fn forward_output(child: &mut Child, name: &str) {
    if let Some(stdout) = child.stdout.take() {
        let name = name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::info!("[{name}] {line}");
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let name = name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::warn!("[{name}] {line}");
            }
        });
    }
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("Exited with code {code}"),
        None => "Exited by signal".to_string(),
    }
}
