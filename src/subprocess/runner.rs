use std::collections::HashMap;
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};

use super::error::ProcessError;

const DEFAULT_LOCALE: &str = "en_US.UTF-8";

#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Overrides layered on top of the inherited environment
    pub env: HashMap<String, String>,
}

impl ProcessCommand {
    /// Program and arguments joined for log and error messages
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if status.success() {
            return ExitStatus::Success;
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitStatus::Signal(signal);
            }
        }

        ExitStatus::Error(status.code().unwrap_or(-1))
    }
}

/// A long-lived child process with all three stdio channels piped.
///
/// Unlike one-shot command execution, nothing here waits for the child:
/// the caller takes the pipes and drives the process for as long as it
/// lives.
pub struct InteractiveProcess {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

impl InteractiveProcess {
    pub fn spawn(command: &ProcessCommand) -> Result<Self, ProcessError> {
        log_command_start(command);

        let mut cmd = configure_command(command);
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::CommandNotFound(command.program.clone())
            } else {
                ProcessError::Spawn {
                    command: command.display(),
                    source: e,
                }
            }
        })?;

        let stdin = child.stdin.take().ok_or(ProcessError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(ProcessError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(ProcessError::MissingPipe("stderr"))?;

        tracing::debug!(
            "Spawned interactive process '{}' with pid {:?}",
            command.program,
            child.id()
        );

        Ok(Self {
            child,
            stdin,
            stdout,
            stderr,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Send SIGTERM to the process group led by `pid`.
///
/// Children spawned by [`InteractiveProcess::spawn`] lead their own group,
/// so this also reaches any command the shell is currently running.
#[cfg(unix)]
pub fn terminate_group(pid: u32) -> Result<(), ProcessError> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| ProcessError::InternalError {
        message: format!("pid {pid} does not fit in a process group id"),
    })?;

    killpg(Pid::from_raw(raw), Signal::SIGTERM).map_err(|errno| ProcessError::Io(errno.into()))
}

#[cfg(not(unix))]
pub fn terminate_group(_pid: u32) -> Result<(), ProcessError> {
    Ok(())
}

fn log_command_start(command: &ProcessCommand) {
    tracing::debug!("Starting interactive process: {}", command.display());

    if !command.env.is_empty() {
        tracing::trace!("Environment overrides: {:?}", command.env);
    }
}

fn configure_command(command: &ProcessCommand) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(&command.program);

    // Own process group so shutdown can signal the shell and its jobs together
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    cmd.args(&command.args);

    // The shell inherits our environment; only a missing locale is filled in
    if std::env::var_os("LANG").is_none() {
        let locale = std::env::var("LC_ALL")
            .or_else(|_| std::env::var("LC_CTYPE"))
            .unwrap_or_else(|_| DEFAULT_LOCALE.to_string());
        tracing::trace!("LANG is unset, using {}", locale);
        cmd.env("LANG", locale);
    }
    cmd.envs(&command.env);

    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    cmd
}
