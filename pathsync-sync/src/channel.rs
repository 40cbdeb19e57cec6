//! Execution and transfer channels.
//!
//! A remote root never touches the remote filesystem directly: every listing,
//! probe and mutation is a command string handed to an [`ExecChannel`], and
//! file contents move through a [`TransferChannel`]. The OpenSSH-backed
//! implementations share one multiplexed control master, so every root
//! derived from the same connection reuses a single authenticated session.
//!
//! Credentials never pass through this process. [`connect`] first tries the
//! agent in batch mode and, if allowed, falls back to letting `ssh` prompt on
//! the terminal itself; the prompt's answer stays inside `ssh`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use filetime::{set_file_mtime, FileTime};
use thiserror::Error;

/// OpenSSH exits with 255 when the connection itself failed.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Stderr fragments OpenSSH prints for its own failures. A remote command
/// may also exit 255; without one of these it is a plain command result.
const SSH_DIAGNOSTICS: &[&str] = &[
    "ssh:",
    "Permission denied",
    "Too many authentication failures",
    "Host key verification failed",
    "Connection closed by",
    "Connection reset by",
    "Connection timed out",
    "kex_exchange_identification",
    "mux_client",
    "Control socket",
];

static CONNECTION_GENERATION: AtomicUsize = AtomicUsize::new(0);

/// Failure of an execution or transfer channel. Never retried.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("connection to {host} failed: {detail}")]
    Connection { host: String, detail: String },

    #[error("authentication to {host} failed: {detail}")]
    Credential { host: String, detail: String },

    #[error("command `{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("transfer {from} -> {to} failed: {detail}")]
    Transfer {
        from: String,
        to: String,
        detail: String,
    },
}

/// Captured result of one executed command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status; `None` when the process was killed by a signal.
    pub status: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs a command string somewhere and captures its output.
///
/// `Err` is reserved for failures of the channel itself; a command that ran
/// and exited non-zero is an `Ok` with a non-zero status.
pub trait ExecChannel: fmt::Debug + Send + Sync {
    fn execute(&self, command: &str) -> Result<CommandOutput, ChannelError>;
}

/// Moves single files between this process's filesystem and the channel's.
///
/// Both methods take the full destination path, not a directory.
pub trait TransferChannel: fmt::Debug + Send + Sync {
    fn fetch(&self, remote: &Path, local: &Path) -> Result<(), ChannelError>;
    fn send(&self, local: &Path, remote: &Path) -> Result<(), ChannelError>;
}

// ---------------------------------------------------------------------------
// Local implementations
// ---------------------------------------------------------------------------

/// `sh -c` on this machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalShell;

impl ExecChannel for LocalShell {
    fn execute(&self, command: &str) -> Result<CommandOutput, ChannelError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .map_err(|source| ChannelError::Spawn {
                program: "sh",
                source,
            })?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        })
    }
}

/// Plain file copy that keeps the source modification time, so a copied file
/// never looks stale against its origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCopy;

impl LocalCopy {
    fn copy(from: &Path, to: &Path) -> Result<(), ChannelError> {
        let fail = |detail: String| ChannelError::Transfer {
            from: from.display().to_string(),
            to: to.display().to_string(),
            detail,
        };
        let meta = std::fs::metadata(from).map_err(|e| fail(e.to_string()))?;
        std::fs::copy(from, to).map_err(|e| fail(e.to_string()))?;
        set_file_mtime(to, FileTime::from_last_modification_time(&meta))
            .map_err(|e| fail(e.to_string()))
    }
}

impl TransferChannel for LocalCopy {
    fn fetch(&self, remote: &Path, local: &Path) -> Result<(), ChannelError> {
        Self::copy(remote, local)
    }

    fn send(&self, local: &Path, remote: &Path) -> Result<(), ChannelError> {
        Self::copy(local, remote)
    }
}

// ---------------------------------------------------------------------------
// OpenSSH implementations
// ---------------------------------------------------------------------------

/// Connection parameters shared by [`SshChannel`] and [`ScpTransfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshOptions {
    pub hostname: String,
    pub username: String,
    pub port: u16,
    /// `ServerAliveInterval`; applied when the control master is created.
    pub keepalive: Option<Duration>,
    /// Control socket for the multiplexed master connection.
    pub control_path: PathBuf,
    /// `BatchMode=yes`: never prompt, agent or keys only.
    pub batch_mode: bool,
}

impl SshOptions {
    /// Options with a fresh control path, so a new master is started.
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        let generation = CONNECTION_GENERATION.fetch_add(1, Ordering::Relaxed);
        Self {
            hostname: hostname.into(),
            username: username.into(),
            port: 22,
            keepalive: Some(Duration::from_secs(60)),
            control_path: std::env::temp_dir().join(format!(
                "pathsync-{}-{generation}-%C",
                std::process::id()
            )),
            batch_mode: true,
        }
    }

    pub fn with_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.keepalive = keepalive;
        self
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.username, self.hostname)
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "ControlMaster=auto".to_string(),
            "-o".to_string(),
            format!("ControlPath={}", self.control_path.display()),
            "-o".to_string(),
            "ControlPersist=600".to_string(),
        ];
        if self.batch_mode {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
        }
        if let Some(interval) = self.keepalive {
            args.push("-o".to_string());
            args.push(format!("ServerAliveInterval={}", interval.as_secs().max(1)));
        }
        args
    }
}

/// Runs commands on a remote host through `ssh`.
///
/// Exit status 255 is reported as a channel error only when stderr carries an
/// OpenSSH diagnostic; otherwise it is the remote command's own status.
#[derive(Debug, Clone)]
pub struct SshChannel {
    options: SshOptions,
}

impl SshChannel {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }
}

impl ExecChannel for SshChannel {
    fn execute(&self, command: &str) -> Result<CommandOutput, ChannelError> {
        let output = Command::new("ssh")
            .args(self.options.common_args())
            .arg("-p")
            .arg(self.options.port.to_string())
            .arg(self.options.destination())
            .arg(command)
            .output()
            .map_err(|source| ChannelError::Spawn {
                program: "ssh",
                source,
            })?;
        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        };
        if result.status == Some(SSH_CONNECTION_FAILURE) && is_ssh_diagnostic(&result.stderr) {
            return Err(classify_ssh_failure(&self.options.hostname, &result.stderr));
        }
        Ok(result)
    }
}

/// Copies files over the same control master with `scp -p`.
#[derive(Debug, Clone)]
pub struct ScpTransfer {
    options: SshOptions,
}

impl ScpTransfer {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    fn remote_spec(&self, path: &Path) -> String {
        format!(
            "{}:{}",
            self.options.destination(),
            shell_words::quote(&path.to_string_lossy())
        )
    }

    fn run(&self, from: String, to: String) -> Result<(), ChannelError> {
        let output = Command::new("scp")
            .args(self.options.common_args())
            .arg("-q")
            .arg("-p")
            .arg("-P")
            .arg(self.options.port.to_string())
            .arg(&from)
            .arg(&to)
            .output()
            .map_err(|source| ChannelError::Spawn {
                program: "scp",
                source,
            })?;
        if output.status.success() {
            return Ok(());
        }
        Err(ChannelError::Transfer {
            from,
            to,
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl TransferChannel for ScpTransfer {
    fn fetch(&self, remote: &Path, local: &Path) -> Result<(), ChannelError> {
        self.run(self.remote_spec(remote), local.display().to_string())
    }

    fn send(&self, local: &Path, remote: &Path) -> Result<(), ChannelError> {
        self.run(local.display().to_string(), self.remote_spec(remote))
    }
}

/// Establish the control master and return the channel pair riding on it.
///
/// With `try_agent`, authentication is first attempted in batch mode (agent
/// and key files only). If that is refused and `interactive` is set, `ssh` is
/// run again without batch mode so it can prompt on the terminal.
pub fn connect(
    options: SshOptions,
    try_agent: bool,
    interactive: bool,
) -> Result<(SshChannel, ScpTransfer), ChannelError> {
    let mut options = options;
    if try_agent {
        options.batch_mode = true;
        match probe(&options) {
            Ok(()) => return Ok(pair(options)),
            Err(ChannelError::Credential { .. }) if interactive => {
                tracing::info!(
                    "agent authentication refused by {}; falling back to interactive login",
                    options.hostname
                );
            }
            Err(err) => return Err(err),
        }
    }
    options.batch_mode = false;
    probe(&options)?;
    Ok(pair(options))
}

fn pair(options: SshOptions) -> (SshChannel, ScpTransfer) {
    (SshChannel::new(options.clone()), ScpTransfer::new(options))
}

fn probe(options: &SshOptions) -> Result<(), ChannelError> {
    let channel = SshChannel::new(options.clone());
    let output = channel.execute("true")?;
    if output.success() {
        return Ok(());
    }
    Err(ChannelError::Connection {
        host: options.hostname.clone(),
        detail: output.stderr.trim().to_string(),
    })
}

fn is_ssh_diagnostic(stderr: &str) -> bool {
    SSH_DIAGNOSTICS.iter().any(|marker| stderr.contains(marker))
}

fn classify_ssh_failure(host: &str, stderr: &str) -> ChannelError {
    let detail = stderr.trim().to_string();
    if stderr.contains("Permission denied") || stderr.contains("Too many authentication failures")
    {
        ChannelError::Credential {
            host: host.to_string(),
            detail,
        }
    } else {
        ChannelError::Connection {
            host: host.to_string(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn local_shell_captures_stdout_and_status() {
        let out = LocalShell.execute("printf hello; exit 3").unwrap();
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.status, Some(3));
        assert!(!out.success());
    }

    #[test]
    fn local_copy_preserves_mtime() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.txt");
        let dst = tmp.path().join("b.txt");
        std::fs::write(&src, "data").unwrap();
        let old = FileTime::from_unix_time(1_600_000_000, 0);
        set_file_mtime(&src, old).unwrap();

        LocalCopy.send(&src, &dst).unwrap();

        let meta = std::fs::metadata(&dst).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), old);
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "data");
    }

    #[test]
    fn permission_denied_is_a_credential_error() {
        let err = classify_ssh_failure("login", "alice@login: Permission denied (publickey).");
        assert!(matches!(err, ChannelError::Credential { .. }));
        let err = classify_ssh_failure("login", "ssh: connect to host login port 22: Connection refused");
        assert!(matches!(err, ChannelError::Connection { .. }));
    }

    #[test]
    fn remote_exit_255_without_ssh_diagnostic_is_a_command_result() {
        assert!(!is_ssh_diagnostic(""));
        assert!(!is_ssh_diagnostic("solver: bad input deck\n"));
        assert!(is_ssh_diagnostic(
            "ssh: Could not resolve hostname nohost: Name or service not known\n"
        ));
        assert!(is_ssh_diagnostic("alice@login: Permission denied (publickey).\n"));
        assert!(is_ssh_diagnostic("Connection closed by 10.0.0.1 port 22\r\n"));
    }

    #[test]
    fn each_options_value_gets_its_own_control_path() {
        let a = SshOptions::new("h", "u");
        let b = SshOptions::new("h", "u");
        assert_ne!(a.control_path, b.control_path);
    }

    #[test]
    fn keepalive_and_batch_mode_show_up_in_args() {
        let opts = SshOptions::new("h", "u").with_keepalive(Some(Duration::from_secs(30)));
        let args = opts.common_args();
        assert!(args.contains(&"ServerAliveInterval=30".to_string()));
        assert!(args.contains(&"BatchMode=yes".to_string()));

        let opts = SshOptions {
            batch_mode: false,
            ..opts.with_keepalive(None)
        };
        let args = opts.common_args();
        assert!(!args.iter().any(|a| a.starts_with("ServerAliveInterval")));
        assert!(!args.contains(&"BatchMode=yes".to_string()));
    }
}
