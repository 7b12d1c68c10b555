//! Peer process connection.
//!
//! A [`PeerConnection`] owns one child process and frames messages over its
//! stdin (requests) and stdout (responses). The child's stderr is inherited
//! so peer diagnostics reach the terminal untouched.
//!
//! # Example
//!
//! ```ignore
//! use value_conformance::transport::PeerBuilder;
//!
//! let mut peer = PeerBuilder::new("./json-peer").arg("--strict").open()?;
//! let response = peer.exchange_message(request).await?;
//! peer.await_exit(true).await?;
//! ```

use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::{Connection, Exchange};
use crate::error::{ConformanceError, Result};
use crate::protocol::Message;

/// `ECHILD`: the child was already reaped.
const NO_SUCH_CHILD: i32 = 10;

type PeerStreams = Connection<BufReader<ChildStdout>, ChildStdin>;

/// Builder for spawning a peer process.
///
/// Nothing is started until [`open`](Self::open), so a half-configured peer
/// never exists.
#[derive(Debug, Clone)]
pub struct PeerBuilder {
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    current_dir: Option<PathBuf>,
}

impl PeerBuilder {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Spawn the process and bind the connection to its stdio.
    pub fn open(self) -> Result<PeerConnection> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).envs(self.envs.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        PeerConnection::open(command)
    }
}

/// A running peer process and the framed connection to it.
pub struct PeerConnection {
    child: Child,
    pid: u32,
    streams: Option<PeerStreams>,
}

impl PeerConnection {
    /// Spawn `command` with piped stdin/stdout and take ownership of it.
    pub fn open(mut command: Command) -> Result<Self> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let pid = child.id().unwrap_or(0);
        let stdin = child.stdin.take().ok_or(ConformanceError::ConnectionClosed)?;
        let stdout = child.stdout.take().ok_or(ConformanceError::ConnectionClosed)?;

        tracing::debug!(pid, "Spawned peer process");

        Ok(Self {
            child,
            pid,
            streams: Some(Connection::new(BufReader::new(stdout), stdin)),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Close our end of the pipes and wait for the process to terminate.
    ///
    /// A non-zero exit is an error when `expect_success` is set and a warning
    /// otherwise. A child that was already reaped is not an error.
    pub async fn await_exit(&mut self, expect_success: bool) -> Result<()> {
        // Dropping stdin delivers EOF to the peer.
        self.streams = None;

        let status = match self.child.wait().await {
            Ok(status) => status,
            Err(e) if e.raw_os_error() == Some(NO_SUCH_CHILD) => {
                tracing::info!(pid = self.pid, "Peer process already reaped");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if status.success() {
            tracing::debug!(pid = self.pid, "Peer process exited");
            return Ok(());
        }

        let code = status.code().unwrap_or(-1);
        if expect_success {
            Err(ConformanceError::ProcessExit {
                pid: self.pid,
                code,
            })
        } else {
            tracing::warn!(pid = self.pid, code, "Peer process exited unsuccessfully");
            Ok(())
        }
    }
}

impl Exchange for PeerConnection {
    fn exchange_message(&mut self, request: Message) -> impl Future<Output = Result<Message>> + Send {
        async move {
            let streams = self
                .streams
                .as_mut()
                .ok_or(ConformanceError::ConnectionClosed)?;
            streams.exchange_message(request).await
        }
    }
}
