//! Local process host.
//!
//! [`LocalProcessHost`] runs server processes with `tokio::process` and
//! speaks newline-delimited JSON over their stdio. Every stdout line that
//! parses as a JSON object becomes [`HostEvent::Message`]; other stdout
//! lines and all stderr lines are reported verbatim.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use toolbridge_core::ServerIdentity;
//! use toolbridge_transport::{HostProcessTransport, LocalProcessHost, ProcessSpec, Transport};
//!
//! # async fn example() -> Result<(), toolbridge_transport::TransportError> {
//! let host = Arc::new(LocalProcessHost::new());
//! let transport = HostProcessTransport::new(
//!     ServerIdentity::new("files"),
//!     ProcessSpec::new("files-server").arg("--stdio"),
//!     host.clone(),
//! );
//! let _events = transport.connect().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_lock::Mutex as AsyncMutex;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, oneshot};
use toolbridge_core::identity::ServerIdentity;

use crate::error::TransportError;
use crate::host::{HostEvent, HostEventReceiver, ProcessHost, ProcessSpec};

/// How long `stop` waits for a process to exit after closing its stdin.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether a process is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    /// The process is running.
    Running,
    /// No process is running for the identity.
    Stopped,
}

struct RunningProcess {
    generation: u64,
    pid: Option<u32>,
    stdin: Arc<AsyncMutex<Option<ChildStdin>>>,
    kill: oneshot::Sender<()>,
    exited: oneshot::Receiver<()>,
}

#[derive(Default)]
struct HostInner {
    subscribers: AsyncMutex<HashMap<ServerIdentity, mpsc::UnboundedSender<HostEvent>>>,
    processes: AsyncMutex<HashMap<ServerIdentity, RunningProcess>>,
    generation: AtomicU64,
}

impl HostInner {
    async fn emit(&self, server: &ServerIdentity, event: HostEvent) {
        if let Some(tx) = self.subscribers.lock().await.get(server) {
            let _ = tx.send(event);
        }
    }
}

/// Runs server processes as children of this process.
#[derive(Clone)]
pub struct LocalProcessHost {
    inner: Arc<HostInner>,
    stop_timeout: Duration,
}

impl Default for LocalProcessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalProcessHost {
    /// Create a host with the default stop timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HostInner::default()),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Set how long `stop` waits before killing a process.
    #[must_use]
    pub const fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Status of the process for an identity.
    pub async fn status(&self, server: &ServerIdentity) -> ProcessStatus {
        if self.inner.processes.lock().await.contains_key(server) {
            ProcessStatus::Running
        } else {
            ProcessStatus::Stopped
        }
    }

    /// Status of every running process.
    pub async fn statuses(&self) -> HashMap<ServerIdentity, ProcessStatus> {
        self.inner
            .processes
            .lock()
            .await
            .keys()
            .map(|id| (id.clone(), ProcessStatus::Running))
            .collect()
    }

    /// OS process id for an identity, if running.
    pub async fn pid(&self, server: &ServerIdentity) -> Option<u32> {
        self.inner
            .processes
            .lock()
            .await
            .get(server)
            .and_then(|p| p.pid)
    }

    /// Stop every running process, returning how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let ids: Vec<ServerIdentity> = self.inner.processes.lock().await.keys().cloned().collect();
        let mut stopped = 0;
        for id in ids {
            match self.stop(&id).await {
                Ok(()) => stopped += 1,
                Err(e) => tracing::warn!(server = %id, error = %e, "Failed to stop process"),
            }
        }
        stopped
    }
}

#[async_trait]
impl ProcessHost for LocalProcessHost {
    async fn subscribe(
        &self,
        server: &ServerIdentity,
    ) -> Result<HostEventReceiver, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self
            .inner
            .subscribers
            .lock()
            .await
            .insert(server.clone(), tx)
            .is_some()
        {
            tracing::debug!(server = %server, "Replaced existing host subscription");
        }
        Ok(rx)
    }

    async fn unsubscribe(&self, server: &ServerIdentity) {
        self.inner.subscribers.lock().await.remove(server);
    }

    async fn start(&self, server: &ServerIdentity, spec: &ProcessSpec) -> Result<(), TransportError> {
        let mut processes = self.inner.processes.lock().await;
        if processes.contains_key(server) {
            return Err(TransportError::host(format!(
                "process for '{server}' is already running"
            )));
        }

        let (program, args) = spec.program()?;
        let mut command = tokio::process::Command::new(&program);
        command
            .args(&args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            TransportError::host(format!("failed to spawn process '{program}': {e}"))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::host("failed to capture child stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::host("failed to capture child stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportError::host("failed to capture child stderr"))?;

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let pid = child.id();
        let (kill_tx, kill_rx) = oneshot::channel();
        let (exited_tx, exited_rx) = oneshot::channel();

        let readers = [
            tokio::spawn(read_lines(
                Arc::clone(&self.inner),
                server.clone(),
                stdout,
                Stream::Stdout,
            )),
            tokio::spawn(read_lines(
                Arc::clone(&self.inner),
                server.clone(),
                stderr,
                Stream::Stderr,
            )),
        ];
        tokio::spawn(supervise(
            Arc::clone(&self.inner),
            server.clone(),
            generation,
            child,
            readers,
            kill_rx,
            exited_tx,
        ));

        processes.insert(
            server.clone(),
            RunningProcess {
                generation,
                pid,
                stdin: Arc::new(AsyncMutex::new(Some(stdin))),
                kill: kill_tx,
                exited: exited_rx,
            },
        );
        tracing::info!(server = %server, program = %program, pid = ?pid, "Started server process");
        Ok(())
    }

    async fn send(&self, server: &ServerIdentity, payload: String) -> Result<(), TransportError> {
        let stdin = self
            .inner
            .processes
            .lock()
            .await
            .get(server)
            .map(|p| Arc::clone(&p.stdin))
            .ok_or_else(|| TransportError::host(format!("no process running for '{server}'")))?;

        let mut guard = stdin.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| TransportError::host(format!("stdin of '{server}' is closed")))?;
        writer.write_all(payload.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn stop(&self, server: &ServerIdentity) -> Result<(), TransportError> {
        let process = self
            .inner
            .processes
            .lock()
            .await
            .remove(server)
            .ok_or_else(|| TransportError::host(format!("no process running for '{server}'")))?;
        let RunningProcess {
            stdin,
            kill,
            mut exited,
            ..
        } = process;

        // Closing stdin asks a stdio server to exit.
        stdin.lock().await.take();

        if tokio::time::timeout(self.stop_timeout, &mut exited)
            .await
            .is_err()
        {
            tracing::warn!(server = %server, timeout = ?self.stop_timeout, "Process did not exit; killing");
            let _ = kill.send(());
            let _ = exited.await;
        }
        tracing::info!(server = %server, "Stopped server process");
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

async fn read_lines<R>(inner: Arc<HostInner>, server: ServerIdentity, reader: R, stream: Stream)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(server = %server, error = %e, "Stopped reading process output");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match stream {
            Stream::Stderr => inner.emit(&server, HostEvent::Stderr(line)).await,
            Stream::Stdout => match serde_json::from_str::<Value>(trimmed) {
                Ok(value @ Value::Object(_)) => inner.emit(&server, HostEvent::Message(value)).await,
                Ok(Value::Array(batch)) => {
                    for value in batch {
                        inner.emit(&server, HostEvent::Message(value)).await;
                    }
                }
                _ => inner.emit(&server, HostEvent::Stdout(line)).await,
            },
        }
    }
}

/// Wait for the child to exit (or be killed), then report it.
async fn supervise(
    inner: Arc<HostInner>,
    server: ServerIdentity,
    generation: u64,
    mut child: Child,
    readers: [tokio::task::JoinHandle<()>; 2],
    mut kill: oneshot::Receiver<()>,
    exited: oneshot::Sender<()>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        Ok(()) = &mut kill => {
            if let Err(e) = child.start_kill() {
                tracing::warn!(server = %server, error = %e, "Failed to kill process");
            }
            child.wait().await
        }
    };

    // Drain output before announcing the exit.
    for reader in readers {
        let _ = reader.await;
    }

    match status {
        Ok(status) if status.success() => {
            tracing::debug!(server = %server, "Process exited");
        }
        Ok(status) => {
            inner
                .emit(&server, HostEvent::Error(format!("process exited with {status}")))
                .await;
        }
        Err(e) => {
            inner
                .emit(&server, HostEvent::Error(format!("failed to wait for process: {e}")))
                .await;
        }
    }
    inner.emit(&server, HostEvent::Stopped).await;

    let mut processes = inner.processes.lock().await;
    if processes
        .get(&server)
        .is_some_and(|p| p.generation == generation)
    {
        processes.remove(&server);
    }
    drop(processes);
    let _ = exited.send(());
}
