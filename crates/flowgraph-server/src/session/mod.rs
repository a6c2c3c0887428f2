//! One execution of a sheet, from loading its files to recording the run.
//!
//! A session moves through [`Phase`]s:
//!
//! - **Preparing**: load the sheet, pick the entry file, instrument it (or
//!   extract its graph host-side in static mode);
//! - **Uploading**: open a worker workspace and upload every file, bounded
//!   by the setup timeout;
//! - **Running**: start the interpreter with the merged `.env` variables;
//! - **Draining**: stream stdout and stderr to the client while watching
//!   stdout for the graph frame;
//! - **Completed** / **Failed**: send the status line and persist the run.
//!
//! The client first receives a `Backend: Preparing...` line. Setup failures
//! then end the session with a single `Error: ...` line. Once the
//! process has started, the run record is persisted whatever its outcome.

pub mod drain;
pub mod prepare;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::Instrument;

use flowgraph_core::PipelineGraph;
use flowgraph_storage::{PlaygroundId, RunId, RunRecord, SheetId};

use crate::error::{SessionError, WorkerError};
use crate::schema::events::{GraphReady, ServerMessage};
use crate::state::{AppState, SharedStore};
use crate::worker::RunningProcess;
use drain::{OutputAccumulator, Utf8Decoder};

/// Channel to the client connection's writer task.
pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;

const READ_CHUNK: usize = 8 * 1024;

/// First line of every session, sent before the sheet is loaded.
pub const PREPARING_LINE: &str = "Backend: Preparing to run your code...\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Preparing,
    Uploading,
    Running,
    Draining,
    Completed,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Preparing => "preparing",
            Phase::Uploading => "uploading",
            Phase::Running => "running",
            Phase::Draining => "draining",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Where client input goes: the running process's stdin, if any.
///
/// Shared between the connection (which forwards input) and the session
/// (which attaches a process and detaches it at exit).
#[derive(Debug, Clone, Default)]
pub struct StdinSlot {
    inner: Arc<Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl StdinSlot {
    /// Forwards `input` verbatim. Returns `false`, dropping the input, when
    /// no process is running.
    pub fn forward(&self, input: &str) -> bool {
        let slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(tx) => tx.send(input.as_bytes().to_vec()).is_ok(),
            None => false,
        }
    }

    fn attach(&self, tx: mpsc::UnboundedSender<Vec<u8>>) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
    }

    fn detach(&self) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// What a finished session reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// `None` when the process was killed or its status could not be read.
    pub exit_code: Option<i32>,
    /// `None` when persisting the run record failed.
    pub run_id: Option<RunId>,
    pub graph_emitted: bool,
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// State shared by the session driver and its reader tasks.
struct Shared {
    sheet_id: SheetId,
    playground_id: PlaygroundId,
    client: ClientSender,
    store: SharedStore,
    output: Mutex<OutputAccumulator>,
}

impl Shared {
    fn accumulator(&self) -> std::sync::MutexGuard<'_, OutputAccumulator> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn deliver(&self, stream: Stream, text: String) {
        let _ = self.client.send(ServerMessage::Output(text.clone()));
        if let Stream::Stdout = stream {
            let graph = self.accumulator().append(&text);
            if let Some(graph) = graph {
                self.publish_graph(graph).await;
            }
        }
    }

    /// Persists the graph, then tells the client it is ready. A failed
    /// write is logged and the client is not notified.
    async fn publish_graph(&self, graph: PipelineGraph) {
        tracing::info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            failed = graph.is_failed(),
            "graph recovered"
        );
        let saved = self.store.lock().await.save_graph(&self.sheet_id, &graph);
        match saved {
            Ok(()) => {
                let _ = self.client.send(ServerMessage::GraphReady(GraphReady::new(
                    self.sheet_id.clone(),
                    self.playground_id.clone(),
                )));
            }
            Err(e) => tracing::warn!(error = %e, "failed to persist graph"),
        }
    }
}

fn enter(phase: Phase) {
    tracing::debug!(%phase, "phase");
}

/// Runs one session for the given sheet, streaming to `client`.
///
/// Setup errors are reported to the client as `Error: <message>\r\n` and
/// returned.
pub async fn run_session(
    state: AppState,
    sheet_id: SheetId,
    playground_id: PlaygroundId,
    client: ClientSender,
    stdin: StdinSlot,
) -> Result<RunSummary, SessionError> {
    let span = tracing::info_span!("session", id = %uuid::Uuid::new_v4(), sheet = %sheet_id);
    async move {
        let result = drive(&state, sheet_id, playground_id, &client, &stdin).await;
        stdin.detach();
        match &result {
            Ok(summary) => {
                tracing::info!(
                    phase = %Phase::Completed,
                    exit_code = ?summary.exit_code,
                    "session finished"
                );
            }
            Err(e) => {
                tracing::warn!(phase = %Phase::Failed, error = %e, "session failed");
                let _ = client.send(ServerMessage::Output(format!("Error: {}\r\n", e)));
            }
        }
        result
    }
    .instrument(span)
    .await
}

async fn drive(
    state: &AppState,
    sheet_id: SheetId,
    playground_id: PlaygroundId,
    client: &ClientSender,
    stdin: &StdinSlot,
) -> Result<RunSummary, SessionError> {
    enter(Phase::Preparing);
    let _ = client.send(ServerMessage::Output(PREPARING_LINE.to_string()));
    let sheet = state.store.lock().await.get_sheet(&sheet_id, &playground_id)?;
    let mut prepared = prepare::prepare(&sheet, &state.config)?;
    tracing::info!(
        language = %prepared.language,
        entry = %prepared.entry,
        files = prepared.uploads.len(),
        mode = %state.config.graph_mode,
        "sheet prepared"
    );

    let shared = Arc::new(Shared {
        sheet_id: sheet_id.clone(),
        playground_id,
        client: client.clone(),
        store: state.store.clone(),
        output: Mutex::new(if prepared.language.extracts_graph() {
            OutputAccumulator::new()
        } else {
            OutputAccumulator::without_graph()
        }),
    });
    if let Some(graph) = prepared.static_graph.take() {
        shared.accumulator().mark_graph_emitted();
        shared.publish_graph(graph).await;
    }

    enter(Phase::Uploading);
    let setup = async {
        let mut conn = state.worker.connect().await?;
        for file in &prepared.uploads {
            conn.upload(&file.filename, file.code.as_bytes()).await?;
        }
        Ok::<_, WorkerError>(conn)
    };
    let mut conn = tokio::time::timeout(state.config.setup_timeout, setup)
        .await
        .map_err(|_| SessionError::SetupTimeout {
            secs: state.config.setup_timeout.as_secs(),
        })??;

    enter(Phase::Running);
    let RunningProcess {
        stdin: process_stdin,
        stdout,
        stderr,
        exit,
    } = conn.execute(&prepared.launch, &prepared.env).await?;
    tracing::info!(command = %prepared.launch, "process started");

    let mut stdin_task = JoinSet::new();
    let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
    stdin.attach(stdin_tx);
    stdin_task.spawn(forward_stdin(stdin_rx, process_stdin));

    enter(Phase::Draining);
    let mut readers = JoinSet::new();
    readers.spawn(pump(stdout, Stream::Stdout, shared.clone()));
    readers.spawn(pump(stderr, Stream::Stderr, shared.clone()));

    let exit = exit.await;
    while readers.join_next().await.is_some() {}
    stdin.detach();
    stdin_task.abort_all();

    let status = match &exit {
        Ok(Some(code)) => format!("\r\nBackend: Process exited with code {}.\r\n", code),
        Ok(None) => "\r\nBackend: Process terminated by a signal.\r\n".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "process status unavailable");
            format!("\r\nBackend: Process failed: {}.\r\n", e)
        }
    };
    let _ = client.send(ServerMessage::Output(status));
    let exit_code = exit.ok().flatten();

    let (output, timings, graph_emitted) = {
        let acc = shared.accumulator();
        let (output, timings) = acc.finish();
        (output, timings, acc.graph_emitted())
    };
    let record = RunRecord {
        sheet_id,
        output,
        timings,
        exit_code,
    };
    let inserted = state.store.lock().await.insert_run(&record);
    let run_id = match inserted {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(error = %e, "failed to persist run record");
            None
        }
    };

    Ok(RunSummary {
        exit_code,
        run_id,
        graph_emitted,
    })
}

async fn pump(mut reader: Box<dyn AsyncRead + Send + Unpin>, stream: Stream, shared: Arc<Shared>) {
    let mut buf = vec![0u8; READ_CHUNK];
    let mut decoder = Utf8Decoder::default();
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(?stream, error = %e, "read failed");
                break;
            }
        };
        let text = decoder.decode(&buf[..n]);
        if !text.is_empty() {
            shared.deliver(stream, text).await;
        }
    }
    let rest = decoder.finish();
    if !rest.is_empty() {
        shared.deliver(stream, rest).await;
    }
}

async fn forward_stdin(
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    mut sink: Box<dyn AsyncWrite + Send + Unpin>,
) {
    while let Some(bytes) = rx.recv().await {
        if sink.write_all(&bytes).await.is_err() || sink.flush().await.is_err() {
            break;
        }
    }
}
