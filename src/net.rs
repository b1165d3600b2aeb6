//! TCP plumbing: the accept loop and the per-connection reader, writer and
//! flusher tasks.

use crate::peer::{MessageQueueItem, OUTGOING_QUEUE_CAPACITY};
use crate::state::State;
use crate::trace::Trace;
use ferric_reader::LineReader;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use tokio::time::{self, MissedTickBehavior};

/// How long buffered output may sit before it is force-flushed.
const FLUSH_PERIOD: Duration = Duration::from_millis(1);

/// Accepts connections forever, spawning a reader, a writer and a flusher
/// task for each.
pub async fn serve(listener: TcpListener, state: State, trace: Option<Arc<Trace>>) -> io::Result<()> {
    loop {
        let (socket, addr) = listener.accept().await?;
        if let Err(err) = socket.set_nodelay(true) {
            log::warn!("{}: failed to disable Nagle: {}", addr, err);
        }
        let (read_half, write_half) = socket.into_split();
        let (queue, outgoing) = mpsc::channel(OUTGOING_QUEUE_CAPACITY);
        let disconnect = Arc::new(Notify::new());
        tokio::spawn(flush_loop(queue.downgrade()));
        let key = state.peer_joined(queue, disconnect.clone()).await;
        log::info!("{}: connected from {}", key, addr);
        tokio::spawn(write_loop(outgoing, write_half, disconnect.clone()));
        tokio::spawn(read_loop(read_half, state.clone(), key, disconnect, trace.clone()));
    }
}

/// Enqueues a flush request for the peer on every tick.
///
/// Holds only a weak handle so the queue still closes when the peer is
/// dropped from the registry; the flusher ends with it. A full queue also
/// ends it.
async fn flush_loop(queue: mpsc::WeakSender<MessageQueueItem>) {
    let mut tick = time::interval(FLUSH_PERIOD);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tick.tick().await;
        let Some(queue) = queue.upgrade() else { return };
        if queue.try_send(MessageQueueItem::flush()).is_err() {
            return;
        }
    }
}

/// Reads lines and feeds them to the state until the stream ends, the peer
/// quits, or the connection is torn down from the write side.
async fn read_loop(
    read_half: OwnedReadHalf,
    state: State,
    key: usize,
    disconnect: Arc<Notify>,
    trace: Option<Arc<Trace>>,
) {
    let mut reader = LineReader::new(read_half);
    let mut error = None;
    loop {
        let line = tokio::select! {
            line = reader.read_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    log::debug!("{}: read failed: {}", key, err);
                    error = Some(err);
                    break;
                }
            },
            _ = disconnect.notified() => break,
        };
        let flow = match &trace {
            Some(trace) => {
                // One command per trace critical section, so the trace shows
                // each response right after the input line that caused it.
                let _serialized = trace.serialized().await;
                trace.input(key, &line);
                state.handle_line(key, &line).await
            }
            None => state.handle_line(key, &line).await,
        };
        if flow.is_break() {
            break;
        }
    }
    // Dropping the peer closes its queue; the writer drains what is left,
    // flushes and hangs up.
    state.peer_quit(key, error).await;
}

/// Drains a peer's queue to its socket, batching writes and flushing when the
/// queue runs dry or a flush request comes in.
async fn write_loop(
    mut outgoing: mpsc::Receiver<MessageQueueItem>,
    write_half: OwnedWriteHalf,
    disconnect: Arc<Notify>,
) {
    let mut out = BufWriter::new(write_half);
    loop {
        tokio::select! {
            item = outgoing.recv() => {
                let Some(item) = item else { break };
                let result = if item.as_ref().is_empty() {
                    // A flush request from the flusher task.
                    if out.buffer().is_empty() {
                        Ok(())
                    } else {
                        out.flush().await
                    }
                } else {
                    out.write_all(item.as_ref().as_bytes()).await
                };
                if result.is_err() {
                    break;
                }
                if outgoing.is_empty() && !out.buffer().is_empty() && out.flush().await.is_err() {
                    break;
                }
            }
            _ = disconnect.notified() => break,
        }
    }
    let _ = out.flush().await;
    // Wake the reader in case the teardown started on this side.
    disconnect.notify_one();
}
