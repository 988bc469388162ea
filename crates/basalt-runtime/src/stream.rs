//! Ordered submission queues.

use basalt_core::{CompiledPartition, Engine, Error, Result, Tensor};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique stream identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    fn next() -> Self {
        Self(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream{}", self.0)
    }
}

/// One unit of submitted work.
pub(crate) struct Job {
    pub(crate) compiled: CompiledPartition,
    pub(crate) inputs: Vec<Tensor>,
    pub(crate) outputs: Vec<Tensor>,
}

impl Job {
    fn run(&self) -> Result<()> {
        self.compiled
            .backend()
            .execute(&self.compiled, &self.inputs, &self.outputs)
    }
}

enum Command {
    Job(Job),
    /// Reply with the first error since the previous fence, clearing it.
    Fence(Sender<Option<Error>>),
}

/// Ordered queue of compiled-partition executions bound to one engine.
///
/// Jobs run on a dedicated worker thread strictly in submission order. A
/// job's failure does not stop later jobs; the first failure is reported
/// by the next [`Stream::wait`]. Dropping the stream drains the queue and
/// joins the worker.
pub struct Stream {
    id: StreamId,
    engine: Engine,
    sender: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    submitted: AtomicU64,
}

impl Stream {
    /// Create a stream on an engine and start its worker.
    ///
    /// # Errors
    ///
    /// Returns `Backend` if the worker thread cannot be spawned.
    pub fn new(engine: Engine) -> Result<Self> {
        let id = StreamId::next();
        let (sender, receiver) = mpsc::channel();
        let worker = thread::Builder::new()
            .name(format!("basalt-{id}"))
            .spawn(move || run_worker(id, receiver))
            .map_err(|e| Error::Backend(format!("failed to spawn worker for {id}: {e}")))?;

        tracing::debug!(stream = %id, engine = %engine, "stream created");
        Ok(Self {
            id,
            engine,
            sender: Some(sender),
            worker: Some(worker),
            submitted: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Get the engine this stream is bound to.
    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Number of jobs submitted over the stream's lifetime.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub(crate) fn enqueue(&self, job: Job) -> Result<()> {
        self.sender()?
            .send(Command::Job(job))
            .map_err(|_| self.closed())?;
        let seq = self.submitted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(stream = %self.id, seq, "job enqueued");
        Ok(())
    }

    /// Block until every job submitted so far has finished.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a job since the previous `wait`,
    /// or `Backend` if the worker has stopped.
    #[tracing::instrument(skip_all, fields(stream = %self.id))]
    pub fn wait(&self) -> Result<()> {
        let (reply, done) = mpsc::channel();
        self.sender()?
            .send(Command::Fence(reply))
            .map_err(|_| self.closed())?;
        match done.recv() {
            Ok(None) => Ok(()),
            Ok(Some(err)) => Err(err),
            Err(_) => Err(self.closed()),
        }
    }

    fn sender(&self) -> Result<&Sender<Command>> {
        self.sender.as_ref().ok_or_else(|| self.closed())
    }

    fn closed(&self) -> Error {
        Error::Backend(format!("worker of {} has stopped", self.id))
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("engine", &self.engine)
            .field("submitted", &self.submitted())
            .finish()
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain the queue and exit
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!(stream = %self.id, "stream worker panicked");
            }
        }
    }
}

fn run_worker(id: StreamId, receiver: Receiver<Command>) {
    let mut first_error: Option<Error> = None;
    for command in receiver {
        match command {
            Command::Job(job) => {
                let partition = job.compiled.partition().id();
                match job.run() {
                    Ok(()) => tracing::trace!(stream = %id, partition, "job finished"),
                    Err(err) => {
                        tracing::warn!(stream = %id, partition, error = %err, "job failed");
                        first_error.get_or_insert(err);
                    }
                }
            }
            Command::Fence(reply) => {
                // Waiter may be gone
                let _ = reply.send(first_error.take());
            }
        }
    }
    tracing::debug!(stream = %id, "stream worker exiting");
}
