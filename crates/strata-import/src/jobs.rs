//! In-process job queue for CPU-bound work.
//!
//! Jobs run on tokio's blocking pool, at most `workers` at a time. Each
//! [`JobQueue::enqueue`] returns a [`JobHandle`] whose result arrives over a
//! oneshot channel. A worker that panics resolves its handle with
//! [`JobError::WorkerCrashed`]; jobs still waiting for a worker when the queue
//! shuts down resolve with [`JobError::QueueClosed`].

use std::sync::Arc;

use strata_core::records::CandidateRecord;
use strata_schema::SchemaRegistry;
use tokio::sync::{Semaphore, oneshot};
use tracing::Instrument;

use crate::error::JobError;
use crate::parser::{self, FileFormat};

/// Work the queue knows how to run.
#[derive(Debug)]
pub enum Job {
    Parse { bytes: Vec<u8>, format: FileFormat },
    #[cfg(test)]
    Panic,
}

impl Job {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            #[cfg(test)]
            Self::Panic => "panic",
        }
    }

    fn run(self, schemas: &SchemaRegistry) -> Result<JobOutput, JobError> {
        match self {
            Self::Parse { bytes, format } => {
                Ok(JobOutput::Parsed(parser::parse(&bytes, format, schemas)?))
            }
            #[cfg(test)]
            Self::Panic => panic!("job asked to panic"),
        }
    }
}

#[derive(Debug)]
pub enum JobOutput {
    Parsed(Vec<CandidateRecord>),
}

/// Pending result of an enqueued job.
pub struct JobHandle {
    rx: oneshot::Receiver<Result<JobOutput, JobError>>,
}

impl JobHandle {
    /// Wait for the job to finish.
    ///
    /// # Errors
    ///
    /// The job's own error, [`JobError::WorkerCrashed`] if the worker died,
    /// or [`JobError::QueueClosed`] if it never ran.
    pub async fn await_result(self) -> Result<JobOutput, JobError> {
        self.rx.await.unwrap_or_else(|_| {
            Err(JobError::WorkerCrashed(
                "worker dropped the job without replying".into(),
            ))
        })
    }
}

/// Bounded pool of blocking workers.
#[derive(Clone)]
pub struct JobQueue {
    schemas: Arc<SchemaRegistry>,
    permits: Arc<Semaphore>,
}

impl JobQueue {
    #[must_use]
    pub fn new(schemas: Arc<SchemaRegistry>, workers: usize) -> Self {
        Self {
            schemas,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Submit `job`. Must be called from within a tokio runtime.
    #[must_use]
    pub fn enqueue(&self, job: Job) -> JobHandle {
        let (tx, rx) = oneshot::channel();
        let permits = Arc::clone(&self.permits);
        let schemas = Arc::clone(&self.schemas);
        let kind = job.kind();
        let span = tracing::debug_span!("job", kind);

        tokio::spawn(
            async move {
                let Ok(permit) = permits.acquire_owned().await else {
                    let _ = tx.send(Err(JobError::QueueClosed));
                    return;
                };
                let worker_span = tracing::Span::current();
                let joined = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let _guard = worker_span.enter();
                    job.run(&schemas)
                })
                .await;
                let result = joined.unwrap_or_else(|e| {
                    tracing::error!(error = %e, "job worker crashed");
                    Err(JobError::WorkerCrashed(e.to_string()))
                });
                // The caller may have stopped waiting.
                let _ = tx.send(result);
            }
            .instrument(span),
        );
        JobHandle { rx }
    }

    /// Refuse further work. Jobs already running finish; waiting ones resolve
    /// with [`JobError::QueueClosed`].
    pub fn shutdown(&self) {
        self.permits.close();
        tracing::debug!("job queue closed");
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}
