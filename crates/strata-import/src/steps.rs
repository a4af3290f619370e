//! The two resources an import coordinates: the uploaded object and the
//! database merge.

use std::sync::Arc;

use libsql::TransactionBehavior;
use strata_core::progress::ImportOperationUpdate;
use strata_core::records::CandidateRecord;
use strata_db::error::{DatabaseError, Violation};
use strata_db::merge::{self, MergeOutcome};
use strata_db::repos::import_operation;
use strata_db::retry::{RetryConfig, with_conflict_retry};
use strata_db::{DbSession, StrataDb};
use strata_storage::ImportFileStorage;

use crate::error::{INTERNAL_ERROR_MESSAGE, ImportError};
use crate::jobs::{Job, JobOutput, JobQueue};
use crate::notifier::ProgressNotifier;
use crate::parser::FileFormat;
use crate::saga::SagaStep;

/// Puts the raw file in object storage. Commit is a no-op; rollback deletes it.
pub struct UploadStep {
    storage: ImportFileStorage,
    object_name: String,
    content_type: String,
    bytes: Option<Vec<u8>>,
}

impl UploadStep {
    #[must_use]
    pub const fn new(
        storage: ImportFileStorage,
        object_name: String,
        content_type: String,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            storage,
            object_name,
            content_type,
            bytes: Some(bytes),
        }
    }

    async fn prepare(&mut self) -> Result<(), ImportError> {
        let bytes = self.bytes.take().unwrap_or_default();
        self.storage
            .upload(&self.object_name, bytes, &self.content_type)
            .await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), ImportError> {
        self.storage.delete(&self.object_name).await?;
        Ok(())
    }
}

/// What the database step shares with the rest of the pipeline.
#[derive(Clone)]
pub struct DatabaseContext {
    pub db: Arc<StrataDb>,
    pub jobs: JobQueue,
    pub notifier: ProgressNotifier,
    pub retry: RetryConfig,
    pub chunk_size: usize,
}

/// An import transaction that merged successfully and awaits commit.
struct OpenTransaction {
    tx: libsql::Transaction,
    outcome: MergeOutcome,
    /// Released after the transaction ends.
    session: DbSession,
}

/// Parses the file, records IN_PROGRESS, then merges inside one IMMEDIATE
/// transaction left open until commit.
pub struct DatabaseStep {
    ctx: DatabaseContext,
    operation_id: String,
    file_hash: String,
    format: FileFormat,
    bytes: Option<Vec<u8>>,
    candidates: Option<Vec<CandidateRecord>>,
    open: Option<OpenTransaction>,
    /// Message recorded when the step is rolled back.
    failure: Option<String>,
}

/// Separates failures a retry may clear from final ones.
enum AttemptError {
    Database(DatabaseError),
    Import(ImportError),
}

impl From<DatabaseError> for AttemptError {
    fn from(e: DatabaseError) -> Self {
        Self::Database(e)
    }
}

impl From<ImportError> for AttemptError {
    fn from(e: ImportError) -> Self {
        Self::Import(e)
    }
}

impl DatabaseStep {
    #[must_use]
    pub const fn new(
        ctx: DatabaseContext,
        operation_id: String,
        file_hash: String,
        format: FileFormat,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            ctx,
            operation_id,
            file_hash,
            format,
            bytes: Some(bytes),
            candidates: None,
            open: None,
            failure: None,
        }
    }

    async fn prepare(&mut self) -> Result<(), ImportError> {
        let result = self.try_prepare().await;
        if let Err(e) = &result {
            self.failure = Some(e.operation_message());
        }
        result
    }

    async fn try_prepare(&mut self) -> Result<(), ImportError> {
        // Only this operation may hold the hash.
        let holder =
            import_operation::find_active_by_hash(self.ctx.db.conn(), &self.file_hash).await?;
        if let Some(other) = holder.filter(|op| op.id != self.operation_id) {
            return Err(Violation::AlreadyImported {
                hash: other.file_hash,
            }
            .into());
        }

        // Parsing reads no database state, so it runs before any write lock.
        let entry_count = u64::try_from(self.candidates().await?.len()).unwrap_or(u64::MAX);
        self.mark_started(entry_count).await?;

        let retry = self.ctx.retry.clone();
        let mut attempt = 1;
        loop {
            match self.attempt().await {
                Ok(open) => {
                    self.open = Some(open);
                    return Ok(());
                }
                Err(AttemptError::Import(e)) => return Err(e),
                Err(AttemptError::Database(e)) => {
                    let delay = retry.after_failure("import merge", attempt, e)?;
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Commit IN_PROGRESS on its own so pollers see it while the merge runs.
    async fn mark_started(&self, entry_count: u64) -> Result<(), ImportError> {
        let db = &self.ctx.db;
        let id = self.operation_id.as_str();
        let update = with_conflict_retry(
            &self.ctx.retry,
            "mark import started",
            move |_| async move {
                let session = db.session().await?;
                import_operation::mark_started(&session, id, entry_count).await
            },
        )
        .await?;
        self.ctx.notifier.publish(update);
        Ok(())
    }

    /// One try at opening the transaction and merging into it.
    async fn attempt(&mut self) -> Result<OpenTransaction, AttemptError> {
        let db = Arc::clone(&self.ctx.db);
        let session = db.session().await?;
        let tx = session
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(DatabaseError::from)?;

        match self.merge_into(&tx).await {
            Ok(outcome) => Ok(OpenTransaction {
                tx,
                outcome,
                session,
            }),
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(operation = %self.operation_id, error = %rb, "rollback after failed merge");
                }
                Err(e)
            }
        }
    }

    async fn merge_into(&mut self, tx: &libsql::Connection) -> Result<MergeOutcome, AttemptError> {
        let id = self.operation_id.clone();
        let chunk_size = self.ctx.chunk_size;

        let candidates = self.candidates().await?;
        let outcome = merge::merge(tx, candidates, chunk_size).await?;
        tracing::info!(
            operation = %id,
            entries = candidates.len(),
            ok = outcome.ok_count,
            duplicates = outcome.duplicate_count,
            "import merged, awaiting commit"
        );
        Ok(outcome)
    }

    /// Parse once; later attempts reuse the records.
    async fn candidates(&mut self) -> Result<&[CandidateRecord], ImportError> {
        if self.candidates.is_none() {
            let bytes = self.bytes.take().ok_or_else(|| {
                ImportError::Infrastructure("import bytes already consumed".into())
            })?;
            let handle = self.ctx.jobs.enqueue(Job::Parse {
                bytes,
                format: self.format,
            });
            let JobOutput::Parsed(records) = handle.await_result().await?;
            self.candidates = Some(records);
        }
        Ok(self.candidates.as_deref().unwrap_or_default())
    }

    async fn commit(&mut self) -> Result<(), ImportError> {
        let result = self.try_commit().await;
        if let Err(e) = &result {
            self.failure = Some(e.operation_message());
        }
        result
    }

    async fn try_commit(&mut self) -> Result<(), ImportError> {
        let Some(open) = self.open.take() else {
            return Err(ImportError::Infrastructure(
                "database step committed before prepare".into(),
            ));
        };
        let succeeded = import_operation::mark_succeeded(
            &open.tx,
            &self.operation_id,
            open.outcome.ok_count,
            open.outcome.duplicate_count,
        )
        .await;
        let update = match succeeded {
            Ok(update) => update,
            Err(e) => {
                if let Err(rb) = open.tx.rollback().await {
                    tracing::warn!(operation = %self.operation_id, error = %rb, "rollback after failed status update");
                }
                return Err(e.into());
            }
        };
        open.tx.commit().await.map_err(DatabaseError::from)?;
        drop(open.session);

        tracing::info!(operation = %self.operation_id, "import committed");
        self.ctx.notifier.publish(update);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), ImportError> {
        if let Some(open) = self.open.take() {
            open.tx.rollback().await.map_err(DatabaseError::from)?;
            drop(open.session);
        }
        let message = self
            .failure
            .take()
            .unwrap_or_else(|| INTERNAL_ERROR_MESSAGE.to_string());
        let update = mark_failed(&self.ctx, &self.operation_id, &message).await?;
        self.ctx.notifier.publish(update);
        Ok(())
    }
}

/// Record a failure outside any import transaction.
pub(crate) async fn mark_failed(
    ctx: &DatabaseContext,
    operation_id: &str,
    message: &str,
) -> Result<ImportOperationUpdate, ImportError> {
    let db = &ctx.db;
    let update = with_conflict_retry(&ctx.retry, "mark import failed", move |_| async move {
        let session = db.session().await?;
        import_operation::mark_failed(&session, operation_id, message).await
    })
    .await?;
    tracing::info!(operation = %operation_id, reason = message, "import failed");
    Ok(update)
}

/// The steps of one import, in saga order.
pub enum ImportStep {
    Upload(UploadStep),
    Database(Box<DatabaseStep>),
}

impl SagaStep for ImportStep {
    type Error = ImportError;

    fn name(&self) -> &'static str {
        match self {
            Self::Upload(_) => "object store upload",
            Self::Database(_) => "database merge",
        }
    }

    async fn prepare(&mut self) -> Result<(), ImportError> {
        match self {
            Self::Upload(step) => step.prepare().await,
            Self::Database(step) => step.prepare().await,
        }
    }

    async fn commit(&mut self) -> Result<(), ImportError> {
        match self {
            // Already durable once uploaded.
            Self::Upload(_) => Ok(()),
            Self::Database(step) => step.commit().await,
        }
    }

    async fn rollback(&mut self) -> Result<(), ImportError> {
        match self {
            Self::Upload(step) => step.rollback().await,
            Self::Database(step) => step.rollback().await,
        }
    }
}
