//! Import intake, status queries, and downloads.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use strata_config::StrataConfig;
use strata_core::CoreError;
use strata_core::entities::ImportOperation;
use strata_core::enums::ImportStatus;
use strata_core::progress::ImportOperationUpdate;
use strata_db::StrataDb;
use strata_db::error::{DatabaseError, Violation};
use strata_db::repos::import_operation;
use strata_db::retry::{RetryConfig, with_conflict_retry};
use strata_schema::SchemaRegistry;
use strata_storage::{ImportFileStorage, generate_object_name};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::{ImportError, UserError};
use crate::jobs::JobQueue;
use crate::notifier::ProgressNotifier;
use crate::parser::FileFormat;
use crate::saga;
use crate::steps::{self, DatabaseContext, DatabaseStep, ImportStep, UploadStep};

/// Entry point for submitting and inspecting imports.
pub struct ImportService {
    ctx: DatabaseContext,
    storage: ImportFileStorage,
    max_file_size: u64,
    download_ttl: Duration,
}

/// A submitted import: the PENDING record plus a handle on the background run.
pub struct ImportTicket {
    pub operation: ImportOperation,
    completion: JoinHandle<Result<ImportOperation, ImportError>>,
}

impl ImportTicket {
    /// Wait for the import to finish.
    ///
    /// # Errors
    ///
    /// The error that failed the import. The operation is FAILED by then.
    pub async fn wait(self) -> Result<ImportOperation, ImportError> {
        self.completion
            .await
            .map_err(|e| ImportError::Infrastructure(format!("import task aborted: {e}")))?
    }
}

impl ImportService {
    /// Wire a service over an open database and storage backend.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::Infrastructure` if the record schemas fail to compile.
    pub fn new(
        db: Arc<StrataDb>,
        storage: ImportFileStorage,
        config: &StrataConfig,
    ) -> Result<Self, ImportError> {
        let schemas = SchemaRegistry::new()
            .map_err(|e| ImportError::Infrastructure(format!("record schemas: {e}")))?;
        let ctx = DatabaseContext {
            db,
            jobs: JobQueue::new(Arc::new(schemas), config.import.parse_workers),
            notifier: ProgressNotifier::default(),
            retry: RetryConfig::from(&config.retry),
            chunk_size: config.import.chunk_size,
        };
        Ok(Self {
            ctx,
            storage,
            max_file_size: config.import.max_file_size,
            download_ttl: Duration::from_secs(config.storage.download_ttl_secs),
        })
    }

    /// Open the database and storage named in `config`.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::Infrastructure` if either cannot be opened.
    pub async fn open(config: &StrataConfig) -> Result<Self, ImportError> {
        let db = StrataDb::open(&config.database).await?;
        let storage = ImportFileStorage::from_config(&config.storage).await?;
        Self::new(Arc::new(db), storage, config)
    }

    #[must_use]
    pub const fn db(&self) -> &Arc<StrataDb> {
        &self.ctx.db
    }

    #[must_use]
    pub const fn retry(&self) -> &RetryConfig {
        &self.ctx.retry
    }

    /// Reject uploads over the configured limit. Call before reading a file in.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::FileTooLarge`].
    pub fn check_size(&self, size: u64) -> Result<(), ImportError> {
        if size > self.max_file_size {
            return Err(UserError::FileTooLarge {
                size,
                limit: self.max_file_size,
            }
            .into());
        }
        Ok(())
    }

    /// Accept a file and start importing it in the background.
    ///
    /// Validation, the duplicate-content check and the PENDING record happen
    /// before this returns; upload, parse and merge run afterwards.
    ///
    /// # Errors
    ///
    /// User errors for an unsupported extension, an oversized file, or content
    /// already imported or in flight.
    pub async fn submit(
        &self,
        original_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ImportTicket, ImportError> {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let format = FileFormat::from_extension(extension)?;
        self.check_size(u64::try_from(bytes.len()).unwrap_or(u64::MAX))?;

        let file_hash = content_hash(&bytes);
        if import_operation::find_active_by_hash(self.ctx.db.conn(), &file_hash)
            .await?
            .is_some()
        {
            return Err(Violation::AlreadyImported { hash: file_hash }.into());
        }

        let object_name = generate_object_name(extension);
        let operation = self.create_operation(&object_name, &file_hash).await?;
        tracing::info!(
            operation = %operation.id,
            file = original_name,
            size = bytes.len(),
            %format,
            "import accepted"
        );
        self.ctx
            .notifier
            .publish(ImportOperationUpdate::snapshot(&operation));

        let steps = vec![
            ImportStep::Upload(UploadStep::new(
                self.storage.clone(),
                object_name,
                content_type.to_string(),
                bytes.clone(),
            )),
            ImportStep::Database(Box::new(DatabaseStep::new(
                self.ctx.clone(),
                operation.id.clone(),
                file_hash,
                format,
                bytes,
            ))),
        ];
        let span = tracing::info_span!("import", operation = %operation.id);
        let completion = tokio::spawn(
            run_import(self.ctx.clone(), operation.id.clone(), steps).instrument(span),
        );

        Ok(ImportTicket {
            operation,
            completion,
        })
    }

    async fn create_operation(
        &self,
        object_name: &str,
        file_hash: &str,
    ) -> Result<ImportOperation, ImportError> {
        let db = &self.ctx.db;
        let operation = with_conflict_retry(
            &self.ctx.retry,
            "create import operation",
            move |_| async move {
                let session = db.session().await?;
                import_operation::create(&session, object_name, file_hash).await
            },
        )
        .await?;
        Ok(operation)
    }

    /// # Errors
    ///
    /// [`UserError::NotFound`] for an unknown id.
    pub async fn get(&self, id: &str) -> Result<ImportOperation, ImportError> {
        match import_operation::get(self.ctx.db.conn(), id).await {
            Ok(op) => Ok(op),
            Err(DatabaseError::Core(CoreError::NotFound { .. })) => {
                Err(UserError::NotFound(id.to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Every operation, newest first.
    ///
    /// # Errors
    ///
    /// Database failures.
    pub async fn list(&self) -> Result<Vec<ImportOperation>, ImportError> {
        Ok(import_operation::list(self.ctx.db.conn()).await?)
    }

    /// Time-limited URL of the uploaded file of a successful import.
    ///
    /// # Errors
    ///
    /// [`UserError::NotFound`] for an unknown id, [`UserError::NotDownloadable`]
    /// unless the operation succeeded.
    pub async fn download_url(&self, id: &str) -> Result<String, ImportError> {
        let operation = self.get(id).await?;
        if operation.status != ImportStatus::Success {
            return Err(UserError::NotDownloadable {
                id: operation.id,
                status: operation.status,
            }
            .into());
        }
        Ok(self
            .storage
            .download_url(&operation.file_name, self.download_ttl)
            .await?)
    }

    /// Live updates for every import handled by this service.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ImportOperationUpdate> {
        self.ctx.notifier.subscribe()
    }

    /// Stop accepting parse work. Imports waiting for a worker fail.
    pub fn shutdown(&self) {
        self.ctx.jobs.shutdown();
    }
}

/// Lowercase hex SHA-256 of the file content.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

async fn run_import(
    ctx: DatabaseContext,
    id: String,
    mut steps: Vec<ImportStep>,
) -> Result<ImportOperation, ImportError> {
    match saga::run(&mut steps).await {
        Ok(()) => Ok(import_operation::get(ctx.db.conn(), &id).await?),
        Err(err) => {
            if err.is_user_error() {
                tracing::warn!(error = %err, "import rejected");
            } else {
                tracing::error!(error = %err, "import failed");
            }
            settle_failure(&ctx, &id, &err).await;
            Err(err)
        }
    }
}

/// Mark the record FAILED if no step did. Happens when the upload fails before
/// the database step prepares.
async fn settle_failure(ctx: &DatabaseContext, id: &str, err: &ImportError) {
    match import_operation::get(ctx.db.conn(), id).await {
        Ok(op) if op.status.is_terminal() => {}
        Ok(_) => match steps::mark_failed(ctx, id, &err.operation_message()).await {
            Ok(update) => ctx.notifier.publish(update),
            Err(e) => tracing::warn!(error = %e, "could not mark import failed"),
        },
        Err(e) => tracing::warn!(error = %e, "could not read import after failure"),
    }
}
