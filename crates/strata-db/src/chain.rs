//! Version chain edits that own their transaction.
//!
//! Each call opens a session, runs the edit in an IMMEDIATE transaction, and
//! retries the whole unit on write conflicts.

use libsql::TransactionBehavior;
use strata_core::entities::HumanBeing;
use strata_core::records::CandidateRecord;

use crate::StrataDb;
use crate::error::DatabaseError;
use crate::repos::human_being;
use crate::retry::{RetryConfig, with_conflict_retry};

impl StrataDb {
    /// Create one entity as a new chain root.
    ///
    /// # Errors
    ///
    /// Violations from [`human_being::create`], or a conflict after retries.
    pub async fn create_human_being(
        &self,
        record: &CandidateRecord,
        retry: &RetryConfig,
    ) -> Result<HumanBeing, DatabaseError> {
        let db = self;
        with_conflict_retry(retry, "create human being", move |_| async move {
            let session = db.session().await?;
            let tx = session
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .await?;
            match human_being::create(&tx, record).await {
                Ok(created) => {
                    tx.commit().await?;
                    Ok(created)
                }
                Err(e) => {
                    tx.rollback().await?;
                    Err(e)
                }
            }
        })
        .await
    }

    /// Delete one version and repair its chain.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, or a conflict after retries.
    pub async fn delete_human_being(
        &self,
        id: i64,
        retry: &RetryConfig,
    ) -> Result<HumanBeing, DatabaseError> {
        let db = self;
        with_conflict_retry(retry, "delete human being", move |_| async move {
            let session = db.session().await?;
            let tx = session
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .await?;
            match human_being::delete(&tx, id).await {
                Ok(removed) => {
                    tx.commit().await?;
                    tracing::info!(id, name = %removed.name, "human being deleted");
                    Ok(removed)
                }
                Err(e) => {
                    tx.rollback().await?;
                    Err(e)
                }
            }
        })
        .await
    }

    /// Rename one version, moving it into a chain of its own.
    ///
    /// # Errors
    ///
    /// `NameTaken` if a current version holds `new_name`, `NotFound` for an
    /// unknown id, or a conflict after retries.
    pub async fn rename_human_being(
        &self,
        id: i64,
        new_name: &str,
        retry: &RetryConfig,
    ) -> Result<HumanBeing, DatabaseError> {
        let db = self;
        with_conflict_retry(retry, "rename human being", move |_| async move {
            let session = db.session().await?;
            let tx = session
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .await?;
            match human_being::rename(&tx, id, new_name).await {
                Ok(renamed) => {
                    tx.commit().await?;
                    tracing::info!(id, name = %renamed.name, "human being renamed");
                    Ok(renamed)
                }
                Err(e) => {
                    tx.rollback().await?;
                    Err(e)
                }
            }
        })
        .await
    }

    /// Every version in the chain containing `id`, oldest first.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub async fn versions(&self, id: i64) -> Result<Vec<HumanBeing>, DatabaseError> {
        human_being::chain(&self.conn, id).await
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{DatabaseError, Violation};
    use crate::retry::RetryConfig;
    use crate::test_support::{candidate, test_db};

    #[tokio::test]
    async fn create_rename_delete_round() {
        let db = test_db().await;
        let retry = RetryConfig::no_retry();
        let alice = db.create_human_being(&candidate("Alice"), &retry).await.unwrap();

        let renamed = db.rename_human_being(alice.id, "Alicia", &retry).await.unwrap();
        assert_eq!(renamed.name, "Alicia");

        let err = db
            .create_human_being(&candidate("Alicia"), &retry)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Violation(Violation::NameTaken(_))));

        db.delete_human_being(alice.id, &retry).await.unwrap();
        assert!(db.versions(alice.id).await.is_err());
    }

    #[tokio::test]
    async fn failed_edit_rolls_back() {
        let db = test_db().await;
        let retry = RetryConfig::no_retry();
        db.create_human_being(&candidate("Alice"), &retry).await.unwrap();
        let bob = db.create_human_being(&candidate("Bob"), &retry).await.unwrap();

        assert!(db.rename_human_being(bob.id, "Alice", &retry).await.is_err());
        // the session is released and the row unchanged
        let chain = db.versions(bob.id).await.unwrap();
        assert_eq!(chain[0].name, "Bob");
    }
}
