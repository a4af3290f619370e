use anyhow::Context;
use strata_core::enums::ImportStatus;
use strata_core::progress::ImportOperationUpdate;
use strata_import::{FileFormat, ImportService};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::{GlobalFlags, ImportArgs};
use crate::output::output;
use crate::progress::Progress;

/// Handle `strata import`.
///
/// The import runs inside this process, so the command always stays until it
/// settles. Without `--wait` the PENDING record is printed straight away;
/// with it, progress is shown and the final record printed.
pub async fn handle(
    args: &ImportArgs,
    service: &ImportService,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let path = &args.file;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;
    let format = FileFormat::from_file_name(name)?;

    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    service.check_size(metadata.len())?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;

    let mut updates = service.subscribe();
    let ticket = service.submit(name, bytes, format.content_type()).await?;
    let id = ticket.operation.id.clone();

    if !args.wait {
        output(&ticket.operation, flags.format)?;
        ticket.wait().await?;
        return Ok(());
    }

    let progress = Progress::spinner(&format!("{id}: pending"), flags);
    let completion = ticket.wait();
    tokio::pin!(completion);
    let result = loop {
        tokio::select! {
            result = &mut completion => break result,
            update = updates.recv() => match update {
                Ok(update) if update.id == id => progress.set_message(&describe(&update)),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break (&mut completion).await,
            },
        }
    };

    match result {
        Ok(operation) => {
            progress.finish_ok(&format!(
                "{id}: {} imported, {} duplicates",
                operation.ok_count.unwrap_or(0),
                operation.duplicate_count.unwrap_or(0)
            ));
            output(&operation, flags.format)
        }
        Err(error) => {
            progress.finish_err(&format!("{id}: failed"));
            if let Ok(operation) = service.get(&id).await {
                output(&operation, flags.format)?;
            }
            Err(error).with_context(|| format!("import {id} failed"))
        }
    }
}

fn describe(update: &ImportOperationUpdate) -> String {
    match (update.status, update.entry_count) {
        (Some(ImportStatus::InProgress), Some(entries)) => {
            format!("{}: merging {entries} records", update.id)
        }
        (Some(status), _) => format!("{}: {status}", update.id),
        (None, _) => update.id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use strata_core::enums::ImportStatus;
    use strata_core::progress::ImportOperationUpdate;

    use super::describe;

    #[test]
    fn in_progress_shows_entry_count() {
        let update = ImportOperationUpdate {
            status: Some(ImportStatus::InProgress),
            entry_count: Some(12),
            ..ImportOperationUpdate::new("imp-1")
        };
        assert_eq!(describe(&update), "imp-1: merging 12 records");
    }

    #[test]
    fn other_statuses_use_their_name() {
        let update = ImportOperationUpdate {
            status: Some(ImportStatus::Success),
            ..ImportOperationUpdate::new("imp-1")
        };
        assert_eq!(describe(&update), "imp-1: success");
    }
}
