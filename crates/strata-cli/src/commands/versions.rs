use strata_import::ImportService;

use crate::cli::GlobalFlags;
use crate::output::output;

/// Handle `strata versions`: the whole chain, oldest first.
pub async fn list(entity_id: i64, service: &ImportService, flags: &GlobalFlags) -> anyhow::Result<()> {
    let chain = service.db().versions(entity_id).await?;
    output(&chain, flags.format)
}

/// Handle `strata delete`. Prints the removed version.
pub async fn delete(
    entity_id: i64,
    service: &ImportService,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let removed = service
        .db()
        .delete_human_being(entity_id, service.retry())
        .await?;
    output(&removed, flags.format)
}

/// Handle `strata rename`.
pub async fn rename(
    entity_id: i64,
    new_name: &str,
    service: &ImportService,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let renamed = service
        .db()
        .rename_human_being(entity_id, new_name, service.retry())
        .await?;
    output(&renamed, flags.format)
}
