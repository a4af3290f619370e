use serde::Serialize;
use strata_import::ImportService;

use crate::cli::GlobalFlags;
use crate::output::output;

#[derive(Serialize)]
struct DownloadLink {
    id: String,
    url: String,
}

/// Handle `strata status`.
pub async fn status(id: &str, service: &ImportService, flags: &GlobalFlags) -> anyhow::Result<()> {
    let operation = service.get(id).await?;
    output(&operation, flags.format)
}

/// Handle `strata list`.
pub async fn list(service: &ImportService, flags: &GlobalFlags) -> anyhow::Result<()> {
    let operations = service.list().await?;
    output(&operations, flags.format)
}

/// Handle `strata download-url`.
pub async fn download_url(
    id: &str,
    service: &ImportService,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let url = service.download_url(id).await?;
    output(
        &DownloadLink {
            id: id.to_string(),
            url,
        },
        flags.format,
    )
}
