pub mod import;
pub mod operations;
pub mod versions;

use strata_import::ImportService;

use crate::cli::{Commands, GlobalFlags};

/// Dispatch a parsed command to its handler.
pub async fn dispatch(
    command: Commands,
    service: &ImportService,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match command {
        Commands::Import(args) => import::handle(&args, service, flags).await,
        Commands::Status { id } => operations::status(&id, service, flags).await,
        Commands::List => operations::list(service, flags).await,
        Commands::DownloadUrl { id } => operations::download_url(&id, service, flags).await,
        Commands::Versions { entity_id } => versions::list(entity_id, service, flags).await,
        Commands::Delete { entity_id } => versions::delete(entity_id, service, flags).await,
        Commands::Rename {
            entity_id,
            new_name,
        } => versions::rename(entity_id, &new_name, service, flags).await,
    }
}
