//! Response cache command handlers.

use super::commands::{CacheCommands, OutputFormat};
use palisade::{
    ApiResponse, CacheConfig, PalisadeResult, StorageError, StorageErrorKind,
    TieredCacheManager, render_cache_stats,
};

/// Handle cache subcommands.
pub async fn handle_cache_command(cmd: CacheCommands, config: &CacheConfig) -> PalisadeResult<()> {
    let cache = TieredCacheManager::<ApiResponse>::from_config(config).await?;

    match cmd {
        CacheCommands::Stats { format } => {
            let stats = cache.stats().await;
            match format {
                OutputFormat::Human => print!("{}", render_cache_stats(&stats)),
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&stats).map_err(|e| {
                        StorageError::new(StorageErrorKind::Serialization(e.to_string()))
                    })?;
                    println!("{}", json);
                }
            }
        }
        CacheCommands::Clear => {
            cache.clear().await;
            println!("Cache cleared.");
        }
    }
    Ok(())
}
