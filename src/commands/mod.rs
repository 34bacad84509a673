pub mod config;
pub mod ingest;
pub mod item;
pub mod recommend;
pub mod serve;

use anyhow::Result;
use std::sync::Arc;

use affinity::config::Config;
use affinity::RecommendationService;

/// Open the service described by `config`
pub(crate) fn open_service(config: &Config) -> Result<Arc<RecommendationService>> {
    Ok(Arc::new(RecommendationService::from_config(config)?))
}
