use async_trait::async_trait;

use crate::errors::UpstreamError;
use crate::lifelog::{Lifelog, LifelogPage, LifelogQuery};

/// The upstream lifelog provider, reduced to the operations the tools need.
/// Implemented by the HTTP client and by the test mock.
#[async_trait]
pub trait LifelogApi: Send + Sync {
    async fn get_lifelogs(&self, query: &LifelogQuery) -> Result<LifelogPage, UpstreamError>;

    async fn get_lifelog_by_id(&self, id: &str) -> Result<Lifelog, UpstreamError>;

    async fn delete_lifelog(&self, id: &str) -> Result<(), UpstreamError>;
}
