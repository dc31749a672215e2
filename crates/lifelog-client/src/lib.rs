pub mod http;
pub mod mock;
pub mod search;

pub use http::{LifelogClient, DEFAULT_BASE_URL};
pub use mock::MockApi;
