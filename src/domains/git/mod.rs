pub mod cache;
pub mod gateway;
pub mod text_diff;

pub use cache::GitOperationsCache;
pub use gateway::{GitGateway, GitGatewayError};
pub use text_diff::{unified_diff, unified_diff_with_context};
