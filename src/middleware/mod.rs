pub mod response;
pub mod sanitize;

pub use response::{ApiResponse, ApiResult};
pub use sanitize::sanitize_middleware;
