pub mod banner;
pub mod category;
pub mod error;
pub mod lead;
pub mod product;
pub mod response;
pub mod settings;
pub mod user;

pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
