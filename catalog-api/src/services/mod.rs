pub mod auth;
pub mod banners;
pub mod categories;
pub mod comments;
pub mod images;
pub mod leads;
pub mod ordering;
pub mod products;
pub mod storage;
pub mod subcategories;
pub mod users;

pub use auth::AuthService;
pub use banners::BannerService;
pub use categories::CategoryService;
pub use comments::CommentService;
pub use images::MediaStore;
pub use leads::LeadService;
pub use products::ProductService;
pub use storage::{ObjectStore, S3ObjectStore};
pub use subcategories::SubCategoryService;
pub use users::UserService;
