pub mod multipart;
pub mod slug;
pub mod text;
pub mod validation;
