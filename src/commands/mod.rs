pub mod annotate;
pub mod summary;
pub mod transcript;
