pub mod images;
pub mod upload;
pub mod webhooks;
