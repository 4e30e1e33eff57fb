pub mod auth;
pub mod records;
pub mod user;
pub mod vault;
pub mod webhook;

pub use auth::AuthService;
pub use records::FileRecordService;
pub use user::UserService;
pub use vault::{PlainUpload, VaultService};
pub use webhook::{WebhookAction, WebhookService};
