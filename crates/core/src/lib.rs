pub mod session;
pub mod thumbnail;

pub use session::Session;
pub use thumbnail::{ThumbnailPlan, ThumbnailRef};
