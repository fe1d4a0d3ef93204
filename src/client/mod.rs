pub mod session;
pub mod store;

pub use session::{ClientError, Session};
pub use store::TokenStore;
