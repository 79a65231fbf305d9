pub mod context;
pub mod message;
pub mod oracle;
pub mod validator;

pub use context::*;
pub use message::*;
pub use oracle::*;
pub use validator::*;
