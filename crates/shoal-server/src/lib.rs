mod protocol;
mod server;
mod session;

pub use protocol::{Envelope, FindEvent, Request, Response};
pub use server::{Server, ServerConfig, ServerHandle};
pub use session::Session;
