pub mod error;
mod requests;
pub mod server;
