pub mod archive;
pub mod config;
pub mod error;
pub mod grpc;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod transfer;

pub use crate::config::ServerConfig;
pub use server::Server;
