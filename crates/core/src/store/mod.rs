pub mod error;
pub mod port;
