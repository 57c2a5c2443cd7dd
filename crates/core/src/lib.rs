pub mod common;
pub mod config;
pub mod engine;
pub mod factor;
pub mod market;
pub mod observe;
pub mod store;

#[cfg(feature = "test-utils")]
pub mod testing;
