pub mod engine;
pub mod factory;
pub mod fingerprint;
pub mod graph;
pub mod processor;
pub mod rebuild;
pub mod runtime;
pub mod settings;
pub mod sink;
pub mod tick;
pub mod window;
