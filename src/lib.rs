pub mod codec;
pub mod config;
pub mod error;
pub mod input;
pub mod mrc;
pub mod output;
pub mod pipeline;
pub mod telemetry;
