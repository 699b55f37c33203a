pub mod api;
pub mod config;
pub mod error;
pub mod fusion;
pub mod oracle;
pub mod pipeline;
pub mod publish;
pub mod sensor;
pub mod state;
pub mod timestamp;
pub mod transport;
