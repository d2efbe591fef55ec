pub mod config;
pub mod coursework;
pub mod error;
pub mod mastery;
pub mod remedial;
pub mod tasks;

pub use config::Config;
pub use coursework::*;
pub use error::DskgError;
pub use mastery::*;
pub use remedial::*;
pub use tasks::TaskRequest;
