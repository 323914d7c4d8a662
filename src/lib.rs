pub mod config;
pub mod control;
pub mod crypto;
pub mod db;
pub mod error;
pub mod logging;
pub mod signals;
pub mod supervisor;
pub mod worker;

pub use error::BotfleetError;
