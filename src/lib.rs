pub mod attachments;
pub mod cli;
pub mod config;
pub mod contacts;
pub mod delivery;
pub mod secrets;
pub mod smtp;

pub use cli::{Cli, CliHandler};
pub use config::CampaignConfig;
