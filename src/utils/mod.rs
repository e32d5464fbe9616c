//! Utility modules

pub mod cron_helper;
pub mod http_client;

pub use cron_helper::{calculate_next_scheduled_time, is_valid as is_valid_cron, parse_schedule};
pub use http_client::create_http_client;
