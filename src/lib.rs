#![forbid(unsafe_code)]

pub mod api;
pub mod canned;
pub mod channel;
pub mod config;
pub mod credentials;
pub mod logging;
pub mod paginate;
pub mod resources;
pub mod schedule;
pub mod sheets;
pub mod sink;
pub mod trending;
