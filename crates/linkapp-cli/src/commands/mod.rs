//! Command handlers, one module per subcommand group

pub mod config;
pub mod database;
pub mod link;
pub mod reading_list;
pub mod tag;
pub mod user;
