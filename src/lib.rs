pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod leaderboard;
pub mod server;
pub mod source;
pub mod state;
pub mod stats;
