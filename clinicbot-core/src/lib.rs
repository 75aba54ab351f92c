// src/lib.rs

pub mod config;
pub mod crm;
pub mod db;
pub mod eventbus;
pub mod notifications;
pub mod repositories;
pub mod services;
pub mod tasks;
pub mod tickets;
pub mod triage;

pub use config::AppConfig;
pub use db::Database;
pub use clinicbot_common::error::Error;
