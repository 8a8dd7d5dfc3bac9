//! End-to-end encrypted direct messaging.
//!
//! [`services::MessagingService`] is the entry point; it talks to the directories, the stores
//! and the audit sink only through the traits in [`directory`], [`store`] and [`audit`].

pub mod audit;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
