pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod messaging;
pub mod models;
pub mod observability;
pub mod registry;
pub mod rooms;
pub mod sessions;
pub mod state;
