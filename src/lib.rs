pub mod adapter;
pub mod api;
pub mod auth;
pub mod capability;
pub mod cli;
pub mod config;
