pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod fetcher;
pub mod history;
pub mod indicators;
pub mod input;
pub mod insights;
pub mod model;
pub mod order_flow;
pub mod performance;
pub mod provider;
pub mod refresh;
pub mod ui;
