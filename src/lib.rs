pub mod api;
pub mod commands;
pub mod config;
pub mod db;
pub mod doc_processor;
pub mod store;
