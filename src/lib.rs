pub mod author;
pub mod cache;
pub mod cli;
pub mod config;
pub mod display;
pub mod doctor;
pub mod editor;
pub mod engine;
pub mod error;
pub mod interrupt;
pub mod language;
pub mod logger;
pub mod models;
pub mod prompt;
pub mod service;
pub mod session;
pub mod stats;
pub mod vcs;
