pub mod catalog;
pub mod config;
pub mod error;
pub mod generate;
pub mod process;
pub mod report;
