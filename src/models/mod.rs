pub mod board;
pub mod error;
pub mod flow;
pub mod report;
pub mod score;
pub mod sector;
pub mod settings;
pub mod stock;
