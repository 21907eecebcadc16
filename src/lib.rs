pub mod app;
pub mod bus;
pub mod command;
pub mod config;
pub mod display;
pub mod feedback;
pub mod ingest;
pub mod telemetry;
pub mod ui;
