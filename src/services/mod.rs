pub mod cli_runner;
pub mod jobs;
pub mod transport;
pub mod view_loader;
