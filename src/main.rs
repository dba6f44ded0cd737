mod app;
mod builder_core;
mod error;
mod fields;
mod model;
mod nav;
mod services;
mod theme;
mod ui;
mod views;
mod widgets;

use anyhow::Result;

fn init_logging() {
    // The TUI owns stdout/stderr, so logs only go somewhere when a file is named.
    let Ok(path) = std::env::var("FORM_BUILDER_LOG") else {
        return;
    };
    match std::fs::File::create(&path) {
        Ok(file) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .target(env_logger::Target::Pipe(Box::new(file)))
                .init();
        }
        Err(e) => eprintln!("cannot open log file {path}: {e}"),
    }
}

fn main() -> Result<()> {
    init_logging();
    ui::run()
}
