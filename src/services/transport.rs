//! Save/export collaborators. Results come back only through the `form`
//! channel.

use super::cli_runner::run_cmdline_with_stdin;
use super::jobs::JobQueue;
use crate::builder_core::bus::{events, Channel, ChannelBus, Payload};
use crate::error::FormError;
use crate::fields::FormShape;
use crate::model::BuilderConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub trait FormTransport {
    fn save(&self, shape: FormShape);
    fn export(&self, shape: FormShape, filename: &str);
}

/// File name stem for a form or export name: lowercase, dash separated.
pub fn slug(name: &str) -> String {
    let name = name.trim();
    let name = name.strip_suffix(".json").unwrap_or(name);
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let out = out.trim_end_matches('-').to_string();
    if out.is_empty() {
        "form".to_string()
    } else {
        out
    }
}

fn write_json(dir: &Path, stem: &str, shape: &FormShape) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("{stem}.json"));
    let text = shape.to_json_pretty()?;
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Writes forms as JSON files, or pipes them into `save_cmd` when one is set.
#[derive(Clone)]
pub struct FileTransport {
    bus: ChannelBus,
    jobs: JobQueue,
    save_cmd: Option<String>,
    save_dir: PathBuf,
    export_dir: PathBuf,
}

impl FileTransport {
    pub fn new(bus: ChannelBus, jobs: JobQueue, cfg: &BuilderConfig) -> Self {
        Self {
            bus,
            jobs,
            save_cmd: cfg.save_cmd.clone().filter(|c| !c.trim().is_empty()),
            save_dir: cfg.save_dir(),
            export_dir: cfg.export_dir(),
        }
    }
}

impl FormTransport for FileTransport {
    fn save(&self, shape: FormShape) {
        let save_cmd = self.save_cmd.clone();
        let dir = self.save_dir.clone();
        let bus = self.bus.clone();
        self.jobs.spawn(
            move || -> Result<String, String> {
                let res = match save_cmd {
                    Some(cmd) => serde_json::to_string(&shape)
                        .with_context(|| "serializing form")
                        .and_then(|json| run_cmdline_with_stdin(&cmd, &json))
                        .map(|out| if out.is_empty() { "Form saved".to_string() } else { out }),
                    None => write_json(&dir, &slug(&shape.name), &shape)
                        .map(|p| format!("Saved to {}", p.display())),
                };
                res.map_err(|e| format!("{e:#}"))
            },
            move |res| match res {
                Ok(msg) => {
                    log::info!("transport: {msg}");
                    bus.publish(Channel::Form, events::SAVE_SUCCESS, Payload::Text(msg));
                }
                Err(msg) => {
                    log::warn!("{}", FormError::Transport(msg.clone()));
                    bus.publish(Channel::Form, events::SAVE_FAIL, Payload::Text(msg));
                }
            },
        );
    }

    fn export(&self, shape: FormShape, filename: &str) {
        let dir = self.export_dir.clone();
        let stem = slug(filename);
        let bus = self.bus.clone();
        self.jobs.spawn(
            move || {
                write_json(&dir, &stem, &shape)
                    .map(|p| p.display().to_string())
                    .map_err(|e| format!("{e:#}"))
            },
            move |res: Result<String, String>| {
                if let Err(msg) = &res {
                    log::warn!("{}", FormError::Transport(msg.clone()));
                }
                bus.publish(Channel::Form, events::EXPORT_FINISHED, Payload::Outcome(res));
            },
        );
    }
}
