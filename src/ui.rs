use crate::model::{validate_config, BuilderConfig};
use crate::widgets::main_view::MainView;
use anyhow::{Context, Result};
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const CONFIG_FILE: &str = "form-builder.yaml";
pub const CONFIG_DIR_ENV: &str = "FORM_BUILDER_CONFIG_DIR";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug)]
pub struct Toast {
    pub text: String,
    pub level: ToastLevel,
    pub expires_at_tick: u64,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

pub fn run() -> Result<()> {
    let cfg = load_config()?;
    let mut main = MainView::new(&cfg);
    if let Some(path) = std::env::args().nth(1) {
        if let Err(e) = main.load_form(Path::new(&path)) {
            log::error!("{e:#}");
            main.run_effects(vec![crate::app::Effect::error(format!("{e:#}"))]);
        }
    }

    // Headless smoke mode
    if env_flag("FORM_BUILDER_HEADLESS") {
        let ticks: u64 = std::env::var("FORM_BUILDER_TICKS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10);
        let backend = ratatui::backend::TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend)?;
        let tick_rate = Duration::from_millis(50);
        for _ in 0..ticks {
            terminal.draw(|f| main.draw(f))?;
            main.tick();
            std::thread::sleep(tick_rate);
        }
        if env_flag("FORM_BUILDER_SMOKE_SUMMARY") {
            if !main.jobs().wait_idle(Duration::from_secs(2)) {
                log::warn!("headless run ended with jobs still in flight");
            }
            main.tick();
            let summary = serde_json::json!({
                "ok": main.errors_seen() == 0,
                "name": main.collection().name(),
                "fields": main.collection().len(),
                "views": main.panel().view_count(),
                "mode": format!("{:?}", main.panel().mode()),
                "render_finished": main.panel().renders_finished(),
            });
            println!("{summary}");
        }
        return Ok(());
    }

    // Setup terminal (interactive)
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();
    let res = loop {
        if let Err(e) = terminal.draw(|f| main.draw(f)) {
            break Err(e.into());
        }
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        match event::poll(timeout) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    main.handle_key(key.code, key.modifiers);
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }
        if main.quit_requested() {
            break Ok(());
        }
        if last_tick.elapsed() >= tick_rate {
            main.tick();
            last_tick = Instant::now();
        } else {
            main.jobs().pump();
        }
    };
    // Restore
    disable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    res
}

fn read_config(path: &Path) -> Result<BuilderConfig> {
    let s = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let mut cfg: BuilderConfig =
        serde_yaml::from_str(&s).with_context(|| format!("parsing {path:?}"))?;
    cfg.base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    validate_config(&cfg).map_err(|e| anyhow::anyhow!("invalid {path:?}: {e}"))?;
    log::info!("config loaded from {path:?}");
    Ok(cfg)
}

/// Config candidates in lookup order, starting from `cwd`.
fn config_candidates(cwd: &Path, home: Option<PathBuf>) -> Vec<PathBuf> {
    let mut out = vec![
        cwd.join(CONFIG_FILE),
        cwd.join(".form-builder").join(CONFIG_FILE),
    ];
    out.extend(
        cwd.ancestors()
            .skip(1)
            .map(|dir| dir.join(".form-builder").join(CONFIG_FILE)),
    );
    if let Some(home) = home {
        out.push(home.join(".form-builder").join(CONFIG_FILE));
    }
    out
}

pub fn load_config() -> Result<BuilderConfig> {
    // 1) An explicit directory must contain the file
    if let Ok(base) = std::env::var(CONFIG_DIR_ENV) {
        return read_config(&PathBuf::from(base).join(CONFIG_FILE));
    }

    // 2) Discover from CWD and upwards, then the home directory
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let home = std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())
        .map(PathBuf::from);
    if let Some(p) = config_candidates(&cwd, home).into_iter().find(|p| p.exists()) {
        return read_config(&p);
    }

    log::info!("no {CONFIG_FILE} found, using defaults");
    Ok(BuilderConfig {
        base_dir: cwd,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_walk_up_to_home() {
        let c = config_candidates(Path::new("/a/b"), Some(PathBuf::from("/home/u")));
        assert_eq!(
            c,
            vec![
                PathBuf::from("/a/b/form-builder.yaml"),
                PathBuf::from("/a/b/.form-builder/form-builder.yaml"),
                PathBuf::from("/a/.form-builder/form-builder.yaml"),
                PathBuf::from("/.form-builder/form-builder.yaml"),
                PathBuf::from("/home/u/.form-builder/form-builder.yaml"),
            ]
        );
    }

    #[test]
    fn read_config_sets_base_dir_and_validates() {
        let dir = std::env::temp_dir().join(format!("form-builder-cfg-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, "default_form_name: Intake\nexport_dir: out\n").unwrap();
        let cfg = read_config(&path).unwrap();
        assert_eq!(cfg.base_dir, dir);
        assert_eq!(cfg.export_dir(), dir.join("out"));

        fs::write(&path, "palette: [Text, Nope]\n").unwrap();
        let err = read_config(&path).unwrap_err();
        assert!(err.to_string().contains("Nope"));
        let _ = fs::remove_dir_all(&dir);
    }
}
