#![allow(dead_code)]

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use dataportal::{App, AppConfig, AppEvent, Dataset, OpenOptions, Theme};
use std::fs;
use std::path::{Path, PathBuf};

pub const SALES_CSV: &str = "city,sales\nA,10\nA,20\nB,30\nB,40\n";

/// Parse CSV text the way the app does.
pub fn load_csv(text: &str) -> Dataset {
    dataportal::loader::load(text.as_bytes(), "data.csv", &OpenOptions::default()).unwrap()
}

pub fn sales() -> Dataset {
    load_csv(SALES_CSV)
}

/// A store/region/amount table with `n` rows and repeating keys.
pub fn stores_csv(n: usize) -> String {
    let mut out = String::from("region,store,amount\n");
    for i in 0..n {
        let region = ["north", "south", "east"][i % 3];
        let store = format!("s{}", (i * 7) % 5);
        out.push_str(&format!("{},{},{}\n", region, store, (i * 13) % 17));
    }
    out
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

pub fn key(code: KeyCode) -> AppEvent {
    AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

/// Feed an event and every follow-up event the app returns, as the run loop does.
pub fn drive(app: &mut App, event: AppEvent) -> Option<AppEvent> {
    let mut next = app.event(&event);
    while let Some(event) = next.take() {
        match event {
            AppEvent::Exit | AppEvent::Crash(_) => return Some(event),
            event => next = app.event(&event),
        }
    }
    None
}

pub fn app_with(config: AppConfig) -> App {
    App::new(config, Theme::default())
}

pub fn open(app: &mut App, path: &Path) {
    drive(app, AppEvent::Open(path.to_path_buf(), OpenOptions::default()));
}
