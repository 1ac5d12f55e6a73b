use clap::Parser;
use color_eyre::Result;
use dataportal::{App, AppConfig, AppEvent, Args, CacheManager, ConfigManager, OpenOptions, Theme};
use ratatui::DefaultTerminal;
use std::fs::File;
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::time::Duration;

fn render(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(app, frame.area()))?;
    Ok(())
}

fn run(mut terminal: DefaultTerminal, args: &Args, config: AppConfig, path: PathBuf) -> Result<()> {
    let (tx, rx) = channel::<AppEvent>();
    let opts = OpenOptions::from_args_and_config(args, &config);
    let poll_interval = Duration::from_millis(config.performance.event_poll_interval_ms);
    let debug = args.debug || config.debug.enabled;
    let theme = Theme::from_config(&config.theme)?;

    let mut app = App::new(config, theme);
    if debug {
        app.enable_debug();
    }
    render(&mut terminal, &mut app)?;
    tx.send(AppEvent::Open(path, opts))?;

    loop {
        if crossterm::event::poll(poll_interval)? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key) => tx.send(AppEvent::Key(key))?,
                crossterm::event::Event::Resize(cols, rows) => {
                    tx.send(AppEvent::Resize(cols, rows))?
                }
                _ => {}
            }
        }

        let updated = match rx.recv_timeout(Duration::from_millis(0)) {
            Ok(event) => {
                match event {
                    AppEvent::Exit => break,
                    AppEvent::Crash(msg) => {
                        return Err(color_eyre::eyre::eyre!(msg));
                    }
                    event => {
                        if let Some(event) = app.event(&event) {
                            tx.send(event)?;
                        }
                    }
                }
                true
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => false,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if updated {
            render(&mut terminal, &mut app)?;
        }
    }
    Ok(())
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        match ConfigManager::new(dataportal::APP_NAME) {
            Ok(config_manager) => match config_manager.write_default_config(args.force) {
                Ok(path) => {
                    println!("Configuration file written to: {}", path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing configuration file: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.clear_cache {
        match CacheManager::new(dataportal::APP_NAME) {
            Ok(cache) => {
                match cache.clear_all() {
                    Ok(0) => println!("Cache already empty"),
                    Ok(_) => println!("Cache cleared successfully"),
                    Err(e) => {
                        eprintln!("Error clearing cache: {}", e);
                        std::process::exit(1);
                    }
                }
                return Ok(Some(()));
            }
            Err(_e) => {
                println!("No cache to clear");
                return Ok(Some(()));
            }
        }
    }

    Ok(None)
}

/// Command-line values that override config file settings.
fn apply_overrides(args: &Args, config: &mut AppConfig) {
    if let Some(top_k) = args.top_k {
        config.display.top_k = top_k;
    }
    if let Some(result_column) = &args.result_column {
        config.aggregation.result_column = result_column.clone();
    }
    if let Some(dir) = &args.chart_dir {
        config.charts.export_dir = Some(dir.display().to_string());
    }
    if args.debug {
        config.debug.enabled = true;
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::load(dataportal::APP_NAME)?;
    apply_overrides(args, &mut config);
    config.validate()?;
    Ok(config)
}

/// Send log output to a file; the terminal belongs to the UI.
fn init_logging(config: &AppConfig) -> Result<()> {
    let cache = CacheManager::new(dataportal::APP_NAME)?;
    let log_path = cache.log_path(config.debug.log_file.as_deref());
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&log_path)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()?;
    log::info!("dataportal {} logging to {}", env!("CARGO_PKG_VERSION"), log_path.display());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    let config = load_config(&args)?;
    if config.debug.enabled {
        init_logging(&config)?;
    }

    let Some(path) = args.path.clone() else {
        eprintln!("Error: a file path is required");
        std::process::exit(2);
    };

    let terminal = ratatui::init();
    let result = run(terminal, &args, config, path);
    ratatui::restore();
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
