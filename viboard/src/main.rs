use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use viboard_lib::app::{App, AppParts, CompletionCell};
use viboard_lib::state::{ConfigManager, InstanceGuard, Settings};
use viboard_lib::utils::logging::init_logging;

/// Pause between polling cycles
const CYCLE_INTERVAL: Duration = Duration::from_millis(5);

/// Headless soundboard with global hotkeys
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding settings.json and the instance marker
    #[arg(short, long)]
    storage: Option<PathBuf>,

    /// Extra soundboard folder to load (repeatable)
    #[arg(short, long = "board")]
    boards: Vec<PathBuf>,

    /// Run as if the window were hidden, letting idle cycles block
    #[arg(long)]
    background: bool,

    /// Stop after this many polling cycles
    #[arg(long)]
    cycles: Option<u64>,
}

/// Commands read from stdin on a helper thread
struct Commands {
    quit: Arc<CompletionCell<()>>,
}

/// Listen on stdin for `add <folder>` and `quit`
///
/// End of input leaves the app running.
fn spawn_command_reader(folders: Arc<CompletionCell<PathBuf>>) -> Commands {
    let quit = Arc::new(CompletionCell::new());
    let signal = Arc::clone(&quit);

    thread::spawn(move || {
        for line in io::stdin().lock().lines().map_while(Result::ok) {
            let line = line.trim();
            if line == "quit" {
                signal.complete(());
                return;
            }
            if let Some(folder) = line.strip_prefix("add ") {
                if !folders.complete(PathBuf::from(folder.trim())) {
                    warn!("A folder is already waiting to be added");
                }
            }
        }
    });

    Commands { quit }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();

    let storage = match args.storage {
        Some(dir) => dir,
        None => ConfigManager::storage_dir().context("locating the storage directory")?,
    };

    let Some(_instance) = InstanceGuard::acquire(&storage)
        .with_context(|| format!("creating the instance marker in {}", storage.display()))?
    else {
        info!("ViBoard is already running");
        return Ok(());
    };

    let config = ConfigManager::new(storage);
    let settings = config.load().unwrap_or_else(|e| {
        error!("Failed to load settings, using defaults: {}", e);
        Settings::default()
    });

    let mut app = App::new(AppParts::platform_default());
    app.apply_settings(&settings);
    for board in args.boards {
        app.add_soundboard(board);
    }
    app.set_inactive(args.background || settings.start_minimized);

    let commands = spawn_command_reader(app.folder_request());
    info!("ViBoard running");

    let mut cycles = 0u64;
    while app.is_running() {
        app.run_cycle();
        for notice in app.take_notices() {
            warn!(code = ?notice.code(), "{}", notice.user_message());
        }

        cycles += 1;
        if commands.quit.take().is_some() || args.cycles.is_some_and(|max| cycles >= max) {
            app.request_quit();
        }
        thread::sleep(CYCLE_INTERVAL);
    }

    if let Err(e) = config.save(&app.capture_settings()) {
        error!("Failed to save settings: {}", e);
    }
    info!("ViBoard stopped");
    Ok(())
}
