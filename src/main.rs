// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use benefits_console::{import_rate_file, Settings};
use std::env;
use std::fs;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let settings = Settings::from_env()?;
    init_tracing();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import-rates") => {
            let Some(file) = args.get(2) else {
                bail!("usage: benefits-console import-rates <file>");
            };
            run_import(Path::new(file))?;
        }
        Some("--version") => println!("benefits-console {}", benefits_console::VERSION),
        Some(other) => bail!("unknown command '{}' (expected: import-rates <file>)", other),
        // UI mode (default)
        None => run_ui_mode(&settings)?,
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Decode a rate file and print what an upload of it would contain.
fn run_import(path: &Path) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.csv");

    let rows = import_rate_file(file_name, &bytes)?;

    println!("📂 {} ({} rows)", file_name, rows.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for row in &rows {
        println!("{:<30} {:>12.2}", row.option, row.rate);
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(settings: &Settings) -> Result<()> {
    use benefits_console::{lifecycle, Repository, SqliteStore};

    if !settings.db_path.exists() {
        bail!(
            "database not found at {} (start benefits-server once or set BENEFITS_DB_PATH)",
            settings.db_path.display()
        );
    }

    let store = SqliteStore::open(&settings.db_path)?;
    let rules = settings.load_rules()?;
    let repo = Repository::new(&store, &rules);

    let mut app = ui::App::load(&repo, lifecycle::today())?;
    println!("Starting UI... (Press 'q' to quit)\n");
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_settings: &Settings) -> Result<()> {
    bail!("TUI mode not available; rebuild with --features tui or run benefits-server")
}
