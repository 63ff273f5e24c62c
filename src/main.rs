// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;
mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};

use cli::{Cli, Commands};
use hand_scorer::ScoreRepository;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Tui {
        input: None,
        session: None,
        export: None,
    });

    match command {
        Commands::Tui { input, session, export } => {
            init_logging(&cli.log_level, Some(&cli.log_file))?;
            run_ui_mode(input, session, export)?;
        }
        Commands::Export { session, out } => {
            init_logging(&cli.log_level, None)?;
            run_export(&session, &out)?;
        }
        Commands::Summary { session } => {
            init_logging(&cli.log_level, None)?;
            run_summary(&session)?;
        }
    }

    Ok(())
}

/// stderr by default; a file while the terminal UI owns the screen
fn init_logging(level: &str, file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    if let Some(path) = file {
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    Ok(())
}

fn run_export(session: &Path, out: &Path) -> Result<()> {
    println!("📂 Loading session {}...", session.display());
    let repo = ScoreRepository::load_from_path(session)?;
    println!("✓ Loaded {} cases", repo.case_count());

    repo.export_csv(out)?;
    println!("✓ Exported {} rows to {}", repo.records().len(), out.display());
    Ok(())
}

fn run_summary(session: &Path) -> Result<()> {
    let repo = ScoreRepository::load_from_path(session)?;
    let progress = repo.progress();

    println!("Session {} (created {})", repo.session_id(), repo.created_at().format("%Y-%m-%d %H:%M"));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for case in &progress {
        println!(
            "{} {:<50} L {:>2}/{}  R {:>2}/{}",
            if case.reviewed { "✓" } else { " " },
            case.case_path,
            case.scored_left,
            case.total_per_side,
            case.scored_right,
            case.total_per_side,
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let reviewed = progress.iter().filter(|c| c.reviewed).count();
    println!("{} cases, {} reviewed", progress.len(), reviewed);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(
    input: Option<PathBuf>,
    session: Option<PathBuf>,
    export: Option<PathBuf>,
) -> Result<()> {
    use hand_scorer::{scan_folder, FileProbe, SessionController};

    let mut controller = SessionController::new(FileProbe);

    let save_path = match session {
        Some(path) if path.exists() => {
            println!("📂 Loading session {}...", path.display());
            controller.load_session(&path)?;
            path
        }
        Some(path) => path,
        None => cli::default_session_path(),
    };

    if let Some(folder) = input {
        let cases = scan_folder(&folder)?;
        if cases.is_empty() {
            anyhow::bail!("No .dcm or .bmp images in {}", folder.display());
        }
        println!("✓ Found {} images", cases.len());
        controller.load_case_list(cases)?;
    }

    let export_path = export.unwrap_or_else(|| cli::default_export_path(&save_path));
    info!("Session file {}, export {}", save_path.display(), export_path.display());

    println!("Starting UI... (Press 'q' to quit)\n");
    let mut app = ui::App::new(controller, save_path, export_path);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(
    _input: Option<PathBuf>,
    _session: Option<PathBuf>,
    _export: Option<PathBuf>,
) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: hand-scorer export --session FILE --out FILE.csv");
    std::process::exit(1);
}
