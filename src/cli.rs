use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_LOG_FILE: &str = "hand-scorer.log";

#[derive(Parser, Debug)]
#[command(name = "hand-scorer", version, about = "Landmark scoring for hand X-rays (JSN / BE)")]
pub struct Cli {
    #[arg(long, global = true, env = "HAND_SCORER_LOG", default_value = "warn", help = "Log level filter (overridden by RUST_LOG)")]
    pub log_level: String,
    #[arg(long, global = true, default_value = DEFAULT_LOG_FILE, help = "Log file used while the terminal UI is running")]
    pub log_file: PathBuf,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive scoring (default)
    Tui {
        #[arg(long, help = "Folder of .dcm/.bmp images to score")]
        input: Option<PathBuf>,
        #[arg(long, help = "Saved session to open (also the save target)")]
        session: Option<PathBuf>,
        #[arg(long, help = "CSV export target")]
        export: Option<PathBuf>,
    },
    /// Flatten a saved session to CSV
    Export {
        #[arg(long)]
        session: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print scoring progress for a saved session
    Summary {
        #[arg(long)]
        session: PathBuf,
    },
}

/// `RAScorer_<YYYYmmdd_HHMMSS>.json` in the working directory
pub fn default_session_path() -> PathBuf {
    PathBuf::from(format!("RAScorer_{}.json", Local::now().format("%Y%m%d_%H%M%S")))
}

/// Export target next to the session file
pub fn default_export_path(session: &std::path::Path) -> PathBuf {
    session.with_extension("csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_export_command() {
        let cli = Cli::try_parse_from([
            "hand-scorer",
            "export",
            "--session",
            "s.json",
            "--out",
            "s.csv",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Export { session, out }) => {
                assert_eq!(session, PathBuf::from("s.json"));
                assert_eq!(out, PathBuf::from("s.csv"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_no_subcommand_defaults_to_none() {
        let cli = Cli::try_parse_from(["hand-scorer"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_file, PathBuf::from(DEFAULT_LOG_FILE));
    }

    #[test]
    fn test_default_paths() {
        let session = default_session_path();
        let name = session.to_string_lossy().into_owned();
        assert!(name.starts_with("RAScorer_") && name.ends_with(".json"));
        assert_eq!(default_export_path(&session), session.with_extension("csv"));
    }
}
