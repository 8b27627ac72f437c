use clap::{Args, Parser, Subcommand};

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "merge-photos",
    version,
    about = "Merge one Apple Photos library into another"
)]
pub struct Cli {
    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy photos, metadata and album placement from SOURCE into DESTINATION
    Merge(MergeArgs),

    /// Show what earlier merges recorded for SOURCE and DESTINATION
    Status(StatusArgs),

    /// Delete the merge database, or one source's records, so the next merge
    /// starts over
    ResetState(ResetStateArgs),
}

/// Library selection shared by `merge` and `status`.
#[derive(Args, Debug, Clone)]
pub struct LibraryArgs {
    /// Library to copy photos from
    pub source: String,

    /// Library to copy photos into (default: the last library opened in Photos)
    pub destination: Option<String>,

    #[command(flatten)]
    pub tools: ToolArgs,
}

/// Options that locate the merge database and external tools.
#[derive(Args, Debug, Clone)]
pub struct ToolArgs {
    /// Merge database file (default: .<destination>.merge_photos.json next to
    /// the destination library)
    #[arg(long)]
    pub merge_db: Option<String>,

    /// osxphotos executable
    #[arg(long, env = "MERGE_PHOTOS_OSXPHOTOS", default_value = "osxphotos")]
    pub osxphotos: String,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    #[command(flatten)]
    pub libraries: LibraryArgs,

    /// Narrate every step (hides the progress bar)
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Report what would be merged without changing either library
    #[arg(long)]
    pub dry_run: bool,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,

    /// Add a "People/<name>" keyword for every person in a photo
    #[arg(long)]
    pub person_keywords: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub libraries: LibraryArgs,

    /// List photos that failed, were skipped or are unfinished
    #[arg(long)]
    pub failed: bool,
}

#[derive(Args, Debug)]
pub struct ResetStateArgs {
    /// Destination library whose merge database is deleted (default: the
    /// last library opened in Photos)
    pub destination: Option<String>,

    /// Only forget merges from this source library; records of other
    /// sources merged into the same destination are kept
    #[arg(long)]
    pub source: Option<String>,

    /// Skip confirmation prompt
    #[arg(long)]
    pub yes: bool,

    #[command(flatten)]
    pub tools: ToolArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_merge_minimal() {
        let cli = parse(&["merge-photos", "merge", "~/Pictures/Old.photoslibrary"]);
        assert_eq!(cli.log_level, LogLevel::Info);
        let Command::Merge(args) = cli.command else {
            panic!("expected merge");
        };
        assert_eq!(args.libraries.source, "~/Pictures/Old.photoslibrary");
        assert!(args.libraries.destination.is_none());
        assert!(args.libraries.tools.merge_db.is_none());
        assert!(!args.verbose);
        assert!(!args.dry_run);
        assert!(!args.person_keywords);
    }

    #[test]
    fn test_merge_all_flags() {
        let cli = parse(&[
            "merge-photos",
            "--log-level",
            "debug",
            "merge",
            "Old.photoslibrary",
            "New.photoslibrary",
            "-V",
            "--dry-run",
            "--no-progress-bar",
            "--person-keywords",
            "--merge-db",
            "/tmp/merge.json",
            "--osxphotos",
            "/opt/bin/osxphotos",
        ]);
        assert_eq!(cli.log_level, LogLevel::Debug);
        let Command::Merge(args) = cli.command else {
            panic!("expected merge");
        };
        assert_eq!(args.libraries.destination.as_deref(), Some("New.photoslibrary"));
        assert!(args.verbose);
        assert!(args.dry_run);
        assert!(args.no_progress_bar);
        assert!(args.person_keywords);
        assert_eq!(args.libraries.tools.merge_db.as_deref(), Some("/tmp/merge.json"));
        assert_eq!(args.libraries.tools.osxphotos, "/opt/bin/osxphotos");
    }

    #[test]
    fn test_log_level_after_subcommand() {
        let cli = parse(&["merge-photos", "merge", "Old", "--log-level", "warn"]);
        assert_eq!(cli.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_long_verbose() {
        let cli = parse(&["merge-photos", "merge", "Old", "--verbose"]);
        let Command::Merge(args) = cli.command else {
            panic!("expected merge");
        };
        assert!(args.verbose);
    }

    #[test]
    fn test_status_failed() {
        let cli = parse(&["merge-photos", "status", "Old", "New", "--failed"]);
        let Command::Status(args) = cli.command else {
            panic!("expected status");
        };
        assert!(args.failed);
        assert_eq!(args.libraries.source, "Old");
    }

    #[test]
    fn test_reset_state() {
        let cli = parse(&["merge-photos", "reset-state", "--yes"]);
        let Command::ResetState(args) = cli.command else {
            panic!("expected reset-state");
        };
        assert!(args.yes);
        assert!(args.destination.is_none());
    }

    #[test]
    fn test_reset_state_for_one_source() {
        let cli = parse(&[
            "merge-photos",
            "reset-state",
            "New.photoslibrary",
            "--source",
            "Old.photoslibrary",
        ]);
        let Command::ResetState(args) = cli.command else {
            panic!("expected reset-state");
        };
        assert!(!args.yes);
        assert_eq!(args.destination.as_deref(), Some("New.photoslibrary"));
        assert_eq!(args.source.as_deref(), Some("Old.photoslibrary"));
    }

    #[test]
    fn test_merge_requires_source() {
        assert!(Cli::try_parse_from(["merge-photos", "merge"]).is_err());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["merge-photos"]).is_err());
    }
}
