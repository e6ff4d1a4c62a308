//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand};

/// Keep offline copies of manga series in sync.
///
/// Mangavault downloads series chapter by chapter, resolves competing
/// translator releases by your preferences, and stores everything in a
/// local SQLite library that survives interruptions.
#[derive(Parser, Debug)]
#[command(name = "mangavault")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the library database
    #[arg(long, default_value = "mangavault.db", global = true)]
    pub database: String,

    /// Catalog API base URL
    #[arg(long, default_value = "https://api.comick.fun/", global = true)]
    pub api_base: String,

    /// Image asset host base URL
    #[arg(long, default_value = "https://meo.comick.pictures/", global = true)]
    pub asset_base: String,

    /// Chapter listing language
    #[arg(long, default_value = "en", global = true)]
    pub lang: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a series from scratch
    Download {
        /// Series slug on the catalog
        slug: String,

        /// Preferred translator; defaults to the most prolific one
        #[arg(short, long)]
        translator: Option<String>,

        /// Backup translators, in preference order
        #[arg(short, long)]
        backups: Vec<String>,

        /// Allow a backup release when the primary has no release
        #[arg(long)]
        allow_backup_override: bool,

        /// Skip chapters below this number
        #[arg(long)]
        from: Option<f64>,

        /// Answer yes to all confirmation prompts
        #[arg(short, long)]
        yes: bool,
    },

    /// Fetch new chapters for a stored series
    Update {
        /// Series id in the local library
        series_id: String,

        /// Skip chapters below this number (overrides the stored floor)
        #[arg(long)]
        from: Option<f64>,

        /// Download new chapters even when only unpreferred translators
        /// cover them
        #[arg(long)]
        skip_conflict_warning: bool,

        /// Answer yes to all confirmation prompts
        #[arg(short, long)]
        yes: bool,
    },

    /// Resume an interrupted download from its descriptor file
    Resume {
        /// Path to a resume descriptor written by a previous run
        file: String,

        /// Answer yes to all confirmation prompts
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the translators releasing a series
    Translators {
        /// Series slug on the catalog
        slug: String,
    },

    /// List the series in the local library
    List,

    /// Delete a series and all its chapters and images
    Delete {
        /// Series id in the local library
        series_id: String,
    },
}
