//! CLI entry point for the mangavault tool.

use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mangavault::select::default_rankings;
use mangavault::sync::{
    format_time_until, FutureChapter, FutureChapterGate, Phase, ProgressFn, StaticGate,
};
use mangavault::{
    AssetTransport, CatalogClient, Database, ResumeDescriptor, SeriesStore, SqliteStore,
    SyncController, SyncError, TranslatorPreferences,
};
use tracing::{debug, info, warn};
use url::Url;

mod cli;

use cli::{Args, Command};

/// Confirmation gate that prompts on the terminal.
struct PromptGate;

#[async_trait]
impl FutureChapterGate for PromptGate {
    async fn confirm(&self, pending: &[FutureChapter]) -> bool {
        let now = Utc::now();
        println!("{} chapter(s) are not released yet:", pending.len());
        for chapter in pending {
            println!(
                "  chapter {} available in {}",
                chapter.number,
                format_time_until(now, chapter.available_at)
            );
        }
        print!("Continue with the chapters already available? [y/N] ");
        let answered = tokio::task::spawn_blocking(|| {
            if std::io::stdout().flush().is_err() {
                return false;
            }
            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).is_err() {
                return false;
            }
            matches!(line.trim(), "y" | "Y" | "yes")
        })
        .await;
        answered.unwrap_or(false)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let api_base = Url::parse(&args.api_base).context("invalid --api-base URL")?;
    let asset_base = Url::parse(&args.asset_base).context("invalid --asset-base URL")?;

    let db = Database::new(Path::new(&args.database)).await?;
    let store = Arc::new(SqliteStore::new(db));
    let catalog = CatalogClient::new(api_base);
    let transport = Arc::new(AssetTransport::new(asset_base));

    match args.command {
        Command::Download {
            slug,
            translator,
            backups,
            allow_backup_override,
            from,
            yes,
        } => {
            let controller = build_controller(catalog, transport, store, yes, &args.lang);
            let controller = Arc::new(controller);
            install_cancel_handler(&controller);

            let preferences = match translator {
                Some(primary) => TranslatorPreferences {
                    primary,
                    backups,
                    allow_backup_override,
                },
                None => {
                    info!(slug, "no translator given; ranking by chapter volume");
                    let (_, translators) = controller.fetch_translator_info(&slug).await?;
                    let mut ranked = default_rankings(&translators).into_iter();
                    let Some(primary) = ranked.next() else {
                        bail!("no translators found for {slug}");
                    };
                    TranslatorPreferences {
                        primary,
                        backups: ranked.collect(),
                        allow_backup_override,
                    }
                }
            };

            println!("Downloading {slug} (primary translator: {})", preferences.primary);
            match controller.download_series(&slug, preferences, from).await {
                Ok(report) => {
                    println!(
                        "Done: {} chapters written, {} on disk",
                        report.chapters_written,
                        report.downloaded_chapters.len()
                    );
                }
                Err(error) => return handle_sync_error(error),
            }
        }

        Command::Update {
            series_id,
            from,
            skip_conflict_warning,
            yes,
        } => {
            let controller = build_controller(catalog, transport, store, yes, &args.lang);
            let controller = Arc::new(controller);
            install_cancel_handler(&controller);

            match controller
                .update_series(&series_id, from, skip_conflict_warning)
                .await
            {
                Ok(outcome) => {
                    if !outcome.conflicts.is_empty() {
                        println!("New chapters from unpreferred translators:");
                        for conflict in &outcome.conflicts {
                            println!(
                                "  chapter {}: only available from {}",
                                conflict.number, conflict.translator
                            );
                        }
                    }
                    if !outcome.conflicts.is_empty() && !skip_conflict_warning {
                        println!(
                            "Update blocked; re-run with --skip-conflict-warning to \
                             download them anyway."
                        );
                    } else {
                        println!("Update complete: {} new chapters", outcome.new_chapters);
                    }
                }
                Err(error) => return handle_sync_error(error),
            }
        }

        Command::Resume { file, yes } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading resume descriptor {file}"))?;
            let descriptor: ResumeDescriptor =
                serde_json::from_str(&raw).context("parsing resume descriptor")?;

            let controller = build_controller(catalog, transport, store, yes, &args.lang);
            let controller = Arc::new(controller);
            install_cancel_handler(&controller);

            println!(
                "Resuming {}: {} chapters remaining",
                descriptor.series_id,
                descriptor.remaining_chapters.len()
            );
            match controller.resume_download(descriptor).await {
                Ok(report) => {
                    println!(
                        "Done: {} chapters written, {} on disk",
                        report.chapters_written,
                        report.downloaded_chapters.len()
                    );
                    if let Err(error) = std::fs::remove_file(&file) {
                        warn!(%error, file, "could not remove used resume descriptor");
                    }
                }
                Err(error) => return handle_sync_error(error),
            }
        }

        Command::Translators { slug } => {
            let controller =
                build_controller(catalog, transport, store, true, &args.lang);
            let (info, translators) = controller.fetch_translator_info(&slug).await?;
            println!(
                "{} ({} chapters)",
                info.comic.title, info.comic.chapter_count
            );
            if translators.is_empty() {
                println!("No translators found.");
            }
            for t in translators {
                println!(
                    "  {:<30} {} chapters, latest {}",
                    t.name,
                    t.chapters.len(),
                    t.latest_chapter
                );
            }
        }

        Command::List => {
            let series = store.list_series().await?;
            if series.is_empty() {
                println!("Library is empty.");
            }
            for s in series {
                println!(
                    "{:<12} {:<40} {}/{} chapters",
                    s.id,
                    s.title,
                    s.downloaded_chapters.len(),
                    s.total_chapters
                );
            }
        }

        Command::Delete { series_id } => {
            let Some(series) = store.get_series(&series_id).await? else {
                bail!("series {series_id} is not in the library");
            };
            store.delete_series(&series_id).await?;
            println!("Deleted {} ({})", series.title, series_id);
        }
    }

    Ok(())
}

fn build_controller(
    catalog: CatalogClient,
    transport: Arc<AssetTransport>,
    store: Arc<SqliteStore>,
    assume_yes: bool,
    lang: &str,
) -> SyncController<SqliteStore> {
    let gate: Arc<dyn FutureChapterGate> = if assume_yes {
        Arc::new(StaticGate(true))
    } else {
        Arc::new(PromptGate)
    };
    SyncController::new(catalog, transport, store, gate)
        .with_language(lang)
        .with_progress(progress_bar())
}

fn progress_bar() -> ProgressFn {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}") {
        bar.set_style(style);
    }
    Arc::new(move |event| {
        match event.phase {
            Phase::Setup => bar.set_message(event.message),
            Phase::Chapters => {
                bar.set_length(event.total as u64);
                bar.set_position(event.current as u64);
                bar.set_message(event.message);
            }
            Phase::Images => bar.set_message(event.message),
        }
    })
}

fn install_cancel_handler(controller: &Arc<SyncController<SqliteStore>>) {
    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancellation requested; finishing current writes");
            controller.cancel();
        }
    });
}

fn handle_sync_error(error: SyncError) -> Result<()> {
    match &error {
        SyncError::Declined => {
            println!("Download declined.");
            Ok(())
        }
        SyncError::Interrupted {
            kind,
            completed,
            remaining,
            resume,
        } => {
            let path = format!("resume-{}.json", resume.series_id);
            let payload = serde_json::to_string_pretty(resume)?;
            std::fs::write(&path, payload)
                .with_context(|| format!("writing resume descriptor {path}"))?;
            println!(
                "Interrupted ({kind:?}): {completed} chapters completed, {remaining} remaining."
            );
            println!("Resume with: mangavault resume {path}");
            bail!("download interrupted")
        }
        _ => Err(error.into()),
    }
}
