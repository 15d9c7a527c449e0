use color_eyre::eyre;
use gumdrop::Options;
use tracing::Level;

use etb_assets::{assets, canonical, fetch, texture, validate};
use etb_assets::cli_arguments::{CliArguments, Command, FetchArguments, NormalizeArguments};
use etb_assets::config::CatalogPaths;
use etb_assets::fetch::{FetchOptions, FetchProgress, Lookup, TcgClient};
use etb_assets::texture::BatchOptions;


fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli_arguments = CliArguments::parse_args_default_or_exit();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(if cli_arguments.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let paths = CatalogPaths::from_resources(&cli_arguments.resources, &cli_arguments.namespace);

    let Some(command) = cli_arguments.command else {
        println!("{}", CliArguments::usage());
        println!();
        println!("Commands:");
        println!("{}", CliArguments::command_list().unwrap_or_default());
        return Ok(());
    };

    match command {
        Command::Normalize(arguments) => normalize(&arguments)?,
        Command::Reconcile(arguments) => {
            let mut total = 0;

            for set_name in paths.select_sets(&arguments.sets)? {
                let report = match canonical::reconcile_filenames(&paths.set_dir(&set_name), arguments.dry_run) {
                    Ok(report) => report,
                    Err(e) => {
                        tracing::error!("{}: {e:#}", set_name);
                        continue;
                    }
                };

                for conflict in report.lost_conflicts() {
                    tracing::warn!("{}: '{}' differed from the kept '{}'.", set_name, conflict.removed, conflict.kept);
                }

                tracing::info!(
                    "{}: {} {}, {} duplicate(s) {}, {} failure(s).",
                    set_name,
                    report.renamed.len(),
                    if arguments.dry_run { "to rename" } else { "renamed" },
                    report.conflicts.len(),
                    if arguments.dry_run { "to remove" } else { "removed" },
                    report.failures.len()
                );

                total += report.operations();
            }

            tracing::info!("{} operation(s) in total.", total);
        }
        Command::Metadata(arguments) => {
            for set_name in paths.select_sets(&arguments.sets)? {
                if let Err(e) = canonical::canonicalize_set_metadata(&paths, &set_name) {
                    tracing::error!("{}: {e:#}", set_name);
                }
            }
        }
        Command::Validate(arguments) => {
            let expected_size = arguments.size.map(|size| (size.0, size.1));
            let mut clean = 0;
            let mut checked = 0;

            for set_name in paths.select_sets(&arguments.sets)? {
                match validate::validate_set(&paths, &set_name, expected_size) {
                    Ok(Some(report)) => {
                        validate::log_report(&report);
                        checked += 1;
                        clean += report.is_clean() as usize;
                    }
                    Ok(None) => tracing::warn!("{}: no metadata, skipped.", set_name),
                    Err(e) => tracing::error!("{}: {e:#}", set_name),
                }
            }

            tracing::info!("{}/{} set(s) fully mapped.", clean, checked);
        }
        Command::Assets(arguments) => {
            assets::generate_booster_models(&paths)?;

            if !arguments.boosters_only {
                assets::generate_etb_assets(&paths)?;
            }
        }
        Command::Fetch(arguments) => download(&paths, &arguments)?,
    }

    Ok(())
}

fn normalize(arguments: &NormalizeArguments) -> eyre::Result<()> {
    let mut spec = arguments.preset.spec();

    if let Some(size) = arguments.size {
        spec = spec.with_size(size.0, size.1);
    }

    if let Some(margin) = arguments.margin {
        spec = spec.with_margin(margin);
    }

    let output = arguments.output.as_ref().unwrap_or(&arguments.input);
    let options = BatchOptions {
        workers: arguments.workers,
        show_progress: arguments.progress,
    };

    let report = texture::normalize_directory(&arguments.input, output, &spec, &options)?;

    for (source, error) in &report.failures {
        tracing::warn!("  '{}': {}", source, error);
    }

    for (dropped, kept) in &report.conflicts {
        tracing::warn!("  '{}' was left out in favor of '{}'", dropped, kept);
    }

    Ok(())
}

fn download(paths: &CatalogPaths, arguments: &FetchArguments) -> eyre::Result<()> {
    let client = TcgClient::from_env()?;
    let options = FetchOptions {
        workers: arguments.workers,
        show_progress: arguments.progress,
    };

    let mut progress = FetchProgress::load(&arguments.progress_file)?;

    if arguments.retry {
        fetch::retry_failed(&client, paths, &options, &mut progress)?;
        progress.save(&arguments.progress_file)?;
        return Ok(());
    }

    for request in &arguments.sets {
        let set_id = match fetch::resolve_set(&client, &request.set_id) {
            Lookup::Found { id, value } => {
                tracing::info!("Resolved '{}' to '{}' ({}).", request.set_id, id, value.name);
                id
            }
            Lookup::NotFound { tried } => {
                tracing::error!("Set '{}' not found, tried: {}.", request.set_id, tried.join(", "));
                continue;
            }
        };

        if let Err(e) = fetch::download_set(&client, paths, &request.folder, &set_id, &options, &mut progress) {
            tracing::error!("{}: {e:#}", request.folder);
        }

        progress.save(&arguments.progress_file)?;
    }

    if !progress.failed_downloads.is_empty() {
        tracing::warn!("{} download(s) failed, rerun with --retry to try them again.", progress.failed_downloads.len());
    }

    Ok(())
}
