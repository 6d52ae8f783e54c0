use crate::cli::RunArgs;
use crate::config::{default_config_path, Config};
use crate::deck::{Deck, DeckInput};
use crate::discovery::{load_article_context, resolve_articles};
use crate::output::{render_summary_text, FsArtifactStore, PdfCombiner, RunStatus};
use crate::provider::OpenRouterClient;
use crate::runner::{Scheduler, SchedulerConfig};
use anyhow::{anyhow, Context};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;

    // Inputs are read and checked before anything is written
    let outline_text = std::fs::read_to_string(&args.outline)
        .with_context(|| format!("Failed to read outline {}", args.outline.display()))?;
    let style_image = match &args.style {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read style image {}", path.display()))?;
            Some(Arc::<[u8]>::from(bytes))
        }
        None => None,
    };
    let article_paths = resolve_articles(&args.articles)?;
    let article_context = load_article_context(&article_paths)?.map(Arc::<str>::from);

    let deck = Deck::prepare(DeckInput {
        outline_text,
        pages: args.pages.clone(),
        preview: args.preview,
        copies: config.copies,
        style_image,
        article_context,
    })?;

    let output_dir = args
        .output
        .clone()
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(timestamped_output_dir);

    if args.dry_run {
        info!("DRY RUN - no generation requests will be sent");
        print_execution_plan(&deck, &config, &output_dir, &article_paths);
        return Ok(());
    }

    let api_key = config.api_key()?;
    let client =
        OpenRouterClient::new(&config.service, api_key).context("Failed to build HTTP client")?;
    let scheduler = Scheduler::new(SchedulerConfig::from_config(&config), Arc::new(client));

    info!(
        "Generating {} image(s) with {} into {}",
        deck.plan().len(),
        config.service.model,
        output_dir.display()
    );
    let run = deck
        .generate(
            &scheduler,
            FsArtifactStore::new(&output_dir),
            &PdfCombiner::default(),
            interrupted(),
        )
        .await?;

    print!("{}", render_summary_text(&run.summary));

    match run.summary.status {
        RunStatus::FullSuccess => Ok(()),
        RunStatus::PartialSuccess => {
            error!(
                "{} of {} job(s) failed; rerun with --pages to retry them",
                run.summary.failed.len(),
                run.summary.total_jobs
            );
            std::process::exit(RunStatus::PartialSuccess.exit_code());
        }
        RunStatus::TotalFailure => match run.assembly {
            Err(e) => Err(e.into()),
            Ok(_) => Err(anyhow!("no slide images were generated")),
        },
    }
}

fn load_config(args: &RunArgs) -> anyhow::Result<Config> {
    // An explicit --config must exist; the default file is optional
    let (path, required) = match &args.config {
        Some(path) => (path.clone(), true),
        None => (default_config_path(), false),
    };
    info!("Loading config from {:?}", path);
    let mut config = Config::load_or_default(&path, required)?;

    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

/// CLI flags and their environment variables win over the config file
fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(copies) = args.copies {
        config.copies = copies;
    }
    if let Some(model) = &args.model {
        config.service.model = model.clone();
    }
    if let Some(api_key) = &args.api_key {
        config.service.api_key = Some(api_key.clone());
    }
    if let Some(proxy) = &args.proxy {
        config.service.proxy = Some(proxy.clone());
    }
}

fn timestamped_output_dir() -> PathBuf {
    PathBuf::from(format!("output_{}", Local::now().format("%Y%m%d_%H%M%S")))
}

/// Resolves on Ctrl-C; never resolves if the signal cannot be watched
async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => warn!("Interrupt received; stopping in-flight jobs"),
        Err(e) => {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await
        }
    }
}

fn print_execution_plan(deck: &Deck, config: &Config, output_dir: &Path, articles: &[PathBuf]) {
    println!("\n=== Execution Plan ===\n");
    print!("{}", deck.describe());
    println!();
    println!("Model: {}", config.service.model);
    println!("Endpoint: {}", config.service.base_url);
    println!("Concurrency: {}", config.concurrency);
    println!(
        "Retry: {} attempt(s), backoff {}ms..{}ms",
        config.retry.max_attempts, config.retry.backoff_base_ms, config.retry.backoff_max_ms
    );
    if let Some(proxy) = &config.service.proxy {
        println!("Proxy: {}", proxy);
    }
    println!("Output dir: {}", output_dir.display());

    if !articles.is_empty() {
        println!("\nArticles:");
        for path in articles {
            println!("  - {}", path.display());
        }
    }
}
