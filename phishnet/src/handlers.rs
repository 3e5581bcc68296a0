use crate::commands::DEFAULT_DATA_DIR;
use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use phishnet_core::config::{CACHE_FILE, parse_list};
use phishnet_core::lexical::{DEFAULT_BRAND_KEYWORDS, DEFAULT_SUSPICIOUS_TLDS, extract_domain};
use phishnet_core::pipeline::generate_build_report;
use phishnet_core::sources::load_url_list;
use phishnet_core::{
    Label, LabelSource, LexicalAnalyzer, Pipeline, PipelineConfig, PipelineError,
    RegistrationCache, RegistrationResolver, SourceFormat,
};
use phishnet_scanner::{HttpFetcher, ProgressCallback};
use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use url::Url;

/// Label-source flags of `build`, with the format and label each implies.
const SOURCE_ARGS: [(&str, SourceFormat, Label); 4] = [
    ("phishtank", SourceFormat::PhishTank, Label::Phishing),
    ("phishing-list", SourceFormat::List, Label::Phishing),
    ("tranco", SourceFormat::Tranco, Label::Benign),
    ("benign-list", SourceFormat::List, Label::Benign),
];

/// Exit code for a build stopped by Ctrl-C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

// Helper functions shared by the handlers

/// Expands a leading `~` in a path argument.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Load URLs from a newline-delimited file, exactly as written
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let urls = load_url_list(path)
        .map_err(|e| format!("Failed to read URL file {}: {}", path.display(), e))?;

    if urls.is_empty() {
        return Err(format!("No URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a domain. URLs are reduced to their hostname; bare
/// hostnames are accepted if they would form a valid URL.
pub fn parse_domain_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let domain = extract_domain(line);
    if !domain.is_empty() {
        return Some(domain);
    }

    let with_scheme = format!("http://{}", line);
    if let Ok(url) = Url::parse(&with_scheme)
        && let Some(host) = url.host_str()
        && !line.contains('/')
    {
        return Some(host.to_lowercase());
    }

    eprintln!("⚠️  Skipping invalid domain '{}'", line);
    None
}

/// Load and parse domains from a file, first occurrence kept
pub fn load_domains_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read domains file {}: {}", path.display(), e))?;

    let mut domains: Vec<String> = Vec::new();
    for domain in content.lines().filter_map(parse_domain_line) {
        if !domains.contains(&domain) {
            domains.push(domain);
        }
    }

    if domains.is_empty() {
        return Err(format!("No valid domains found in {}", path.display()));
    }

    Ok(domains)
}

/// Maps `build`/`resolve` flags onto a [`PipelineConfig`].
pub fn build_config(args: &ArgMatches, quiet: bool) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::default().with_data_dir(data_dir(args, "data-dir"));

    if let Some(&threads) = args.try_get_one::<usize>("threads").ok().flatten() {
        config.concurrency = threads;
    }
    if let Some(&seconds) = args.try_get_one::<u64>("timeout").ok().flatten() {
        config.fetch_timeout = Duration::from_secs(seconds);
        config.lookup_timeout = Duration::from_secs(seconds);
    }
    if let Some(&millis) = args.try_get_one::<u64>("lookup-delay").ok().flatten() {
        config.lookup_delay = Duration::from_millis(millis);
    }
    if let Some(base) = args.try_get_one::<Url>("rdap-base").ok().flatten() {
        config.rdap_base = base.as_str().trim_end_matches('/').to_string();
    }
    if let Some(keywords) = args.try_get_one::<String>("keywords").ok().flatten() {
        config.brand_keywords = parse_list(keywords);
    }
    if let Some(tlds) = args.try_get_one::<String>("tlds").ok().flatten() {
        config.suspicious_tlds = parse_list(tlds);
    }

    config.fetch_content = !flag(args, "skip-content");
    config.resolve_registration = !flag(args, "skip-registration");
    config.show_progress_bars = !quiet;

    config.validate()?;
    Ok(config)
}

/// Every label source named on the command line, in flag order.
pub fn collect_sources(args: &ArgMatches) -> Vec<LabelSource> {
    let mut sources = Vec::new();
    for (id, format, label) in SOURCE_ARGS {
        if let Some(paths) = args.try_get_many::<PathBuf>(id).ok().flatten() {
            for path in paths {
                sources.push(LabelSource::new(
                    expand_path(&path.to_string_lossy()),
                    format,
                    label,
                ));
            }
        }
    }
    sources
}

fn flag(args: &ArgMatches, id: &str) -> bool {
    args.try_get_one::<bool>(id)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}

fn data_dir(args: &ArgMatches, id: &str) -> PathBuf {
    let raw = args
        .try_get_one::<String>(id)
        .ok()
        .flatten()
        .map_or(DEFAULT_DATA_DIR, String::as_str);
    expand_path(raw)
}

/// Installs the fmt subscriber: stderr always, plus an append-only log file
/// without colour codes when `log_file` is given.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(level)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}

fn fail(message: impl Display) -> ! {
    eprintln!("{} {}", "✗".red().bold(), message);
    std::process::exit(1);
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> String {
    print!("{} ", msg.bright_cyan().bold());
    let _ = io::stdout().flush();
    let mut response = String::new();
    let _ = io::stdin().read_line(&mut response);
    response.trim().to_lowercase()
}

fn open_existing_cache(args: &ArgMatches) -> RegistrationCache {
    let cache_path = data_dir(args, "data-dir").join(CACHE_FILE);
    if !RegistrationCache::exists(&cache_path) {
        fail(format!(
            "No registration cache at {}. Run `phishnet init` first.",
            cache_path.display()
        ));
    }
    RegistrationCache::open(&cache_path)
        .unwrap_or_else(|e| fail(format!("Failed to open {}: {}", cache_path.display(), e)))
}

fn spinner(quiet: bool, message: &'static str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {pos}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message);
    spinner
}

pub fn handle_init(args: &ArgMatches) {
    print_divider();
    println!("{}", "  PHISHNET INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let raw_dir = args
        .get_one::<String>("PATH")
        .map_or(DEFAULT_DATA_DIR, String::as_str);
    let force = args.get_flag("force");
    let data_dir = expand_path(raw_dir);
    let cache_path = data_dir.join(CACHE_FILE);

    println!(
        "{} Target: {}",
        "→".blue(),
        data_dir.display().to_string().bright_white()
    );
    println!();

    if let Err(e) = fs::create_dir_all(&data_dir) {
        fail(format!("Failed to create {}: {}", data_dir.display(), e));
    }

    if RegistrationCache::exists(&cache_path) {
        let overwrite = if force {
            println!(
                "{} Deleting existing registration cache (force mode)",
                "→".yellow().bold()
            );
            true
        } else {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!("A registration cache already exists at:");
            println!(
                "  {} {}",
                "•".yellow(),
                cache_path.display().to_string().bright_white()
            );
            println!();
            let response = print_prompt("Delete it and start empty? [y/N]:");
            println!();
            response == "y" || response == "yes"
        };

        if overwrite {
            if let Err(e) = RegistrationCache::drop(&cache_path) {
                fail(format!("Failed to delete {}: {}", cache_path.display(), e));
            }
            println!("{} Existing cache removed", "✓".green().bold());
        } else {
            println!("{} Keeping existing cache", "→".blue());
        }
        println!();
    }

    let cache = RegistrationCache::open(&cache_path)
        .unwrap_or_else(|e| fail(format!("Failed to create {}: {}", cache_path.display(), e)));
    let domains = cache.stats().map(|stats| stats.domains).unwrap_or_default();

    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Data directory: {}",
        "✓".green().bold(),
        data_dir.display().to_string().bright_white()
    );
    println!(
        "{} Registration cache: {} ({} domains)",
        "✓".green().bold(),
        cache_path.display().to_string().bright_white(),
        domains.to_string().cyan()
    );
    println!();
}

pub fn handle_analyze(args: &ArgMatches) {
    let urls: Vec<String> = if let Some(path) = args.get_one::<PathBuf>("urls-file") {
        load_urls_from_file(path).unwrap_or_else(|e| fail(e))
    } else if let Some(urls) = args.get_many::<String>("url") {
        urls.cloned().collect()
    } else {
        fail("Either --url or --urls-file must be provided");
    };

    let keywords = args
        .get_one::<String>("keywords")
        .map(|raw| parse_list(raw))
        .unwrap_or_else(|| DEFAULT_BRAND_KEYWORDS.iter().map(|s| s.to_string()).collect());
    let tlds = args
        .get_one::<String>("tlds")
        .map(|raw| parse_list(raw))
        .unwrap_or_else(|| DEFAULT_SUSPICIOUS_TLDS.iter().map(|s| s.to_string()).collect());

    let analyzer = LexicalAnalyzer::new(keywords, tlds);
    for features in analyzer.analyze_bulk(&urls) {
        match serde_json::to_string(&features) {
            Ok(line) => println!("{}", line),
            Err(e) => fail(format!("Failed to encode features for {}: {}", features.url, e)),
        }
    }
}

pub async fn handle_build(args: &ArgMatches, quiet: bool, verbose: bool) {
    let config = build_config(args, quiet).unwrap_or_else(|e| fail(e));
    let sources = collect_sources(args);

    if let Err(e) = fs::create_dir_all(config.data_dir()) {
        fail(format!("Failed to create {}: {}", config.data_dir().display(), e));
    }
    if let Err(e) = init_logging(verbose, Some(&config.log_path())) {
        fail(format!("{:#}", e));
    }

    if !quiet {
        println!("\n🎣 Building dataset from {} source(s)", sources.len());
        for source in &sources {
            println!("  {} {} ({})", "•".blue(), source.name(), source.label);
        }
        println!("Workers: {}", config.concurrency);
        println!("Data directory: {}", config.data_dir().display());
        println!(
            "Stages: content {}, registration {}\n",
            if config.fetch_content { "on" } else { "off" },
            if config.resolve_registration { "on" } else { "off" }
        );
    }

    let cache = RegistrationCache::open(&config.cache_path())
        .unwrap_or_else(|e| fail(format!("Failed to open registration cache: {}", e)));
    let fetcher = HttpFetcher::new().unwrap_or_else(|e| fail(e));
    let pipeline = Pipeline::new(config, fetcher, Arc::new(cache));

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => warn!("Interrupt received, stopping after flushing completed work"),
            Err(_) => std::future::pending::<()>().await,
        }
    };

    match pipeline.build_until(&sources, shutdown).await {
        Ok(summary) => {
            println!("\n{} Build complete!\n", "✓".green().bold());
            print!("{}", generate_build_report(&summary));
        }
        Err(e @ PipelineError::Interrupted(..)) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        Err(e) => fail(format!("Build failed: {}", e)),
    }
}

pub async fn handle_resolve(args: &ArgMatches, quiet: bool, verbose: bool) {
    if let Err(e) = init_logging(verbose, None) {
        fail(format!("{:#}", e));
    }
    let config = build_config(args, quiet).unwrap_or_else(|e| fail(e));

    let domains: Vec<String> = if let Some(path) = args.get_one::<PathBuf>("domains-file") {
        load_domains_from_file(path).unwrap_or_else(|e| fail(e))
    } else if let Some(raw) = args.get_many::<String>("domain") {
        raw.filter_map(|line| parse_domain_line(line)).collect()
    } else {
        fail("Either --domain or --domains-file must be provided");
    };

    if domains.is_empty() {
        fail("No valid domains to resolve");
    }

    if let Err(e) = fs::create_dir_all(config.data_dir()) {
        fail(format!("Failed to create {}: {}", config.data_dir().display(), e));
    }
    let cache = RegistrationCache::open(&config.cache_path())
        .unwrap_or_else(|e| fail(format!("Failed to open registration cache: {}", e)));
    let fetcher = HttpFetcher::new().unwrap_or_else(|e| fail(e));

    let progress = spinner(quiet, "Resolving domains...");
    let progress_clone = progress.clone();
    let callback: ProgressCallback = Arc::new(move |_domain: String| progress_clone.inc(1));

    let resolver = RegistrationResolver::new(fetcher, Arc::new(cache))
        .with_rdap_base(config.rdap_base.clone())
        .with_timeout(config.lookup_timeout)
        .with_lookup_delay(config.lookup_delay)
        .with_concurrency(config.concurrency)
        .with_progress_callback(callback);

    let records = resolver
        .resolve_many(&domains)
        .await
        .unwrap_or_else(|e| fail(format!("Resolve failed: {}", e)));
    progress.finish_and_clear();

    for record in &records {
        match serde_json::to_string(record) {
            Ok(line) => println!("{}", line),
            Err(e) => fail(format!("Failed to encode record for {}: {}", record.domain, e)),
        }
    }

    if !quiet {
        eprintln!(
            "{} Resolved {} domains ({} new lookups)",
            "✓".green().bold(),
            records.len(),
            resolver.lookups_performed()
        );
    }
}

pub fn handle_cache_stats(args: &ArgMatches, verbose: bool) {
    if let Err(e) = init_logging(verbose, None) {
        fail(format!("{:#}", e));
    }
    let cache = open_existing_cache(args);
    let stats = cache
        .stats()
        .unwrap_or_else(|e| fail(format!("Failed to read cache: {}", e)));

    println!("{}", "REGISTRATION CACHE".bright_blue().bold());
    println!("  {} Rows: {}", "•".blue(), stats.rows.to_string().cyan());
    println!("  {} Domains: {}", "•".blue(), stats.domains.to_string().cyan());
    println!(
        "  {} Unknown age: {}",
        "•".blue(),
        stats.unknown_age.to_string().cyan()
    );
    let duplicates = stats.rows.saturating_sub(stats.domains);
    if duplicates > 0 {
        println!(
            "  {} {} duplicate rows; run `phishnet cache compact` to remove them",
            "ℹ".blue(),
            duplicates
        );
    }
}

pub fn handle_cache_compact(args: &ArgMatches, verbose: bool) {
    if let Err(e) = init_logging(verbose, None) {
        fail(format!("{:#}", e));
    }
    let cache = open_existing_cache(args);
    let removed = cache
        .compact()
        .unwrap_or_else(|e| fail(format!("Compaction failed: {}", e)));
    println!(
        "{} Removed {} duplicate rows",
        "✓".green().bold(),
        removed.to_string().cyan()
    );
}
