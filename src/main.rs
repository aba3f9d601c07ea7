use lexica::cli::{Cli, Commands, ConfigAction, CorpusAction};
use lexica::config::{Config, ConfigValidator};
use lexica::corpus::Message;
use lexica::error::{LexicaError, Result};
use lexica::indexer::{BuildStage, Indexer};
use lexica::retrieval::{SearchFilters, SearchHit, SearchQuery, Searcher};
use lexica::storage::{ArtifactRepository, CorpusSnapshot};
use std::path::PathBuf;

fn main() {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Corpus { action } => cmd_corpus(cli.config, action),
        Commands::Build {
            corpus,
            stage,
            json,
        } => cmd_build(cli.config, &corpus, stage, json),
        Commands::Search {
            corpus,
            query,
            limit,
            mode,
            role,
            has_code,
            after,
            before,
            conv,
            explain,
            json,
        } => {
            let filters = SearchFilters::parse(
                role.as_deref(),
                has_code,
                after.as_deref(),
                before.as_deref(),
                conv.as_deref(),
            )?;
            let query = SearchQuery::new(query, limit)
                .with_mode(mode)
                .with_filters(filters)
                .with_explain(explain);
            cmd_search(cli.config, &corpus, &query, json)
        }
        Commands::Conversation {
            corpus,
            conv_id,
            center,
            window,
            json,
        } => cmd_conversation(cli.config, &corpus, &conv_id, center, window, json),
        Commands::Config { action } => cmd_config(cli.config, action),
    }
}

/// Logs go to stderr so stdout stays machine readable
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "lexica=debug" } else { "lexica=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_corpus(config_path: Option<PathBuf>, action: CorpusAction) -> Result<()> {
    let config = load_config(config_path)?;
    let repo = ArtifactRepository::new(&config.data_dir()?)?;

    match action {
        CorpusAction::Import { rows, id } => {
            let (store, corpus) = repo.import(&rows, id.as_deref())?;
            println!("✓ Imported corpus {}", store.id());
            println!("  Messages: {}", corpus.len());
            if corpus.skipped > 0 {
                println!("  Skipped rows: {}", corpus.skipped);
            }
            println!("  Next: lexica build {}", store.id());
        }
        CorpusAction::List { json } => {
            let ids = repo.list()?;
            if json {
                print_json(&ids)?;
            } else if ids.is_empty() {
                println!("No corpora in {}", repo.root().display());
            } else {
                for id in ids {
                    println!("{}", id);
                }
            }
        }
        CorpusAction::Ls { corpus, json } => {
            let store = repo.open(&corpus)?;
            let artifacts = store.artifacts()?;
            if json {
                print_json(&artifacts)?;
            } else {
                println!("Corpus {}", store.id());
                for a in artifacts {
                    match (a.present, a.bytes) {
                        (true, Some(bytes)) => println!(
                            "  {:<10} {:<20} {:>10} bytes  {} records",
                            a.name,
                            a.file,
                            bytes,
                            a.records.unwrap_or(0)
                        ),
                        (true, None) => println!("  {:<10} {:<20} present", a.name, a.file),
                        (false, _) => println!("  {:<10} {:<20} not built", a.name, a.file),
                    }
                }
            }
        }
    }

    Ok(())
}

fn cmd_build(
    config_path: Option<PathBuf>,
    corpus: &str,
    stage: BuildStage,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let repo = ArtifactRepository::new(&config.data_dir()?)?;
    let store = repo.open(corpus)?;

    let report = Indexer::new(&config).build(&store, stage, chrono::Utc::now())?;

    if json {
        print_json(&report)?;
    } else {
        println!(
            "✓ Built {} for corpus {} ({} messages, {} ms)",
            report.stage, report.corpus_id, report.messages, report.elapsed_ms
        );
        for artifact in &report.published {
            println!("  {:<10} {} records", artifact.artifact, artifact.records);
        }
    }
    Ok(())
}

fn cmd_search(
    config_path: Option<PathBuf>,
    corpus: &str,
    query: &SearchQuery,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let repo = ArtifactRepository::new(&config.data_dir()?)?;
    let snapshot = CorpusSnapshot::load(&repo.open(corpus)?)?;

    let searcher = Searcher::new(snapshot, config.fusion.clone());
    let hits = searcher.search(query, chrono::Utc::now())?;

    if json {
        return print_json(&hits);
    }

    if hits.is_empty() {
        println!("No results for '{}'", query.text);
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        print_hit(rank + 1, hit);
    }
    Ok(())
}

fn print_hit(rank: usize, hit: &SearchHit) {
    println!(
        "{:>2}. [{}] {:.4}  {} / {}  {} {}",
        rank, hit.id, hit.score, hit.conv_id, hit.title, hit.role, hit.ts
    );
    println!("    {}", hit.snippet.replace('\n', " "));
    if let Some(signals) = &hit.explain {
        println!(
            "    bm25={:.4} cos={:.4} pr_global={:.6} ppr={:.6} fresh={:.4} prior={:.4}",
            signals.bm25, signals.cos, signals.pr_global, signals.ppr, signals.fresh, signals.prior
        );
    }
}

fn cmd_conversation(
    config_path: Option<PathBuf>,
    corpus: &str,
    conv_id: &str,
    center: Option<u32>,
    window: usize,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let repo = ArtifactRepository::new(&config.data_dir()?)?;
    let rows = repo.open(corpus)?.load_corpus()?;
    let messages: Vec<&Message> = rows.conversation_window(conv_id, center, window);

    if json {
        return print_json(&serde_json::json!({
            "conv_id": conv_id,
            "messages": messages,
        }));
    }

    if messages.is_empty() {
        println!("No messages in conversation {}", conv_id);
        return Ok(());
    }
    for m in messages {
        let marker = if Some(m.id) == center { ">" } else { " " };
        println!("{}[{}] {} {}: {}", marker, m.id, m.ts, m.role, m.text);
    }
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            ConfigValidator::validate(&config)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!("  Data directory: {}", config.data_dir()?.display());
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LexicaError::io(
                        e,
                        format!("Failed to create config directory: {}", parent.display()),
                    )
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };
    Config::load_or_default(&path)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| LexicaError::json(e, "Failed to serialize output"))?;
    println!("{}", json);
    Ok(())
}
