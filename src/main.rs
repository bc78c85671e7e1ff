use std::path::{Path, PathBuf};
use std::sync::Arc;

use shaikh::cli::{Cli, Commands, ConfigAction};
use shaikh::config::Config;
use shaikh::embedding::FastEmbedProvider;
use shaikh::error::{Result, ShaikhError};
use shaikh::retrieval::{
    FilterValidator, HybridSearcher, LabelEncoder, SearchError, SearchRequest, SearchResults,
};
use shaikh::retrieval::labels;
use shaikh::store::{Corpus, KeywordIndex, VectorStore};
use shaikh::text;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let config = load_config(cli.config.clone(), cli.profile.clone())?;
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Search {
            corpus,
            request,
            flat,
            json,
        } => {
            cmd_search(&config, &corpus, &request, flat, json).await?;
        }
        Commands::Validate { request } => {
            cmd_validate(&config, &request)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, &config, action)?;
        }
    }

    Ok(())
}

fn init_logging(config: &Config, verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let fallback = if verbose {
        "shaikh=debug"
    } else {
        config.logging.filter.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn cmd_search(
    config: &Config,
    corpus_path: &Path,
    request_path: &Path,
    flat: bool,
    json: bool,
) -> Result<()> {
    let request = read_request(request_path)?;
    let corpus = Corpus::load(corpus_path)?;

    let embedder = Arc::new(FastEmbedProvider::new(&config.embedding.model)?);
    let tokenizer = text::from_config(&config.tokenizer)?;
    let vectors = Arc::new(VectorStore::new(&config.indexing));
    let keywords = Arc::new(KeywordIndex::in_memory()?);

    let stats = {
        let embedder = Arc::clone(&embedder);
        let tokenizer = Arc::clone(&tokenizer);
        let vectors = Arc::clone(&vectors);
        let keywords = Arc::clone(&keywords);
        let batch_size = config.embedding.batch_size;
        tokio::task::spawn_blocking(move || {
            corpus.index_into(
                embedder.as_ref(),
                tokenizer.as_ref(),
                &vectors,
                &keywords,
                batch_size,
            )
        })
        .await
        .map_err(|e| anyhow::anyhow!("indexing task failed: {e}"))??
    };
    tracing::info!(passages = stats.passages, "Corpus ready");

    let searcher = HybridSearcher::new(embedder, vectors, keywords, tokenizer)
        .with_config(&config.retrieval)
        .map_err(|e| ShaikhError::InvalidConfigValue {
            path: "retrieval.rrf_k".to_string(),
            message: e.to_string(),
        })?;

    let results = searcher.search(&request).await?;

    if json {
        let output = if flat {
            serde_json::to_string_pretty(&results.into_ranked())
        } else {
            serde_json::to_string_pretty(&results)
        };
        let output = output.map_err(|e| ShaikhError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{output}");
    } else if flat {
        for (rank, result) in results.into_ranked().iter().enumerate() {
            println!("{:>3}. {}", rank + 1, describe(result));
        }
    } else {
        print_groups(&results);
    }

    Ok(())
}

fn print_groups(results: &SearchResults) {
    for group in results.groups() {
        println!(
            "Sub-query {} [{}]: {}",
            group.index + 1,
            group.mode,
            group.query
        );
        if group.results.is_empty() {
            println!("  (no results)");
        }
        for (rank, result) in group.results.iter().enumerate() {
            println!("  {:>3}. {}", rank + 1, describe(result));
        }
        println!();
    }
}

fn describe(result: &shaikh::retrieval::FusedResult) -> String {
    let reference = match (result.surah, result.ayah) {
        (Some(surah), Some(ayah)) => format!("{surah}:{ayah}"),
        (Some(surah), None) => format!("{surah}"),
        _ => "-".to_string(),
    };
    let snippet: String = result.content.chars().take(120).collect();
    format!(
        "[{}] {:.5} {} {} | {}",
        result.id, result.relevance, result.source, reference, snippet
    )
}

fn cmd_validate(config: &Config, request_path: &Path) -> Result<()> {
    let request = read_request(request_path)?;
    let validated = FilterValidator::new(config.retrieval.max_sub_queries)
        .validate(&request)
        .map_err(SearchError::from)?;

    match validated.shared_mode() {
        Some(mode) => println!("✓ Request is valid (mode: {mode})"),
        None => println!("✓ Request is valid (modes differ per sub-query)"),
    }

    let table = labels::table();
    for query in &validated.queries {
        let encoded: Vec<String> = LabelEncoder::encode(query)
            .into_iter()
            .map(|label| format!("{label} ({})", table.describe(label)))
            .collect();
        println!("  {}. [{}] {}", query.index + 1, query.mode(), query.text);
        if encoded.is_empty() {
            println!("     labels: none");
        } else {
            println!("     labels: {}", encoded.join(", "));
        }
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, config: &Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let content = toml::to_string_pretty(config)?;
            println!("{content}");
        }
        ConfigAction::Path => {
            println!("{}", resolve_config_path(config_path)?.display());
        }
        ConfigAction::Init { force } => {
            let path = resolve_config_path(config_path)?;

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn read_request(path: &Path) -> Result<SearchRequest> {
    let content = std::fs::read_to_string(path).map_err(|e| ShaikhError::Io {
        source: e,
        context: format!("Failed to read request file: {}", path.display()),
    })?;
    serde_json::from_str(&content).map_err(|e| ShaikhError::Json {
        source: e,
        context: format!("Failed to parse request file: {}", path.display()),
    })
}

fn resolve_config_path(config_path: Option<PathBuf>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path),
        None => Config::default_path(),
    }
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = resolve_config_path(config_path)?;

    if !path.exists() {
        if let Some(profile) = profile {
            return Err(ShaikhError::Config(format!(
                "Profile '{profile}' requested but no config file exists at {}",
                path.display()
            )));
        }
        return Ok(Config::default());
    }

    match profile {
        Some(profile) => Config::load_with_profile(&path, &profile),
        None => Config::load(&path),
    }
}
