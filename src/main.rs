use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use archfind::config::Config;
use archfind::embed::cache::{self as embed_cache, EmbeddingCache};
use archfind::embed::hasher::hash_text;
use archfind::embed::openai::OpenAiEmbedder;
use archfind::openai::OpenAiClient;
use archfind::qa::openai::OpenAiChat;
use archfind::qa::session::{Asked, ChatSession};
use archfind::qa::QuestionService;
use archfind::search::semantic::{self, SemanticQuery};
use archfind::search::text::ListFilter;
use archfind::store::http::HttpRecordStore;
use archfind::store::record::Services;
use archfind::store::{CloudProvider, Record, RecordDraft, RecordStore, ScoredRecord};
use archfind::{logging, register};

#[derive(Parser)]
#[command(name = "archfind", version, about = "Find, register and discuss system architectures")]
struct Cli {
    /// Config file (default: ./archfind.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered systems, optionally filtered
    List {
        /// Only these cloud providers (AWS, Azure, GCP)
        #[arg(long, value_parser = parse_provider)]
        provider: Vec<CloudProvider>,
        /// Only these owning teams
        #[arg(long)]
        team: Vec<String>,
        /// Case-insensitive match on name or description
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Register a new system
    Register {
        /// JSON draft with system_name, description, cloud_provider, cloud_services, team, repository
        #[arg(long, conflicts_with_all = ["name", "description", "provider", "services", "team", "repo"])]
        file: Option<PathBuf>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        provider: Option<String>,
        /// Comma-separated cloud services
        #[arg(long)]
        services: Option<String>,
        #[arg(long)]
        team: Option<String>,
        /// Application repository URL
        #[arg(long)]
        repo: Option<String>,
    },
    /// Rank registered systems by similarity to a description
    Search {
        /// Free-text description of the system you have in mind
        query: String,
        /// Show only the best N matches
        #[arg(long)]
        top_k: Option<usize>,
        /// Always call the embedding provider; don't read or write the cache
        #[arg(long)]
        no_cache: bool,
        #[arg(long)]
        json: bool,
    },
    /// Ask one question about a registered system
    Ask {
        /// System id
        id: String,
        question: String,
    },
    /// Interactive Q&A about a registered system (one question per line)
    Chat {
        /// System id
        id: String,
    },
    /// Embed a piece of text and report its content hash
    Embed {
        text: String,
        #[arg(long)]
        no_cache: bool,
    },
    /// Inspect or empty the embedding cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry count and size
    Status,
    /// Remove every cached embedding
    Clear,
}

fn parse_provider(s: &str) -> Result<CloudProvider, String> {
    s.parse().map_err(|e: archfind::error::ValidationError| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let _logger = match logging::init_logging(&config.logging) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("warning: file logging disabled: {e:#}");
            None
        }
    };

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::List {
            provider,
            team,
            keyword,
            json,
        } => {
            let records = record_store(config)?.all_records()?;
            let filter = ListFilter {
                providers: provider,
                teams: team,
                keyword,
            };
            let matched = filter.apply(&records);
            if json {
                println!("{}", serde_json::to_string_pretty(&matched)?);
            } else if matched.is_empty() {
                println!("No matching systems.");
            } else {
                println!("{} system(s)", matched.len());
                for record in matched {
                    print_record(record);
                }
            }
        }
        Commands::Register {
            file,
            name,
            description,
            provider,
            services,
            team,
            repo,
        } => {
            let draft = match file {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    serde_json::from_str(&text)
                        .with_context(|| format!("parsing draft {}", path.display()))?
                }
                None => RecordDraft {
                    system_name: name,
                    description,
                    cloud_provider: provider,
                    cloud_services: Services::Csv(services.unwrap_or_default()),
                    team,
                    repository: repo,
                },
            };
            let cache = embedding_cache(config)?;
            let stored = register::register(record_store(config)?.as_ref(), &cache, &draft)?;
            println!("Registered {} (id {})", stored.system_name, stored.id);
        }
        Commands::Search {
            query,
            top_k,
            no_cache,
            json,
        } => {
            let cache = embedding_cache(config)?;
            let store = record_store(config)?;
            let query = SemanticQuery {
                text: query,
                top_k,
                use_cache: !no_cache,
            };
            let ranked = semantic::find_similar(store.as_ref(), &cache, config.effective_workers(), &query)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ranked)?);
            } else if ranked.is_empty() {
                println!("No systems registered.");
            } else {
                for (i, scored) in ranked.iter().enumerate() {
                    print_scored(i + 1, scored);
                }
            }
        }
        Commands::Ask { id, question } => {
            let client = openai_client(config)?;
            let chat = OpenAiChat::new(client, &config.chat.model);
            let service = QuestionService::new(&chat);
            let mut session = ChatSession::new();
            session.select(find_record(record_store(config)?.as_ref(), &id)?);
            print_asked(&session.ask(&service, &question)?);
        }
        Commands::Chat { id } => {
            let client = openai_client(config)?;
            let chat = OpenAiChat::new(client, &config.chat.model);
            let service = QuestionService::new(&chat);
            let mut session = ChatSession::new();
            let record = find_record(record_store(config)?.as_ref(), &id)?;
            println!("Asking about {}. /clear resets the conversation, /quit exits.", record.system_name);
            session.select(record);
            chat_loop(&mut session, &service)?;
        }
        Commands::Embed { text, no_cache } => {
            let cache = embedding_cache(config)?;
            let embedding = cache.get_or_compute(&text, !no_cache)?;
            println!("hash:       {}", hash_text(&text));
            println!("model:      {}", cache.embedder().model_name());
            println!("dimensions: {}", embedding.len());
        }
        Commands::Cache { action } => match action {
            CacheAction::Status => {
                let stats = embed_cache::stats(&config.cache.dir)?;
                println!("dir:      {}", config.cache.dir.display());
                println!("enabled:  {}", config.cache.enabled);
                println!("entries:  {}", stats.entries);
                println!("size:     {:.1} KiB", stats.total_bytes as f64 / 1024.0);
            }
            CacheAction::Clear => {
                let removed = embed_cache::clear(&config.cache.dir)?;
                println!("Removed {removed} cached embedding(s).");
            }
        },
    }
    Ok(())
}

fn chat_loop(session: &mut ChatSession, service: &QuestionService<'_>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        match line.trim() {
            "" => continue,
            "/quit" => return Ok(()),
            "/clear" => {
                session.clear();
                println!("(conversation cleared)");
            }
            question => match session.ask(service, question) {
                Ok(asked) => print_asked(&asked),
                Err(e) => {
                    log::error!("{e:#}");
                    eprintln!("error: {e:#}");
                }
            },
        }
    }
}

/// The one provider client shared by every component that talks to OpenAI.
fn openai_client(config: &Config) -> Result<Arc<OpenAiClient>> {
    Ok(Arc::new(OpenAiClient::new(&config.openai, config.api_key()?)))
}

fn embedding_cache(config: &Config) -> Result<EmbeddingCache> {
    let embedder = OpenAiEmbedder::new(openai_client(config)?, &config.embed.model, config.embed.dimensions);
    EmbeddingCache::open(&config.cache.dir, config.cache.enabled, Arc::new(embedder))
}

fn record_store(config: &Config) -> Result<Box<dyn RecordStore>> {
    Ok(Box::new(HttpRecordStore::new(config.store_url()?, config.store.timeout_secs)))
}

fn find_record(store: &dyn RecordStore, id: &str) -> Result<Record> {
    store
        .all_records()?
        .into_iter()
        .find(|r| r.id == id)
        .with_context(|| format!("no system with id {id}"))
}

fn print_record(record: &Record) {
    println!();
    println!("{}  [{}]  team: {}", record.system_name, record.cloud_provider, record.team.primary);
    println!("  {}", record.description);
    println!("  services: {}", record.cloud_services.join(", "));
    if !record.repository.application.is_empty() {
        println!("  repo:     {}", record.repository.application);
    }
    match record.updated_at {
        Some(updated) => println!(
            "  created:  {}  updated: {}",
            record.created_at.format("%Y-%m-%d"),
            updated.format("%Y-%m-%d")
        ),
        None => println!("  created:  {}", record.created_at.format("%Y-%m-%d")),
    }
    println!("  id:       {}", record.id);
}

fn print_scored(rank: usize, scored: &ScoredRecord) {
    let record = &scored.record;
    println!(
        "{rank}. {} ({:.1}%)  [{}]  team: {}",
        record.system_name, scored.similarity, record.cloud_provider, record.team.primary
    );
    println!("   {}", record.description);
    println!("   services: {}", record.cloud_services.join(", "));
    println!("   id: {}", record.id);
}

fn print_asked(asked: &Asked) {
    match asked {
        Asked::Answered(answer) => println!("{answer}"),
        Asked::Rejected { reason } => println!("Question rejected: {reason}"),
    }
}
