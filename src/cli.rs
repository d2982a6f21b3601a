//! Command-line interface for sarek.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::analysis::AnalysisEngine;
use crate::assistant::{Assistant, AssistantError};
use crate::cache::{AnalysisCache, PersistedAnalyses};
use crate::config::{self, Config};
use crate::db::Database;
use crate::memory::{ConversationStore, SessionManager, DEFAULT_SESSION};
use crate::oracle::OllamaOracle;
use crate::project::{CancellationToken, ProjectAggregator};
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Terminal AI assistant with cached code analysis and conversation memory.
///
/// Questions are answered by a local Ollama model with the recent turns of
/// the session as context. Source files and directories are analyzed for
/// structure, complexity and suspicious patterns; results are cached by
/// content.
#[derive(Parser)]
#[command(name = "sarek")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: <config dir>/sarek/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a source file or directory
    Analyze(AnalyzeArgs),
    /// Ask a question with session context
    Ask(AskArgs),
    /// Show the turns of a session
    History(HistoryArgs),
    /// Search past turns
    Search(SearchArgs),
    /// List sessions
    Sessions,
    /// Delete a session and all of its turns
    Purge(PurgeArgs),
    /// Show memory and database statistics
    Stats,
    /// Inspect or clear the persisted analysis cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// File or directory to analyze
    pub path: PathBuf,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Number of files in the complexity ranking
    #[arg(long)]
    pub top: Option<usize>,

    /// Analyze directory files on all cores
    #[arg(long)]
    pub parallel: bool,

    /// Language tag to use instead of detection (single files only)
    #[arg(short, long)]
    pub language: Option<String>,
}

#[derive(Args)]
pub struct AskArgs {
    /// The question
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Session name
    #[arg(short, long)]
    pub session: Option<String>,

    /// Model to use instead of keyword routing
    #[arg(short, long)]
    pub model: Option<String>,
}

#[derive(Args)]
pub struct HistoryArgs {
    /// Session name
    #[arg(short, long)]
    pub session: Option<String>,

    /// Number of most recent turns
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,

    /// Print turns in full
    #[arg(long)]
    pub full: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    pub query: String,

    /// Restrict to one session
    #[arg(short, long)]
    pub session: Option<String>,

    #[arg(short = 'n', long, default_value_t = crate::memory::DEFAULT_SEARCH_LIMIT)]
    pub limit: usize,
}

#[derive(Args)]
pub struct PurgeArgs {
    pub session: String,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Number of stored analyses
    Stats,
    /// Remove every stored analysis
    Clear,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file location
    Path,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Loaded configuration plus the path it came from.
struct Context {
    config: Config,
    config_path: Option<PathBuf>,
}

impl Context {
    fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = path.map(Path::to_path_buf).or_else(Config::default_path);
        let config = Config::load(config_path.as_deref());
        config::validate(&config)?;
        Ok(Self {
            config,
            config_path,
        })
    }

    fn database(&self) -> anyhow::Result<Database> {
        Ok(Database::open(self.config.database_path())?)
    }

    fn store(&self) -> anyhow::Result<Arc<ConversationStore>> {
        Ok(Arc::new(ConversationStore::new(self.database()?)))
    }

    fn engine(&self) -> anyhow::Result<AnalysisEngine> {
        let mut cache = AnalysisCache::new(self.config.analysis.cache_capacity);
        if self.config.analysis.persist_cache {
            match self.database() {
                Ok(db) => cache = cache.with_persisted(PersistedAnalyses::new(db)),
                Err(err) => warn!(error = %err, "analysis results will not be persisted"),
            }
        }
        AnalysisEngine::with_defaults(&self.config.analysis.thresholds, Arc::new(cache))
    }
}

/// Run a parsed command line.
pub fn run(cli: &Cli) -> anyhow::Result<i32> {
    let ctx = Context::load(cli.config.as_deref())?;
    match &cli.command {
        Commands::Analyze(args) => run_analyze(&ctx, args),
        Commands::Ask(args) => run_ask(&ctx, args),
        Commands::History(args) => run_history(&ctx, args),
        Commands::Search(args) => run_search(&ctx, args),
        Commands::Sessions => run_sessions(&ctx),
        Commands::Purge(args) => run_purge(&ctx, args),
        Commands::Stats => run_stats(&ctx),
        Commands::Cache { action } => run_cache(&ctx, action),
        Commands::Config { action } => run_config(&ctx, action),
    }
}

fn run_analyze(ctx: &Context, args: &AnalyzeArgs) -> anyhow::Result<i32> {
    if args.format != "pretty" && args.format != "json" {
        eprintln!("Error: invalid format {:?}, must be 'pretty' or 'json'", args.format);
        return Ok(EXIT_ERROR);
    }
    let json = args.format == "json";

    let metadata = match std::fs::metadata(&args.path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };

    let engine = ctx.engine()?;

    if !metadata.is_dir() {
        let analysis = match &args.language {
            Some(language) => {
                let text = std::fs::read_to_string(&args.path)?;
                let result = engine.analyze_source(&text, language);
                (Arc::new(result), false)
            }
            None => match engine.analyze_file(&args.path) {
                Ok(a) => (a.result, a.cache_hit),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return Ok(EXIT_FAILED);
                }
            },
        };
        let (result, cache_hit) = analysis;
        if json {
            report::write_file_json(&args.path, &result, cache_hit)?;
        } else {
            report::write_file_pretty(&args.path, &result, cache_hit);
        }
        return Ok(EXIT_SUCCESS);
    }

    let aggregator = ProjectAggregator::new(&engine)
        .with_top_n(args.top.unwrap_or(ctx.config.analysis.top_n));
    let filters = ctx.config.analysis.filters();

    let project = if args.parallel {
        aggregator.analyze_tree_parallel(&args.path, &filters)?
    } else {
        let progress = if json {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::with_template("  {spinner} {pos} files  {wide_msg}")?);
            pb
        };
        let report = aggregator.analyze_tree_with(
            &args.path,
            &filters,
            &CancellationToken::new(),
            |p| {
                progress.set_position(p.processed as u64);
                progress.set_message(p.current.display().to_string());
            },
        )?;
        progress.finish_and_clear();
        report
    };

    if json {
        report::write_json(&project)?;
    } else {
        report::write_project_pretty(&project, &engine.cache().stats());
    }
    Ok(EXIT_SUCCESS)
}

fn run_ask(ctx: &Context, args: &AskArgs) -> anyhow::Result<i32> {
    let oracle = OllamaOracle::new(&ctx.config.ollama_url, ctx.config.oracle_timeout())?;
    let assistant = Assistant::new(oracle, ctx.store()?, ctx.config.clone());
    let query = args.query.join(" ");

    match assistant.ask(args.session.as_deref(), &query, args.model.as_deref()) {
        Ok(answer) => {
            println!("{}", answer.text);
            Ok(EXIT_SUCCESS)
        }
        Err(AssistantError::Oracle(e)) => {
            eprintln!("Error: {}", e);
            eprintln!("Make sure Ollama is running with `ollama serve`");
            Ok(EXIT_FAILED)
        }
        Err(e) => Err(e.into()),
    }
}

fn run_history(ctx: &Context, args: &HistoryArgs) -> anyhow::Result<i32> {
    let store = ctx.store()?;
    let session = args.session.as_deref().unwrap_or(DEFAULT_SESSION);
    let mut turns = store.recent_turns(session, args.limit)?;
    turns.reverse();
    report::write_turns(&turns, args.full);
    Ok(EXIT_SUCCESS)
}

fn run_search(ctx: &Context, args: &SearchArgs) -> anyhow::Result<i32> {
    let store = ctx.store()?;
    let turns = store.search_in(&args.query, args.session.as_deref(), args.limit)?;
    report::write_turns(&turns, false);
    Ok(EXIT_SUCCESS)
}

fn run_sessions(ctx: &Context) -> anyhow::Result<i32> {
    let sessions = SessionManager::new(ctx.store()?);
    report::write_sessions(&sessions.list()?, &sessions.active());
    Ok(EXIT_SUCCESS)
}

fn run_purge(ctx: &Context, args: &PurgeArgs) -> anyhow::Result<i32> {
    if !args.yes {
        eprintln!(
            "Error: purging {:?} deletes all of its turns; pass --yes to confirm",
            args.session
        );
        return Ok(EXIT_ERROR);
    }
    let removed = ctx.store()?.purge_session(&args.session)?;
    println!("Removed session {:?} ({} turns)", args.session, removed);
    Ok(EXIT_SUCCESS)
}

fn run_stats(ctx: &Context) -> anyhow::Result<i32> {
    let stats = ctx.store()?.stats()?;
    report::write_memory_stats(&stats, None);
    Ok(EXIT_SUCCESS)
}

fn run_cache(ctx: &Context, action: &CacheAction) -> anyhow::Result<i32> {
    let persisted = PersistedAnalyses::new(ctx.database()?);
    match action {
        CacheAction::Stats => println!("{} stored analyses", persisted.len()?),
        CacheAction::Clear => println!("Removed {} stored analyses", persisted.clear()?),
    }
    Ok(EXIT_SUCCESS)
}

fn run_config(ctx: &Context, action: &ConfigAction) -> anyhow::Result<i32> {
    match action {
        ConfigAction::Show => print!("{}", serde_yaml::to_string(&ctx.config)?),
        ConfigAction::Path => match &ctx.config_path {
            Some(path) => println!("{}", path.display()),
            None => {
                eprintln!("Error: no configuration directory on this platform");
                return Ok(EXIT_ERROR);
            }
        },
        ConfigAction::Init { force } => {
            let Some(path) = &ctx.config_path else {
                eprintln!("Error: no configuration directory on this platform; use --config");
                return Ok(EXIT_ERROR);
            };
            if path.exists() && !force {
                eprintln!("Error: file already exists: {}", path.display());
                eprintln!("Use --force to overwrite it");
                return Ok(EXIT_ERROR);
            }
            Config::default().save(path)?;
            println!("Created {}", path.display());
        }
    }
    Ok(EXIT_SUCCESS)
}
