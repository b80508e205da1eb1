//! Safe-query CLI.
//!
//! Entry point for sq-core, handling:
//! - Dominating-policy search over a problem's unknown constraints
//! - One-shot query proposals for a problem state
//! - Simulated query sessions against a problem's ground truth
//! - Configuration inspection and validation
//!
//! JSON payloads go to stdout; logs and errors go to stderr.

use clap::{Args, Parser, Subcommand, ValueEnum};
use sq_common::error::StructuredError;
use sq_common::{Error, SCHEMA_VERSION};
use sq_config::{early_stop_budget, load_config, Config, ConfigError, ResolvedConfig};
use sq_core::agent::{AgentError, JointUncertaintyAgent};
use sq_core::exit_codes::ExitCode;
use sq_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use sq_core::oracle::oracle_for_backend;
use sq_core::problem::ProblemSpec;
use sq_core::query::{compute_evoi, DomPiSamplingAgent, MyopicQueryAgent, QueryAgent};
use sq_core::search::DomPiSearch;
use sq_core::session::{run_session, SimulatedResponder};
use std::path::{Path, PathBuf};
use tracing::info;

/// Safe query selection for MDPs with uncertain rewards and constraints
#[derive(Parser)]
#[command(name = "sq-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (overrides SQ_CONFIG and the XDG location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q errors only, -qq silent)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Log format on stderr: human or jsonl
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the relevant constraints and dominating policies of a problem
    Search(SearchArgs),

    /// Propose the next query for a problem
    Query(QueryArgs),

    /// Run a simulated query session against the problem's ground truth
    Session(SessionArgs),

    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Problem file (JSON)
    problem: PathBuf,

    /// Evaluate every subset of the unknown constraints instead
    #[arg(long)]
    brute_force: bool,

    /// Time budget in seconds (overrides search.early_stop_secs); 0 stops at once
    #[arg(long, allow_negative_numbers = true)]
    budget: Option<f64>,

    /// Disable dominance pruning
    #[arg(long)]
    no_prune: bool,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Problem file (JSON)
    problem: PathBuf,

    /// Query selection strategy
    #[arg(long, value_enum, default_value_t = Method::Myopic)]
    method: Method,

    /// RNG seed for the sampling strategy (overrides query.seed)
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Problem file (JSON) with a `truth` section
    problem: PathBuf,

    /// Query selection strategy
    #[arg(long, value_enum, default_value_t = Method::Myopic)]
    method: Method,

    /// RNG seed for the sampling strategy (overrides query.seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum number of queries (overrides query.max_rounds)
    #[arg(long)]
    max_rounds: Option<usize>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Validate a config file (defaults to the resolved one)
    Validate {
        /// Config file to validate
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    /// One-step EVOI lookahead
    Myopic,
    /// Dominating-policy sampling
    Sampling,
}

fn main() {
    let cli = Cli::parse();

    let cli_level = if cli.global.verbose > 0 || cli.global.quiet > 0 {
        let steps = cli.global.verbose.min(2) as i8 - 2 * cli.global.quiet.min(2) as i8;
        Some(LogLevel::Info.shifted(steps))
    } else {
        None
    };
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let ctx = LogContext::new(generate_run_id());
    let result = match &cli.command {
        Commands::Search(args) => run_search(&cli.global, &ctx, args),
        Commands::Query(args) => run_query(&cli.global, &ctx, args),
        Commands::Session(args) => run_session_cmd(&cli.global, &ctx, args),
        Commands::Config(args) => run_config(&cli.global, &ctx, args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(err) => output_error(&ctx, &err),
    };
    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Shared helpers
// ============================================================================

fn config_error(err: ConfigError) -> Error {
    match err {
        ConfigError::UnknownBackend(e) => Error::UnknownBackend(e.0),
        ConfigError::IoError { source, .. } => Error::Io(source),
        other => Error::Config(other.to_string()),
    }
}

fn load(global: &GlobalOpts) -> Result<ResolvedConfig, Error> {
    let resolved = load_config(global.config.as_deref()).map_err(config_error)?;
    info!(
        event = event_names::CONFIG_LOADED,
        source = %resolved.source,
        path = ?resolved.path,
        "configuration loaded"
    );
    Ok(resolved)
}

fn load_agent(path: &Path, config: &Config) -> Result<(JointUncertaintyAgent, ProblemSpec), Error> {
    let spec = ProblemSpec::from_path(path)?;
    let problem = spec.build()?;
    info!(
        event = event_names::PROBLEM_LOADED,
        path = %path.display(),
        states = problem.mdp.num_states(),
        rewards = problem.mdp.num_rewards(),
        constraints = problem.constraints.states.len(),
        "problem loaded"
    );
    let oracle = oracle_for_backend(config.oracle.backend).map_err(AgentError::from)?;
    let agent = problem.joint_agent(oracle, config.query.cost_of_query)?;
    Ok((agent, spec))
}

fn build_query_agent(
    method: Method,
    joint: JointUncertaintyAgent,
    config: &Config,
    seed: Option<u64>,
) -> Box<dyn QueryAgent> {
    match method {
        Method::Myopic => Box::new(MyopicQueryAgent::new(joint, config.search.clone())),
        Method::Sampling => Box::new(DomPiSamplingAgent::new(
            joint,
            config.search.clone(),
            seed.or(config.query.seed),
        )),
    }
}

fn emit(value: &serde_json::Value) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn output_error(ctx: &LogContext, err: &Error) -> ExitCode {
    let structured = StructuredError::from(err);
    let response = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "run_id": ctx.run_id,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "status": "error",
        "error": structured,
    });
    eprintln!(
        "{}",
        serde_json::to_string_pretty(&response).unwrap_or_else(|_| structured.to_json())
    );
    ExitCode::from_error(err)
}

// ============================================================================
// Commands
// ============================================================================

fn run_search(global: &GlobalOpts, ctx: &LogContext, args: &SearchArgs) -> Result<ExitCode, Error> {
    let _span = ctx.span(Stage::Search).entered();
    let config = load(global)?.config;

    let mut search_config = config.search.clone();
    if let Some(secs) = args.budget {
        early_stop_budget(secs).map_err(|e| Error::InvalidArgument {
            flag: "--budget".to_string(),
            reason: e.to_string(),
        })?;
        search_config.early_stop_secs = Some(secs);
    }
    if args.no_prune {
        search_config = search_config.without_pruning();
    }
    let (joint, _) = load_agent(&args.problem, &config)?;
    let search = DomPiSearch::new(search_config);
    let outcome = if args.brute_force {
        search.brute_force(joint.constraints())?
    } else {
        search.run(joint.constraints())?
    };

    emit(&serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "run_id": ctx.run_id,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "mode": if args.brute_force { "brute_force" } else { "incremental" },
        "unknown": joint.constraints().unknown(),
        "relevant": &outcome.relevant,
        "complete": outcome.is_complete(),
        "stats": &outcome.stats,
        "dominating": &outcome.dominating,
        "beta": &outcome.beta,
    }))?;
    Ok(if outcome.is_complete() {
        ExitCode::Ok
    } else {
        ExitCode::IncompleteSearch
    })
}

fn run_query(global: &GlobalOpts, ctx: &LogContext, args: &QueryArgs) -> Result<ExitCode, Error> {
    let _span = ctx.span(Stage::Query).entered();
    let config = load(global)?.config;
    let (joint, _) = load_agent(&args.problem, &config)?;
    let prior_value = joint.current_safely_opt_pi_value()?;

    let mut agent = build_query_agent(args.method, joint, &config, args.seed);
    let query = agent.find_query()?;
    let evoi = match (&query, args.method) {
        (Some(q), Method::Myopic) => Some(compute_evoi(agent.joint(), q)?),
        _ => None,
    };

    emit(&serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "run_id": ctx.run_id,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "method": agent.name(),
        "query": query,
        "evoi": evoi,
        "prior_value": prior_value,
        "cost_of_query": config.query.cost_of_query,
    }))?;
    Ok(ExitCode::Ok)
}

fn run_session_cmd(
    global: &GlobalOpts,
    ctx: &LogContext,
    args: &SessionArgs,
) -> Result<ExitCode, Error> {
    let _span = ctx.span(Stage::Session).entered();
    let config = load(global)?.config;
    let (joint, spec) = load_agent(&args.problem, &config)?;
    let truth = spec.truth.ok_or_else(|| {
        Error::InvalidProblem("a session needs a `truth` section in the problem file".to_string())
    })?;

    let mut agent = build_query_agent(args.method, joint, &config, args.seed);
    let mut responder = SimulatedResponder::new(truth);
    let max_rounds = args.max_rounds.unwrap_or(config.query.max_rounds);
    let report = run_session(agent.as_mut(), &mut responder, max_rounds)?;

    emit(&serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "run_id": ctx.run_id,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "session": report,
    }))?;
    Ok(if report.safe_value.is_some() {
        ExitCode::Ok
    } else {
        ExitCode::NoSafePolicy
    })
}

fn run_config(global: &GlobalOpts, ctx: &LogContext, args: &ConfigArgs) -> Result<ExitCode, Error> {
    let _span = ctx.span(Stage::Init).entered();
    match &args.command {
        ConfigCommands::Show => {
            let resolved = load(global)?;
            emit(&serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "source": resolved.source.to_string(),
                "path": resolved.path.as_ref().map(|p| p.display().to_string()),
                "config": resolved.config,
            }))?;
        }
        ConfigCommands::Validate { path } => {
            let target = path.as_deref().or(global.config.as_deref());
            // loading runs semantic validation as well as parsing
            let resolved = load_config(target).map_err(config_error)?;
            emit(&serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "status": "valid",
                "source": resolved.source.to_string(),
                "path": resolved.path.as_ref().map(|p| p.display().to_string()),
            }))?;
        }
    }
    Ok(ExitCode::Ok)
}
