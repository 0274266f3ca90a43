//! neurocube-actor command line
//!
//! Without `--worker-index` the binary supervises the whole fleet described
//! by `--actor_config`, re-executing itself once per actor. With
//! `--worker-index` it runs that single actor. `--serve` runs the reference
//! aggregation service instead.

use clap::{ArgAction, Parser};
use neurocube_actor::{
    Actor, ActorError, ActorResult, AggregationService, FleetConfig, JsonlSink, NullSink,
    RemoteServer, ReportSink, Supervisor, WorkerCommand, plan, resolve_endpoint,
};
use neurocube_ml::InferenceConfig;
use std::ffi::OsString;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info, info_span};
use tracing_subscriber::FmtSubscriber;

/// Actor fleet generating training data for neural-guided SAT cubing
#[derive(Parser, Debug, Clone)]
#[command(name = "neurocube-actor")]
#[command(version)]
#[command(about = "Actor fleet generating training data for neural-guided SAT cubing")]
struct Args {
    /// Fleet configuration file
    #[arg(long = "actor_config", value_name = "FILE", default_value = "configs/actor/main.json")]
    actor_config: PathBuf,

    /// Aggregation server address (HOST:PORT); overrides `server_name`
    #[arg(long, value_name = "HOST:PORT")]
    uri: Option<String>,

    /// Run as the worker with this actor index
    #[arg(long = "worker-index", value_name = "INDEX", hide = true)]
    worker_index: Option<usize>,

    /// Run the reference aggregation service on ADDR
    #[arg(long, value_name = "ADDR", conflicts_with = "worker_index")]
    serve: Option<String>,

    /// Network parameters served by `--serve` (fresh parameters if omitted)
    #[arg(long, value_name = "FILE", requires = "serve")]
    weights: Option<PathBuf>,

    /// Append received reports to this JSON-lines file (with `--serve`)
    #[arg(long, value_name = "FILE", requires = "serve")]
    reports: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    /// Arguments handed down to worker processes.
    fn worker_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--actor_config".into(), self.actor_config.clone().into()];
        if let Some(uri) = &self.uri {
            args.push("--uri".into());
            args.push(uri.into());
        }
        if self.quiet {
            args.push("--quiet".into());
        }
        for _ in 0..self.verbose {
            args.push("--verbose".into());
        }
        args
    }
}

fn main() {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.level())
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    let result = if let Some(addr) = &args.serve {
        run_service(addr, &args)
    } else if let Some(index) = args.worker_index {
        run_worker(index, &args)
    } else {
        run_fleet(&args)
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_fleet(args: &Args) -> ActorResult<()> {
    let fleet = FleetConfig::load(&args.actor_config)?;
    let plans = plan(&fleet)?;
    info!(
        actors = plans.len(),
        roles = fleet.actors.len(),
        devices = fleet.n_gpus,
        "starting fleet"
    );

    let command = WorkerCommand::current_exe(args.worker_args())?;
    let summary = Supervisor::new(command, fleet.max_restarts).run(&plans)?;
    info!(
        succeeded = summary.succeeded.len(),
        failed = summary.failed.len(),
        launches = summary.launches,
        "fleet stopped"
    );
    if summary.failed.is_empty() {
        Ok(())
    } else {
        Err(ActorError::WorkersFailed(summary.failed))
    }
}

fn run_worker(index: usize, args: &Args) -> ActorResult<()> {
    let span = info_span!("actor", index);
    let _guard = span.enter();

    let fleet = FleetConfig::load(&args.actor_config)?;
    let addr = resolve_endpoint(args.uri.as_deref(), &fleet.server_name)?;
    let server = RemoteServer::connect(addr)?;
    info!(server = server.endpoint(), "connected");

    let mut actor = Actor::new(index, &fleet, server)?;
    let never = actor.run()?;
    match never {}
}

fn run_service(addr: &str, args: &Args) -> ActorResult<()> {
    let sink: Box<dyn ReportSink> = match &args.reports {
        Some(path) => Box::new(JsonlSink::create(path)?),
        None => Box::new(NullSink),
    };
    let service = match &args.weights {
        Some(path) => AggregationService::from_weights_file(path, false, sink)?,
        None => AggregationService::with_fresh_weights(InferenceConfig::default(), sink)?,
    };

    let listener = TcpListener::bind(addr).map_err(|source| ActorError::Transport {
        endpoint: addr.to_string(),
        source,
    })?;
    Arc::new(service).serve(listener)
}
