//! Reference aggregation service
//!
//! Serves a fixed inference configuration and parameter snapshot and records
//! every episode report it receives. One thread per connected actor; reports
//! from different actors are recorded independently, in arrival order.

use crate::client::AggregationServer;
use crate::error::{ActorError, ActorResult};
use crate::protocol::{ActorEpisodeReport, Request, Response, read_message, write_message};
use neurocube_ml::{InferenceConfig, ModelResult, ParameterBlob, PolicyValueNet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tracing::{debug, info, warn};

/// Destination of received reports.
pub trait ReportSink: Send {
    /// Store one report.
    fn record(&mut self, report: &ActorEpisodeReport) -> io::Result<()>;
}

/// Keeps reports in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    reports: Arc<Mutex<Vec<ActorEpisodeReport>>>,
}

impl MemorySink {
    /// Snapshot of everything recorded so far.
    pub fn reports(&self) -> Vec<ActorEpisodeReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ReportSink for MemorySink {
    fn record(&mut self, report: &ActorEpisodeReport) -> io::Result<()> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
        Ok(())
    }
}

/// Appends reports to a file, one JSON object per line.
#[derive(Debug)]
pub struct JsonlSink {
    out: BufWriter<File>,
}

impl JsonlSink {
    /// Open `path` for appending, creating it if needed.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }
}

impl ReportSink for JsonlSink {
    fn record(&mut self, report: &ActorEpisodeReport) -> io::Result<()> {
        write_message(&mut self.out, report)
    }
}

/// Discards reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn record(&mut self, _report: &ActorEpisodeReport) -> io::Result<()> {
        Ok(())
    }
}

/// Reference implementation of the server side of the protocol.
pub struct AggregationService {
    config: InferenceConfig,
    weights: ParameterBlob,
    sink: Mutex<Box<dyn ReportSink>>,
    reports: AtomicU64,
}

impl std::fmt::Debug for AggregationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationService")
            .field("config", &self.config)
            .field("weights_version", &self.weights.version)
            .field("reports", &self.reports_received())
            .finish()
    }
}

impl AggregationService {
    /// Service with the given configuration and snapshot.
    pub fn new(config: InferenceConfig, weights: ParameterBlob, sink: Box<dyn ReportSink>) -> Self {
        Self {
            config,
            weights,
            sink: Mutex::new(sink),
            reports: AtomicU64::new(0),
        }
    }

    /// Service with freshly initialised parameters of the configured shape.
    pub fn with_fresh_weights(config: InferenceConfig, sink: Box<dyn ReportSink>) -> ModelResult<Self> {
        let net = PolicyValueNet::new(config.network.clone())?;
        let weights = ParameterBlob::from_network(1, &net)?;
        Ok(Self::new(config, weights, sink))
    }

    /// Service serving a network saved with [`PolicyValueNet::to_bytes`];
    /// the published configuration follows the saved network's shape.
    pub fn from_weights_file(
        path: &Path,
        dropout_training: bool,
        sink: Box<dyn ReportSink>,
    ) -> ActorResult<Self> {
        let bytes = fs::read(path)?;
        let net = PolicyValueNet::from_bytes(&bytes)?;
        let config = InferenceConfig {
            network: net.config().clone(),
            dropout_training,
        };
        Ok(Self::new(config, ParameterBlob { version: 1, bytes }, sink))
    }

    /// Number of reports recorded so far.
    pub fn reports_received(&self) -> u64 {
        self.reports.load(Ordering::SeqCst)
    }

    /// Answer one request.
    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::GetConfig => Response::Config {
                config: self.config.clone(),
            },
            Request::GetWeights => Response::Weights {
                blob: self.weights.clone(),
            },
            Request::ProcessActorEpisode { report } => {
                let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
                match sink.record(&report) {
                    Ok(()) => {
                        self.reports.fetch_add(1, Ordering::SeqCst);
                        debug!(
                            instance = %report.instance_id,
                            cuber = %report.cuber_name,
                            brancher = %report.brancher_name,
                            examples = report.examples.len(),
                            "report recorded"
                        );
                        Response::Ack
                    }
                    Err(e) => Response::Error {
                        message: format!("cannot record report: {e}"),
                    },
                }
            }
        }
    }

    /// Accept connections forever, one thread per connection.
    pub fn serve(self: Arc<Self>, listener: TcpListener) -> ActorResult<()> {
        info!(addr = ?listener.local_addr().ok(), "aggregation service listening");
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };
            let service = Arc::clone(&self);
            thread::spawn(move || {
                let peer = stream.peer_addr().ok();
                if let Err(e) = service.handle_connection(stream) {
                    warn!(?peer, "connection closed with error: {e}");
                }
            });
        }
        Ok(())
    }

    /// Bind `addr` and serve in a background thread; returns the bound
    /// address.
    pub fn spawn(self: Arc<Self>, addr: &str) -> ActorResult<std::net::SocketAddr> {
        let listener = TcpListener::bind(addr).map_err(|source| ActorError::Transport {
            endpoint: addr.to_string(),
            source,
        })?;
        let local = listener.local_addr()?;
        thread::spawn(move || self.serve(listener));
        Ok(local)
    }

    fn handle_connection(&self, stream: TcpStream) -> io::Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;
        loop {
            let response = match read_message::<_, Request>(&mut reader) {
                Ok(Some(request)) => self.handle(request),
                Ok(None) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::InvalidData => Response::Error {
                    message: format!("malformed request: {e}"),
                },
                Err(e) => return Err(e),
            };
            write_message(&mut writer, &response)?;
        }
    }
}

/// In-process connection to an [`AggregationService`].
#[derive(Debug, Clone)]
pub struct LocalServer {
    service: Arc<AggregationService>,
}

impl LocalServer {
    /// Connection to `service`.
    pub fn new(service: Arc<AggregationService>) -> Self {
        Self { service }
    }
}

impl AggregationServer for LocalServer {
    fn get_config(&mut self) -> ActorResult<InferenceConfig> {
        self.service.handle(Request::GetConfig).into_config()
    }

    fn get_weights(&mut self) -> ActorResult<ParameterBlob> {
        self.service.handle(Request::GetWeights).into_weights()
    }

    fn process_actor_episode(&mut self, report: ActorEpisodeReport) -> ActorResult<()> {
        self.service
            .handle(Request::ProcessActorEpisode { report })
            .into_ack()
    }
}
