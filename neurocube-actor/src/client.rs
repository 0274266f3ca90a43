//! Actor side of the aggregation server connection.

use crate::error::{ActorError, ActorResult};
use crate::protocol::{ActorEpisodeReport, Request, Response, read_message, write_message};
use neurocube_ml::{InferenceConfig, ParameterBlob};
use std::io::{self, BufReader};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use tracing::{debug, warn};

/// Port used when a server name carries none.
pub const DEFAULT_PORT: u16 = 7050;

/// The three calls an actor makes. Calls block until the server answers.
pub trait AggregationServer {
    /// Inference configuration shared by the fleet.
    fn get_config(&mut self) -> ActorResult<InferenceConfig>;

    /// Current parameter snapshot.
    fn get_weights(&mut self) -> ActorResult<ParameterBlob>;

    /// Hand over one episode report.
    fn process_actor_episode(&mut self, report: ActorEpisodeReport) -> ActorResult<()>;
}

/// Find the server: an explicit `host:port` wins, otherwise `server_name` is
/// looked up through the system resolver.
pub fn resolve_endpoint(uri: Option<&str>, server_name: &str) -> ActorResult<SocketAddr> {
    let name = match uri {
        Some(uri) => uri.to_string(),
        None => with_default_port(server_name),
    };
    let mut addrs = name.to_socket_addrs().map_err(|e| ActorError::Resolve {
        name: name.clone(),
        message: e.to_string(),
    })?;
    addrs.next().ok_or_else(|| ActorError::Resolve {
        name,
        message: "no address found".into(),
    })
}

/// `name` as `host:port`, adding [`DEFAULT_PORT`] when it has none.
/// Bare IPv6 addresses get brackets.
fn with_default_port(name: &str) -> String {
    if let Ok(ip) = name.parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_PORT).to_string();
    }
    if name.ends_with(']') {
        return format!("{name}:{DEFAULT_PORT}");
    }
    let has_port = name
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    if has_port {
        name.to_string()
    } else {
        format!("{name}:{DEFAULT_PORT}")
    }
}

/// Long-lived TCP connection to the aggregation server.
#[derive(Debug)]
pub struct RemoteServer {
    endpoint: String,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl RemoteServer {
    /// Connect to `addr`.
    pub fn connect(addr: SocketAddr) -> ActorResult<Self> {
        let endpoint = addr.to_string();
        let writer = TcpStream::connect(addr).map_err(|source| ActorError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;
        if let Err(e) = writer.set_nodelay(true) {
            warn!(%endpoint, "cannot disable Nagle's algorithm: {e}");
        }
        let reader = writer.try_clone().map_err(|source| ActorError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;
        debug!(%endpoint, "connected to aggregation server");
        Ok(Self {
            endpoint,
            reader: BufReader::new(reader),
            writer,
        })
    }

    /// Address of the server.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn call(&mut self, request: &Request) -> ActorResult<Response> {
        write_message(&mut self.writer, request).map_err(|source| self.transport(source))?;
        let response: Option<Response> =
            read_message(&mut self.reader).map_err(|source| self.transport(source))?;
        response.ok_or_else(|| self.transport(io::ErrorKind::UnexpectedEof.into()))
    }

    fn transport(&self, source: io::Error) -> ActorError {
        ActorError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        }
    }
}

impl AggregationServer for RemoteServer {
    fn get_config(&mut self) -> ActorResult<InferenceConfig> {
        self.call(&Request::GetConfig)?.into_config()
    }

    fn get_weights(&mut self) -> ActorResult<ParameterBlob> {
        self.call(&Request::GetWeights)?.into_weights()
    }

    fn process_actor_episode(&mut self, report: ActorEpisodeReport) -> ActorResult<()> {
        self.call(&Request::ProcessActorEpisode { report })?.into_ack()
    }
}
