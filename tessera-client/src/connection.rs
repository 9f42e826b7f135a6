//! Connection management.
//!
//! Every send opens its own connection. A request writes one frame, resolves
//! on the first line that decodes and then drops the socket. A subscription
//! hands the socket to a [`SubscriptionHandle`] that streams until stopped.

use crate::error::ClientError;
use crate::reply::{Delivery, Failure, Reply};
use crate::stream::WireStream;
use crate::subscription::{MessageCallback, ReadSettings, SubscriptionHandle};
use crate::tls::{create_connector, TlsClientConfig};
use rustls::pki_types::ServerName;
use std::time::Duration;
use tessera_protocol::query::is_subscription;
use tessera_protocol::{encode_frame, LineDecoder, ProtocolError, DEFAULT_PORT, MAX_FRAME_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Default time allowed for the TCP connect.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time a connection may sit without receiving a byte.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default time allowed for the TLS handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Engine host name or address.
    pub host: String,
    /// Engine port.
    pub port: u16,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Longest silence tolerated while waiting for data.
    pub idle_timeout: Duration,
    /// TLS handshake timeout, separate from the idle timeout.
    pub handshake_timeout: Duration,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Longest accepted line.
    pub max_frame_size: usize,
    /// TLS configuration (optional).
    pub tls: Option<TlsClientConfig>,
}

impl TransportConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_frame_size: MAX_FRAME_SIZE,
            tls: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn with_tls(mut self, tls_config: TlsClientConfig) -> Self {
        self.tls = Some(tls_config);
        self
    }

    /// Returns the `host:port` pair for log lines.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) fn read_settings(&self) -> ReadSettings {
        ReadSettings {
            idle_timeout: self.idle_timeout,
            read_buffer_size: self.read_buffer_size,
            max_frame_size: self.max_frame_size,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

/// Opens connections and carries frames over them.
pub struct Transport {
    config: TransportConfig,
    tls: Option<(TlsConnector, ServerName<'static>)>,
}

impl Transport {
    /// Creates a transport. TLS material is loaded here, so bad certificate
    /// paths are reported before any connection is attempted.
    pub fn new(config: TransportConfig) -> Result<Self, ClientError> {
        let tls = match config.tls {
            Some(ref tls_config) if tls_config.enabled => {
                let connector = create_connector(tls_config)?;
                let server_name = tls_config.server_name_for(&config.host)?;
                Some((connector, server_name))
            }
            _ => None,
        };
        Ok(Self { config, tls })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Sends `message` and returns how the engine answered.
    ///
    /// Commands whose name contains `subscribe` stream replies into
    /// `on_message`; everything else resolves a single reply and ignores it.
    pub async fn send(
        &self,
        command: &str,
        message: &str,
        on_message: Option<MessageCallback>,
    ) -> Delivery {
        if is_subscription(command) {
            self.subscribe(message, on_message).await
        } else {
            Delivery::Reply(self.request(message).await)
        }
    }

    /// One-shot request: the first decodable line is the reply.
    pub async fn request(&self, message: &str) -> Reply {
        let mut stream = match self.open().await {
            Ok(stream) => stream,
            Err(failure) => return Reply::Failure(failure),
        };
        let reply = exchange(&mut stream, &encode_frame(message), &self.config.read_settings()).await;
        tracing::debug!(
            "Request to {} finished: {}",
            self.config.address(),
            if reply.is_message() { "ok" } else { "failed" }
        );
        reply
    }

    /// Opens a subscription and returns its handle as soon as the request
    /// has been written. A failure to connect or write comes back as a reply.
    pub async fn subscribe(&self, message: &str, on_message: Option<MessageCallback>) -> Delivery {
        let mut stream = match self.open().await {
            Ok(stream) => stream,
            Err(failure) => return Delivery::Reply(Reply::Failure(failure)),
        };
        if let Err(e) = write_frame(&mut stream, &encode_frame(message)).await {
            tracing::debug!("Subscription request write failed: {}", e);
            return Delivery::Reply(Reply::Failure(Failure::Io(e.to_string())));
        }
        tracing::debug!("Subscription to {} started", self.config.address());
        Delivery::Subscription(SubscriptionHandle::spawn(
            stream,
            self.config.read_settings(),
            on_message,
        ))
    }

    /// Connects and, when configured, completes the TLS handshake.
    pub async fn open(&self) -> Result<WireStream, Failure> {
        let addr = self.config.address();
        tracing::debug!("Connecting to {}...", addr);

        let tcp_stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect((self.config.host.as_str(), self.config.port)),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            Failure::Connect(format!(
                "timed out after {:?} connecting to {}",
                self.config.connect_timeout, addr
            ))
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            Failure::Connect(format!("{}: {}", addr, e))
        })?;

        tcp_stream.set_nodelay(true).ok();

        let Some((connector, server_name)) = &self.tls else {
            let stream = WireStream::Plain { socket: tcp_stream };
            tracing::debug!("Connected to {} over {}", addr, stream.kind());
            return Ok(stream);
        };

        tracing::debug!("Performing TLS handshake...");
        let tls_stream = tokio::time::timeout(
            self.config.handshake_timeout,
            connector.connect(server_name.clone(), tcp_stream),
        )
        .await
        .map_err(|_| {
            tracing::debug!("TLS handshake timeout");
            Failure::TlsHandshakeTimeout
        })?
        .map_err(|e| Failure::TlsHandshake(e.to_string()))?;

        let stream = WireStream::Tls { socket: tls_stream };
        tracing::debug!("TLS handshake complete, connected to {} over {}", addr, stream.kind());
        Ok(stream)
    }
}

async fn write_frame<S>(stream: &mut S, frame: &[u8]) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(frame).await?;
    stream.flush().await
}

/// Writes `frame` and reads until one line decodes.
///
/// Lines that fail to decode are skipped. At end-of-stream the unterminated
/// remainder gets one last decode attempt.
pub(crate) async fn exchange<S>(stream: &mut S, frame: &[u8], settings: &ReadSettings) -> Reply
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = write_frame(stream, frame).await {
        tracing::debug!("Request write failed: {}", e);
        return Reply::Failure(Failure::Io(e.to_string()));
    }
    tracing::debug!("Request sent ({} bytes), waiting for response...", frame.len());

    let mut decoder = LineDecoder::with_max_frame_size(settings.max_frame_size);
    let mut buf = vec![0u8; settings.read_buffer_size];

    loop {
        let n = match tokio::time::timeout(settings.idle_timeout, stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                tracing::debug!("Connection closed with {} bytes buffered", decoder.buffered());
                return match decoder.take_remainder() {
                    Some(rest) => match tessera_protocol::decode_bytes(&rest) {
                        Ok(value) => Reply::Message(value),
                        Err(_) => Reply::Failure(Failure::IncompleteResponse),
                    },
                    None => Reply::Failure(Failure::IncompleteResponse),
                };
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                tracing::debug!("Read error: {}", e);
                return Reply::Failure(Failure::Io(e.to_string()));
            }
            Err(_) => {
                tracing::debug!("Read timeout");
                return Reply::Failure(Failure::Timeout);
            }
        };

        tracing::debug!("Read {} bytes from socket", n);
        decoder.extend(&buf[..n]);

        loop {
            match decoder.next_line() {
                Ok(Some(line)) => match tessera_protocol::decode_bytes(&line) {
                    Ok(value) => return Reply::Message(value),
                    Err(e) => tracing::debug!("Skipping undecodable line: {}", e),
                },
                Ok(None) => break,
                Err(ProtocolError::FrameTooLarge { size, max }) => {
                    return Reply::Failure(Failure::FrameTooLarge { size, max });
                }
                Err(e) => return Reply::Failure(Failure::InvalidMessage(e.to_string())),
            }
        }
    }
}
