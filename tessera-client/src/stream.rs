//! Socket abstraction over plain TCP and TLS.

use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

pin_project! {
    /// The socket of one connection.
    #[project = WireStreamProj]
    pub enum WireStream {
        Plain { #[pin] socket: TcpStream },
        Tls { #[pin] socket: TlsStream<TcpStream> },
    }
}

/// Forwards a poll call to whichever socket is inside.
macro_rules! forward {
    ($this:expr, $socket:ident => $call:expr) => {
        match $this.project() {
            WireStreamProj::Plain { socket: $socket } => $call,
            WireStreamProj::Tls { socket: $socket } => $call,
        }
    };
}

impl WireStream {
    pub fn is_tls(&self) -> bool {
        matches!(self, WireStream::Tls { .. })
    }

    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            WireStream::Plain { .. } => "tcp",
            WireStream::Tls { .. } => "tls",
        }
    }
}

impl AsyncRead for WireStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        forward!(self, socket => socket.poll_read(cx, buf))
    }
}

impl AsyncWrite for WireStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        forward!(self, socket => socket.poll_write(cx, buf))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        forward!(self, socket => socket.poll_flush(cx))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        forward!(self, socket => socket.poll_shutdown(cx))
    }
}
