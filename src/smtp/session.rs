use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::ServerName;
use tracing::debug;

use super::{ProbeState, SessionError, SmtpReply};

enum Transport {
    Plain(BufReader<TcpStream>),
    Tls(Box<BufReader<TlsStream<TcpStream>>>),
    Closed,
}

/// One SMTP conversation over a single TCP connection.
///
/// Every command is bounded by `command_timeout`. [`close`](Self::close) is
/// idempotent: the first call sends QUIT (when the transport is still usable)
/// and drops the connection, later calls do nothing.
pub(crate) struct SmtpSession {
    host: String,
    port: u16,
    transport: Transport,
    command_timeout: Duration,
    state: ProbeState,
    tls: bool,
    transcript: Vec<String>,
}

impl SmtpSession {
    pub async fn connect(
        host: &str,
        addr: SocketAddr,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(SessionError::io(err)),
            Err(_) => return Err(SessionError::timeout(format!("connect to {addr}"))),
        };
        debug!(target: "mailprobe::smtp", host, %addr, "connected");
        Ok(Self {
            host: host.to_string(),
            port: addr.port(),
            transport: Transport::Plain(BufReader::new(stream)),
            command_timeout,
            state: ProbeState::Connecting,
            tls: false,
            transcript: Vec::new(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    pub fn advance(&mut self, state: ProbeState) {
        self.state = state;
    }

    pub fn fail(&mut self) {
        self.state = ProbeState::Failed;
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls
    }

    pub fn take_transcript(&mut self) -> Vec<String> {
        std::mem::take(&mut self.transcript)
    }

    pub async fn read_greeting(&mut self) -> Result<SmtpReply, SessionError> {
        let timeout = self.command_timeout;
        match tokio::time::timeout(timeout, self.read_reply()).await {
            Ok(reply) => reply,
            Err(_) => Err(SessionError::timeout("greeting")),
        }
    }

    /// Sends `command` and waits for the complete reply.
    pub async fn command(&mut self, command: &str) -> Result<SmtpReply, SessionError> {
        let timeout = self.command_timeout;
        let exchange = async {
            self.record("C", command);
            self.write_line(command).await.map_err(SessionError::io)?;
            self.read_reply().await
        };
        match tokio::time::timeout(timeout, exchange).await {
            Ok(reply) => reply,
            Err(_) => Err(SessionError::timeout(verb(command))),
        }
    }

    /// Performs the TLS handshake after a positive STARTTLS reply. On failure
    /// the transport is gone and the session can only be closed.
    pub async fn upgrade_tls(&mut self, connector: &TlsConnector) -> Result<(), SessionError> {
        let tcp = match std::mem::replace(&mut self.transport, Transport::Closed) {
            Transport::Plain(reader) => reader.into_inner(),
            Transport::Tls(reader) => {
                self.transport = Transport::Tls(reader);
                return Ok(());
            }
            Transport::Closed => {
                return Err(SessionError::protocol("session already closed"));
            }
        };

        let name = ServerName::try_from(self.host.as_str()).map_err(|err| {
            SessionError::TlsHandshake {
                source: io::Error::new(io::ErrorKind::InvalidInput, err.to_string()),
            }
        })?;
        let handshake = connector.connect(name, tcp);
        let stream = match tokio::time::timeout(self.command_timeout, handshake).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(SessionError::TlsHandshake { source }),
            Err(_) => {
                return Err(SessionError::TlsHandshake {
                    source: io::Error::new(io::ErrorKind::TimedOut, "handshake timed out"),
                });
            }
        };
        self.transport = Transport::Tls(Box::new(BufReader::new(stream)));
        self.tls = true;
        debug!(target: "mailprobe::smtp", host = %self.host, "TLS established");
        Ok(())
    }

    /// Sends QUIT once and drops the connection.
    pub async fn close(&mut self) {
        if matches!(self.transport, Transport::Closed) {
            if self.state != ProbeState::Failed {
                self.state = ProbeState::Closed;
            }
            return;
        }
        // Replies to QUIT are informational only.
        let _ = self.command("QUIT").await;
        match &mut self.transport {
            Transport::Plain(reader) => {
                let _ = reader.get_mut().shutdown().await;
            }
            Transport::Tls(reader) => {
                let _ = reader.get_mut().shutdown().await;
            }
            Transport::Closed => {}
        }
        self.transport = Transport::Closed;
        if self.state != ProbeState::Failed {
            self.state = ProbeState::Closed;
        }
    }

    async fn read_reply(&mut self) -> Result<SmtpReply, SessionError> {
        let mut code = None;
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            let (line_code, last, text) = parse_reply_line(&line)?;
            match code {
                Some(existing) if existing != line_code => {
                    return Err(SessionError::protocol(format!(
                        "inconsistent reply codes: {existing} vs {line_code}"
                    )));
                }
                Some(_) => {}
                None => code = Some(line_code),
            }
            self.record("S", &line);
            lines.push(text);
            if last {
                break;
            }
        }
        Ok(SmtpReply {
            code: code.unwrap_or_default(),
            lines,
        })
    }

    async fn read_line(&mut self) -> Result<String, SessionError> {
        let mut line = String::new();
        let read = match &mut self.transport {
            Transport::Plain(reader) => reader.read_line(&mut line).await,
            Transport::Tls(reader) => reader.read_line(&mut line).await,
            Transport::Closed => return Err(SessionError::protocol("session already closed")),
        }
        .map_err(SessionError::io)?;
        if read == 0 {
            return Err(SessionError::io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn write_line(&mut self, command: &str) -> io::Result<()> {
        let data = format!("{command}\r\n");
        match &mut self.transport {
            Transport::Plain(reader) => {
                let stream = reader.get_mut();
                stream.write_all(data.as_bytes()).await?;
                stream.flush().await
            }
            Transport::Tls(reader) => {
                let stream = reader.get_mut();
                stream.write_all(data.as_bytes()).await?;
                stream.flush().await
            }
            Transport::Closed => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "session already closed",
            )),
        }
    }

    fn record(&mut self, direction: &str, line: &str) {
        debug!(target: "mailprobe::smtp", host = %self.host, "{direction}: {line}");
        self.transcript
            .push(format!("[{}:{}] {direction}: {line}", self.host, self.port));
    }
}

/// Splits `250-SIZE 1000` into `(250, false, "SIZE 1000")`.
pub(crate) fn parse_reply_line(line: &str) -> Result<(u16, bool, String), SessionError> {
    let code = line
        .get(..3)
        .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse::<u16>().ok())
        .ok_or_else(|| SessionError::protocol(format!("invalid reply line: {line:?}")))?;
    let last = match line.as_bytes().get(3) {
        None | Some(b' ') => true,
        Some(b'-') => false,
        Some(_) => {
            return Err(SessionError::protocol(format!(
                "invalid reply separator: {line:?}"
            )));
        }
    };
    let text = line.get(4..).unwrap_or_default().to_string();
    Ok((code, last, text))
}

fn verb(command: &str) -> String {
    let upper = command.to_ascii_uppercase();
    ["MAIL FROM", "RCPT TO"]
        .into_iter()
        .find(|prefix| upper.starts_with(prefix))
        .map(str::to_string)
        .unwrap_or_else(|| upper.split_whitespace().next().unwrap_or_default().to_string())
}
