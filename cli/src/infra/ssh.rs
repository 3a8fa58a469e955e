//! SSH implementation of the `Transport` and `RemoteSession` ports.
//!
//! libssh2 is blocking, so every network call runs on the blocking pool via
//! `spawn_blocking`. libssh2's own timeout bounds each call and an outer
//! tokio timeout backs it up.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use ssh2::{ErrorCode, HashType, Session};

use crate::application::ports::{CommandOutput, RemoteSession, Transport};
use crate::domain::remote::{
    FileFailure, classify_file_failure, read_file_command, scratch_nonce, temp_path_for,
    write_file_command,
};
use crate::domain::settings::{AgentSettings, TransportSettings};
use crate::domain::{ConnectError, Credential, FileError, Host, TransportError};

// libssh2's LIBSSH2_ERROR_TIMEOUT.
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

// Headroom for the outer timeout over libssh2's own.
const TIMEOUT_GRACE: Duration = Duration::from_secs(2);

// Pause between output polls when neither stream has data ready.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Opens password or public-key authenticated SSH sessions.
#[derive(Debug, Clone)]
pub struct SshTransport {
    connect_timeout: Duration,
    command_timeout: Duration,
    use_sudo: bool,
}

impl SshTransport {
    #[must_use]
    pub fn new(transport: &TransportSettings, agent: &AgentSettings) -> Self {
        Self {
            connect_timeout: transport.connect_timeout(),
            command_timeout: transport.command_timeout(),
            use_sudo: agent.use_sudo,
        }
    }
}

/// Everything `connect_blocking` needs, owned so it can cross into the
/// blocking pool.
struct ConnectTarget {
    addr: SocketAddr,
    user: String,
    credential: Credential,
    host_key_sha256: Option<String>,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl Transport for SshTransport {
    type Session = SshSession;

    async fn open(&self, host: &Host) -> Result<SshSession, ConnectError> {
        let ip = host
            .ip()
            .map_err(|_| ConnectError::InvalidAddress(host.ip_address.clone()))?;
        let target = ConnectTarget {
            addr: SocketAddr::new(ip, host.effective_port()),
            user: host.ssh_user.clone(),
            credential: host.credential.clone(),
            host_key_sha256: host.host_key_sha256.clone(),
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
        };
        let addr = target.addr.to_string();
        tracing::debug!(host = %host.hostname, %addr, "opening ssh session");

        let secs = self.connect_timeout.as_secs();
        // Connect, handshake and auth each get the connect timeout.
        let bound = self.connect_timeout * 3 + TIMEOUT_GRACE;
        let task = tokio::task::spawn_blocking(move || connect_blocking(&target));
        let session = match tokio::time::timeout(bound, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join)) => {
                return Err(ConnectError::Handshake {
                    addr,
                    reason: format!("connect worker failed: {join}"),
                });
            }
            Err(_) => return Err(ConnectError::Timeout { addr, secs }),
        };

        Ok(SshSession {
            session,
            addr,
            command_timeout: self.command_timeout,
            use_sudo: self.use_sudo,
        })
    }
}

fn connect_blocking(target: &ConnectTarget) -> Result<Session, ConnectError> {
    let addr = target.addr.to_string();
    let secs = target.connect_timeout.as_secs();

    let tcp = TcpStream::connect_timeout(&target.addr, target.connect_timeout).map_err(|e| {
        if e.kind() == io::ErrorKind::TimedOut {
            ConnectError::Timeout {
                addr: addr.clone(),
                secs,
            }
        } else {
            ConnectError::Unreachable {
                addr: addr.clone(),
                reason: e.to_string(),
            }
        }
    })?;

    let handshake_err = |e: ssh2::Error| {
        if is_timeout(&e) {
            ConnectError::Timeout {
                addr: addr.clone(),
                secs,
            }
        } else {
            ConnectError::Handshake {
                addr: addr.clone(),
                reason: e.message().to_string(),
            }
        }
    };

    let mut session = Session::new().map_err(handshake_err)?;
    session.set_timeout(millis(target.connect_timeout));
    session.set_tcp_stream(tcp);
    session.handshake().map_err(handshake_err)?;

    if let Some(expected) = target.host_key_sha256.as_deref() {
        let actual = session
            .host_key_hash(HashType::Sha256)
            .map(hex)
            .unwrap_or_default();
        if normalize_fingerprint(expected) != actual {
            return Err(ConnectError::HostKeyMismatch {
                addr,
                expected: expected.to_string(),
                actual: if actual.is_empty() {
                    "unknown".to_string()
                } else {
                    actual
                },
            });
        }
    }

    let auth_err = |e: ssh2::Error| ConnectError::AuthFailed {
        user: target.user.clone(),
        reason: e.message().to_string(),
    };
    match &target.credential {
        Credential::Password { secret } => session
            .userauth_password(&target.user, secret)
            .map_err(auth_err)?,
        Credential::PrivateKey {
            key_material,
            passphrase,
        } => session
            .userauth_pubkey_memory(&target.user, None, key_material, passphrase.as_deref())
            .map_err(auth_err)?,
    }
    if !session.authenticated() {
        return Err(ConnectError::AuthFailed {
            user: target.user.clone(),
            reason: "server rejected the credential".to_string(),
        });
    }

    session.set_timeout(millis(target.command_timeout));
    Ok(session)
}

/// An authenticated SSH session. `ssh2::Session` is internally
/// reference-counted, so clones share one connection.
pub struct SshSession {
    session: Session,
    addr: String,
    command_timeout: Duration,
    use_sudo: bool,
}

impl SshSession {
    async fn blocking<R, F>(&self, f: F) -> Result<R, TransportError>
    where
        R: Send + 'static,
        F: FnOnce(&Session) -> Result<R, TransportError> + Send + 'static,
    {
        let session = self.session.clone();
        let secs = self.command_timeout.as_secs();
        let task = tokio::task::spawn_blocking(move || f(&session));
        match tokio::time::timeout(self.command_timeout + TIMEOUT_GRACE, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(TransportError::Session(format!(
                "ssh worker failed: {join}"
            ))),
            Err(_) => Err(TransportError::Timeout { secs }),
        }
    }

    async fn exec(&self, command: &str, stdin: Option<&[u8]>) -> Result<CommandOutput, TransportError> {
        let command = command.to_string();
        let stdin = stdin.map(<[u8]>::to_vec);
        let secs = self.command_timeout.as_secs();
        tracing::debug!(addr = %self.addr, command = %command, "running remote command");
        let output = self
            .blocking(move |session| exec_blocking(session, &command, stdin.as_deref(), secs))
            .await?;
        tracing::debug!(addr = %self.addr, exit_code = output.exit_code, "remote command finished");
        Ok(output)
    }
}

fn exec_blocking(
    session: &Session,
    command: &str,
    stdin: Option<&[u8]>,
    secs: u64,
) -> Result<CommandOutput, TransportError> {
    let ssh_err = |e: ssh2::Error| ssh_transport_error(&e, secs);
    let io_err = |e: io::Error| io_transport_error(&e, secs);

    let mut channel = session.channel_session().map_err(ssh_err)?;
    channel.exec(command).map_err(ssh_err)?;
    if let Some(input) = stdin {
        channel.write_all(input).map_err(io_err)?;
    }
    channel.send_eof().map_err(ssh_err)?;

    // Non-blocking while draining: a command that fills the stderr window
    // would otherwise stall a blocking read on stdout.
    let deadline = Instant::now() + Duration::from_secs(secs);
    session.set_blocking(false);
    let drained = drain_streams(&mut channel.stream(0), &mut channel.stderr(), deadline, secs);
    session.set_blocking(true);
    let (stdout, stderr) = drained?;

    channel.wait_close().map_err(ssh_err)?;
    let exit_code = channel.exit_status().map_err(ssh_err)?;
    Ok(CommandOutput {
        stdout,
        stderr,
        exit_code,
    })
}

/// Read stdout and stderr until both reach EOF, taking whatever either one
/// has ready on each pass.
fn drain_streams(
    stdout: &mut impl Read,
    stderr: &mut impl Read,
    deadline: Instant,
    secs: u64,
) -> Result<(Vec<u8>, Vec<u8>), TransportError> {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut out_open = true;
    let mut err_open = true;
    let mut buf = vec![0u8; 32 * 1024];
    while out_open || err_open {
        let mut progressed = false;
        if out_open {
            match read_ready(stdout, &mut buf, secs)? {
                Some(0) => out_open = false,
                Some(n) => {
                    out.extend_from_slice(&buf[..n]);
                    progressed = true;
                }
                None => {}
            }
        }
        if err_open {
            match read_ready(stderr, &mut buf, secs)? {
                Some(0) => err_open = false,
                Some(n) => {
                    err.extend_from_slice(&buf[..n]);
                    progressed = true;
                }
                None => {}
            }
        }
        if !progressed && (out_open || err_open) {
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout { secs });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
    Ok((out, err))
}

/// `Some(n)` for a read (0 is EOF), `None` when nothing is ready yet.
fn read_ready(stream: &mut impl Read, buf: &mut [u8], secs: u64) -> Result<Option<usize>, TransportError> {
    match stream.read(buf) {
        Ok(n) => Ok(Some(n)),
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => Ok(None),
        Err(e) => Err(io_transport_error(&e, secs)),
    }
}

impl RemoteSession for SshSession {
    async fn run(&self, command: &str) -> Result<CommandOutput, TransportError> {
        self.exec(command, None).await
    }

    async fn run_with_stdin(
        &self,
        command: &str,
        stdin: &[u8],
    ) -> Result<CommandOutput, TransportError> {
        self.exec(command, Some(stdin)).await
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, FileError> {
        let output = self.run(&read_file_command(path, self.use_sudo)).await?;
        if output.success() {
            return Ok(output.stdout);
        }
        Err(file_failure(path, &output))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FileError> {
        let temp = temp_path_for(path, &scratch_nonce());
        let command = write_file_command(path, &temp, content.len(), self.use_sudo);
        let output = self.run_with_stdin(&command, content).await?;
        if output.success() {
            return Ok(());
        }
        Err(file_failure(path, &output))
    }

    async fn close(self) {
        let addr = self.addr.clone();
        let result = self
            .blocking(|session| {
                session
                    .disconnect(None, "tgfleet session closed", None)
                    .map_err(|e| TransportError::Session(e.message().to_string()))
            })
            .await;
        if let Err(e) = result {
            tracing::debug!(%addr, error = %e, "ssh disconnect failed");
        }
    }
}

fn file_failure(path: &str, output: &CommandOutput) -> FileError {
    let stderr = output.stderr_text();
    match classify_file_failure(&stderr) {
        FileFailure::NotFound => FileError::NotFound {
            path: path.to_string(),
        },
        FileFailure::PermissionDenied => FileError::PermissionDenied {
            path: path.to_string(),
        },
        FileFailure::Other => FileError::Transport(TransportError::Remote(format!(
            "exit code {}: {}",
            output.exit_code,
            stderr.trim()
        ))),
    }
}

fn is_timeout(err: &ssh2::Error) -> bool {
    matches!(err.code(), ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT))
}

fn ssh_transport_error(err: &ssh2::Error, secs: u64) -> TransportError {
    if is_timeout(err) {
        TransportError::Timeout { secs }
    } else {
        TransportError::Session(err.message().to_string())
    }
}

fn io_transport_error(err: &io::Error, secs: u64) -> TransportError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout { secs },
        _ => TransportError::Session(err.to_string()),
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Accept `AB:CD:...`, `abcd...` and `SHA256:`-prefixed hex pins alike.
fn normalize_fingerprint(pin: &str) -> String {
    let trimmed = pin.trim();
    let body = trimmed
        .strip_prefix("SHA256:")
        .or_else(|| trimmed.strip_prefix("sha256:"))
        .unwrap_or(trimmed);
    body.chars()
        .filter(|c| *c != ':')
        .collect::<String>()
        .to_ascii_lowercase()
}
