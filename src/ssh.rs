//! SSH transport on libssh2
//!
//! A session is one authenticated `ssh2::Session` held for the whole run.
//! Each remote command gets its own channel on it:
//! 1. `open` connects with a timeout, handshakes, verifies the host key
//!    and authenticates (key file, password, or agent)
//! 2. `exec` runs PowerShell on a fresh channel and collects its status
//! 3. `close` disconnects the session

use crate::cluster;
use base64::Engine;
use reconcile::{ClusterLevel, Credential, Error, RemoteError, RemoteSession, SessionOpener};
use ssh2::{CheckResult, DisconnectCode, HashType, KnownHostFileKind, Session};
use std::io::Read;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

/// Connection settings for the SSH transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSettings {
    pub port: u16,
    pub identity_file: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub shell: String,
    pub known_hosts: Option<PathBuf>,
    /// Pinned `SHA256:<base64>` host key fingerprint
    pub host_key_fingerprint: Option<String>,
    pub accept_unknown_host_keys: bool,
}

impl SshSettings {
    /// Command line running `script` through the remote PowerShell
    fn command_line(&self, script: &str) -> String {
        format!(
            "{} -NoLogo -NoProfile -NonInteractive -EncodedCommand {}",
            self.shell,
            cluster::encode_command(script)
        )
    }
}

/// Result of looking the host key up in `known_hosts`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KnownHost {
    Match,
    Mismatch,
    NotFound,
    Unchecked,
}

impl From<CheckResult> for KnownHost {
    fn from(result: CheckResult) -> Self {
        match result {
            CheckResult::Match => Self::Match,
            CheckResult::Mismatch => Self::Mismatch,
            CheckResult::NotFound => Self::NotFound,
            CheckResult::Failure => Self::Unchecked,
        }
    }
}

/// Opens [`SshSession`]s with libssh2
pub struct SshOpener {
    settings: SshSettings,
}

impl SshOpener {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    /// Whether a key file is configured, so no password is needed
    pub fn uses_key_auth(&self) -> bool {
        self.settings.identity_file.is_some()
    }

    fn connect(&self, target: &str) -> reconcile::Result<Session> {
        let connect_error = |message: String| Error::Connect {
            host: target.to_string(),
            message,
        };

        let addr = resolve(target, self.settings.port).map_err(connect_error)?;
        let tcp = TcpStream::connect_timeout(&addr, self.settings.connect_timeout)
            .map_err(|e| connect_error(e.to_string()))?;

        let mut session = Session::new().map_err(|e| connect_error(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(timeout_millis(self.settings.connect_timeout));
        session
            .handshake()
            .map_err(|e| connect_error(format!("SSH handshake failed: {}", e.message())))?;

        self.verify_host_key(&session, target)
            .map_err(connect_error)?;
        Ok(session)
    }

    fn verify_host_key(&self, session: &Session, target: &str) -> Result<(), String> {
        let observed = session.host_key_hash(HashType::Sha256).map(fingerprint);
        let known = self.lookup_known_host(session, target);
        host_key_verdict(
            self.settings.host_key_fingerprint.as_deref(),
            observed.as_deref(),
            known,
            self.settings.accept_unknown_host_keys,
        )
    }

    fn lookup_known_host(&self, session: &Session, target: &str) -> KnownHost {
        let Some(path) = &self.settings.known_hosts else {
            return KnownHost::Unchecked;
        };
        let Some((key, _)) = session.host_key() else {
            return KnownHost::Unchecked;
        };
        let Ok(mut known_hosts) = session.known_hosts() else {
            return KnownHost::Unchecked;
        };
        if let Err(e) = known_hosts.read_file(path, KnownHostFileKind::OpenSSH) {
            log::debug!("Could not read {}: {}", path.display(), e.message());
            return KnownHost::NotFound;
        }
        known_hosts
            .check_port(target, self.settings.port, key)
            .into()
    }

    fn authenticate(&self, session: &Session, target: &str, credential: &Credential) -> reconcile::Result<()> {
        let user = credential.username.as_str();
        let result = if let Some(key) = &self.settings.identity_file {
            session.userauth_pubkey_file(user, None, key, credential.secret.as_deref())
        } else if let Some(password) = &credential.secret {
            session.userauth_password(user, password)
        } else {
            session.userauth_agent(user)
        };

        let auth_error = |message: String| Error::Auth {
            host: target.to_string(),
            message,
        };
        result.map_err(|e| auth_error(e.message().to_string()))?;
        if !session.authenticated() {
            return Err(auth_error(format!("server rejected credential for {user}")));
        }
        Ok(())
    }
}

impl SessionOpener for SshOpener {
    type Session = SshSession;

    fn open(&self, target: &str, credential: &Credential) -> reconcile::Result<SshSession> {
        log::info!(
            "Opening SSH session to {}@{target}:{}",
            credential.username,
            self.settings.port
        );
        let session = self.connect(target)?;
        self.authenticate(&session, target, credential)?;

        // Remote queries and the upgrade are not time-bounded.
        session.set_timeout(0);
        log::debug!("SSH session to {target} authenticated");

        Ok(SshSession {
            target: target.to_string(),
            settings: self.settings.clone(),
            session: Some(session),
        })
    }
}

/// An open SSH session to one cluster
pub struct SshSession {
    target: String,
    settings: SshSettings,
    session: Option<Session>,
}

impl SshSession {
    /// Run a PowerShell script on the remote host and return its stdout
    fn exec(&self, script: &str) -> Result<String, RemoteError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| RemoteError::Failed("session is closed".to_string()))?;
        log::trace!("Remote script:\n{script}");

        let mut channel = session.channel_session().map_err(ssh_error)?;
        channel
            .exec(&self.settings.command_line(script))
            .map_err(ssh_error)?;

        let mut stdout = String::new();
        channel.read_to_string(&mut stdout)?;
        let mut stderr = String::new();
        channel.stderr().read_to_string(&mut stderr)?;
        channel.wait_close().map_err(ssh_error)?;
        let status = channel.exit_status().map_err(ssh_error)?;

        if status == 0 {
            return Ok(stdout);
        }
        let message =
            last_line(&stderr).unwrap_or_else(|| format!("remote command exited with status {status}"));
        Err(RemoteError::Failed(message))
    }
}

impl RemoteSession for SshSession {
    fn target(&self) -> &str {
        &self.target
    }

    fn query_state(&mut self) -> Result<ClusterLevel, RemoteError> {
        let stdout = self.exec(&cluster::query_script(&self.target))?;
        cluster::parse_state(&stdout)
    }

    fn force_upgrade(&mut self) -> Result<(), RemoteError> {
        self.exec(&cluster::upgrade_script(&self.target)).map(|_| ())
    }

    fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Err(e) = session.disconnect(Some(DisconnectCode::ByApplication), "done", None) {
            log::debug!("SSH disconnect from {} failed: {}", self.target, e.message());
        }
        log::info!("Closed SSH session to {}", self.target);
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn resolve(target: &str, port: u16) -> Result<SocketAddr, String> {
    (target, port)
        .to_socket_addrs()
        .map_err(|e| format!("could not resolve host: {e}"))?
        .next()
        .ok_or_else(|| "host resolved to no addresses".to_string())
}

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX).max(1)
}

/// OpenSSH-style `SHA256:<base64>` fingerprint
fn fingerprint(hash: &[u8]) -> String {
    format!(
        "SHA256:{}",
        base64::engine::general_purpose::STANDARD_NO_PAD.encode(hash)
    )
}

/// Decide whether a server's host key is trusted.
///
/// A pinned fingerprint overrides `known_hosts`. Without a pin, the key
/// must match `known_hosts`; an unknown host is only accepted when
/// explicitly allowed, and a mismatch never is.
fn host_key_verdict(
    pinned: Option<&str>,
    observed: Option<&str>,
    known: KnownHost,
    accept_unknown: bool,
) -> Result<(), String> {
    if let Some(expected) = pinned {
        return match observed {
            Some(actual) if actual == expected => Ok(()),
            actual => Err(format!(
                "host key mismatch (expected {expected}, got {})",
                actual.unwrap_or("unknown")
            )),
        };
    }

    match known {
        KnownHost::Match => Ok(()),
        KnownHost::Mismatch => Err(format!(
            "host key does not match known_hosts (got {})",
            observed.unwrap_or("unknown")
        )),
        KnownHost::NotFound | KnownHost::Unchecked if accept_unknown => {
            log::warn!(
                "Accepting unverified host key {}",
                observed.unwrap_or("unknown")
            );
            Ok(())
        }
        KnownHost::NotFound | KnownHost::Unchecked => Err(format!(
            "host key {} is not in known_hosts",
            observed.unwrap_or("unknown")
        )),
    }
}

fn ssh_error(err: ssh2::Error) -> RemoteError {
    RemoteError::Io(err.into())
}

fn last_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn settings() -> SshSettings {
        SshSettings {
            port: 22,
            identity_file: None,
            connect_timeout: Duration::from_secs(5),
            shell: "powershell".into(),
            known_hosts: None,
            host_key_fingerprint: None,
            accept_unknown_host_keys: false,
        }
    }

    #[test]
    fn test_command_line_encodes_script() {
        assert_eq!(
            settings().command_line("dir"),
            "powershell -NoLogo -NoProfile -NonInteractive -EncodedCommand ZABpAHIA"
        );
    }

    #[test]
    fn test_fingerprint_format() {
        assert_eq!(fingerprint(&[0xde, 0xad, 0xbe, 0xef]), "SHA256:3q2+7w");
    }

    #[test]
    fn test_pinned_fingerprint_overrides_known_hosts() {
        let pin = Some("SHA256:abc");
        assert!(host_key_verdict(pin, Some("SHA256:abc"), KnownHost::NotFound, false).is_ok());

        let err = host_key_verdict(pin, Some("SHA256:xyz"), KnownHost::Match, true).unwrap_err();
        assert!(err.contains("expected SHA256:abc, got SHA256:xyz"));
        assert!(host_key_verdict(pin, None, KnownHost::Match, true).is_err());
    }

    #[test]
    fn test_known_hosts_decisions() {
        let key = Some("SHA256:abc");
        assert!(host_key_verdict(None, key, KnownHost::Match, false).is_ok());
        assert!(host_key_verdict(None, key, KnownHost::NotFound, false).is_err());
        assert!(host_key_verdict(None, key, KnownHost::Unchecked, false).is_err());
        assert!(host_key_verdict(None, key, KnownHost::NotFound, true).is_ok());
        assert!(host_key_verdict(None, key, KnownHost::Mismatch, true).is_err());
    }

    #[test]
    fn test_timeout_millis_is_never_zero() {
        assert_eq!(timeout_millis(Duration::from_secs(30)), 30_000);
        assert_eq!(timeout_millis(Duration::ZERO), 1);
    }

    #[test]
    fn test_last_line_skips_blank_lines() {
        assert_eq!(last_line("a\n b \n\n").as_deref(), Some("b"));
        assert_eq!(last_line("\n  \n"), None);
    }

    #[test]
    fn test_exec_on_closed_session_fails() {
        let session = SshSession {
            target: "cl01".into(),
            settings: settings(),
            session: None,
        };
        assert!(matches!(
            session.exec("Get-Cluster"),
            Err(RemoteError::Failed(_))
        ));
    }

    #[test]
    fn test_failed_handshake_is_connect_error_and_keeps_secret_in_process() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            // Not an SSH server: accept and hang up.
            let _ = listener.accept();
        });

        let secret = "s3cret-never-exported";
        let opener = SshOpener::new(SshSettings { port, ..settings() });
        let result = opener.open("127.0.0.1", &Credential::new("admin", Some(secret.into())));
        server.join().unwrap();

        assert!(matches!(result, Err(Error::Connect { .. })));
        assert!(std::env::vars_os().all(|(_, v)| v.to_string_lossy() != secret));
    }

    #[test]
    fn test_refused_connection_is_connect_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let opener = SshOpener::new(SshSettings { port, ..settings() });
        let err = opener
            .open("127.0.0.1", &Credential::new("admin", None))
            .err()
            .unwrap();
        assert!(err.is_transport());
        assert!(err.to_string().starts_with("could not connect to 127.0.0.1"));
    }
}
