//! Member and user key material.
//!
//! Certificates are opaque byte blobs passed through unmodified as
//! proposal parameters. They are supplied by an injected provider rather
//! than read from the working directory.

use crate::governance::types::{MemberId, UserId};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Network certificate file name inside a credentials directory.
pub const NETWORK_CERT_FILE: &str = "networkcert.pem";

/// Credential errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("No credentials for {0}")]
    Missing(String),

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A consortium member as seen by the governance core.
#[derive(Clone)]
pub struct Member {
    pub id: MemberId,
    pub cert: Vec<u8>,
    private_key: Zeroizing<Vec<u8>>,
}

impl Member {
    pub fn new(id: MemberId, cert: Vec<u8>, private_key: Vec<u8>) -> Self {
        Self {
            id,
            cert,
            private_key: Zeroizing::new(private_key),
        }
    }

    /// Private signing key (zeroized on drop).
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("id", &self.id)
            .field("cert_len", &self.cert.len())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Source of member, user and network key material.
pub trait CredentialProvider: Send + Sync {
    fn member(&self, id: MemberId) -> Result<Member, CredentialError>;

    fn user_cert(&self, id: UserId) -> Result<Vec<u8>, CredentialError>;

    /// Certificate the service is expected to present once open.
    fn network_cert(&self) -> Result<Vec<u8>, CredentialError>;

    /// Load several members, preserving order.
    fn members(&self, ids: &[MemberId]) -> Result<Vec<Member>, CredentialError> {
        ids.iter().map(|id| self.member(*id)).collect()
    }
}

/// Reads `member{n}_cert.pem`, `member{n}_privk.pem`, `user{n}_cert.pem`
/// and `networkcert.pem` from an explicit directory.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    dir: PathBuf,
}

impl FileCredentials {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, CredentialError> {
        let path = self.dir.join(name);
        fs::read(&path).map_err(|source| CredentialError::Io { path, source })
    }
}

impl CredentialProvider for FileCredentials {
    fn member(&self, id: MemberId) -> Result<Member, CredentialError> {
        let cert = self.read(&format!("{}_cert.pem", id))?;
        let key = self.read(&format!("{}_privk.pem", id))?;
        Ok(Member::new(id, cert, key))
    }

    fn user_cert(&self, id: UserId) -> Result<Vec<u8>, CredentialError> {
        self.read(&format!("{}_cert.pem", id))
    }

    fn network_cert(&self) -> Result<Vec<u8>, CredentialError> {
        self.read(NETWORK_CERT_FILE)
    }
}

/// In-memory credentials.
#[derive(Default)]
pub struct StaticCredentials {
    members: HashMap<MemberId, Member>,
    users: HashMap<UserId, Vec<u8>>,
    network_cert: Option<Vec<u8>>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic placeholder credentials for `count` members numbered from 1.
    pub fn generated(count: u32, network_cert: &[u8]) -> Self {
        let mut creds = Self::new().with_network_cert(network_cert.to_vec());
        for n in 1..=count {
            let id = MemberId(n);
            creds = creds.with_member(Member::new(
                id,
                format!("-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n", id)
                    .into_bytes(),
                format!("{}-private-key", id).into_bytes(),
            ));
        }
        creds
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.insert(member.id, member);
        self
    }

    pub fn with_user(mut self, id: UserId, cert: Vec<u8>) -> Self {
        self.users.insert(id, cert);
        self
    }

    pub fn with_network_cert(mut self, cert: Vec<u8>) -> Self {
        self.network_cert = Some(cert);
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn member(&self, id: MemberId) -> Result<Member, CredentialError> {
        self.members
            .get(&id)
            .cloned()
            .ok_or_else(|| CredentialError::Missing(id.to_string()))
    }

    fn user_cert(&self, id: UserId) -> Result<Vec<u8>, CredentialError> {
        self.users
            .get(&id)
            .cloned()
            .ok_or_else(|| CredentialError::Missing(id.to_string()))
    }

    fn network_cert(&self) -> Result<Vec<u8>, CredentialError> {
        self.network_cert
            .clone()
            .ok_or_else(|| CredentialError::Missing(NETWORK_CERT_FILE.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_credentials_reads_member_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("member1_cert.pem"), b"cert-1").unwrap();
        fs::write(dir.path().join("member1_privk.pem"), b"key-1").unwrap();
        fs::write(dir.path().join("user0_cert.pem"), b"user-cert").unwrap();
        fs::write(dir.path().join(NETWORK_CERT_FILE), b"network").unwrap();

        let creds = FileCredentials::new(dir.path());
        let member = creds.member(MemberId(1)).unwrap();
        assert_eq!(member.id, MemberId(1));
        assert_eq!(member.cert, b"cert-1");
        assert_eq!(member.private_key(), b"key-1");
        assert_eq!(creds.user_cert(UserId(0)).unwrap(), b"user-cert");
        assert_eq!(creds.network_cert().unwrap(), b"network");
    }

    #[test]
    fn test_file_credentials_missing_file() {
        let dir = TempDir::new().unwrap();
        let creds = FileCredentials::new(dir.path());

        let err = creds.member(MemberId(3)).unwrap_err();
        match err {
            CredentialError::Io { path, .. } => {
                assert!(path.ends_with("member3_cert.pem"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_static_credentials_members_preserve_order() {
        let creds = StaticCredentials::generated(3, b"net");
        let members = creds
            .members(&[MemberId(3), MemberId(1), MemberId(2)])
            .unwrap();
        let ids: Vec<_> = members.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![MemberId(3), MemberId(1), MemberId(2)]);
        assert!(creds.member(MemberId(4)).is_err());
    }

    #[test]
    fn test_member_debug_redacts_key() {
        let member = Member::new(MemberId(1), b"cert".to_vec(), b"secret".to_vec());
        let debug = format!("{:?}", member);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret"));
    }
}
