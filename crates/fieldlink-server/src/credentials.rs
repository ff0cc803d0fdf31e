//! Credential file authenticator.
//!
//! The file is a JSON array of users whose passwords are stored as argon2 PHC
//! strings:
//!
//! ```json
//! [{"login_id": "alice", "password_hash": "$argon2id$v=19$...", "organization_uid": "org-7"}]
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use serde::Deserialize;

use fieldlink_protocol::handshake::{AuthenticatedUser, Authenticator, LoginAttempt};
use fieldlink_protocol::ProtocolError;

#[derive(Debug, Deserialize)]
struct UserEntry {
    login_id: String,
    password_hash: String,
    #[serde(default)]
    organization_uid: Option<String>,
}

/// Users loaded from a credential file, keyed by login id.
#[derive(Debug, Default)]
pub struct CredentialFile {
    users: HashMap<String, UserEntry>,
}

impl CredentialFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read credential file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid credential file {}", path.display()))
    }

    fn parse(raw: &str) -> anyhow::Result<Self> {
        let entries: Vec<UserEntry> = serde_json::from_str(raw)?;
        let mut users = HashMap::with_capacity(entries.len());
        for entry in entries {
            PasswordHash::new(&entry.password_hash).map_err(|e| {
                anyhow::anyhow!("password hash for {:?} is not a PHC string: {e}", entry.login_id)
            })?;
            if users.contains_key(&entry.login_id) {
                anyhow::bail!("duplicate login id {:?}", entry.login_id);
            }
            users.insert(entry.login_id.clone(), entry);
        }
        Ok(Self { users })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Verified in place of a real hash when the login id is unknown, so both
/// paths cost one argon2 run with the default parameters.
const DECOY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$ZmllbGRsaW5rLWRlY295IQ$AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

fn verify(password: &str, phc: &str) -> Result<bool, ProtocolError> {
    let hash = PasswordHash::new(phc)
        .map_err(|e| ProtocolError::Store(format!("stored password hash unreadable: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok())
}

impl Authenticator for CredentialFile {
    fn authenticate(&self, attempt: &LoginAttempt) -> Result<Option<AuthenticatedUser>, ProtocolError> {
        let Some(entry) = self.users.get(&attempt.login_id) else {
            verify(&attempt.password, DECOY_HASH)?;
            return Ok(None);
        };

        if !verify(&attempt.password, &entry.password_hash)? {
            return Ok(None);
        }

        // A user bound to an organization may only log into that one.
        if let (Some(bound), Some(requested)) = (&entry.organization_uid, &attempt.organization_uid) {
            if bound != requested {
                return Ok(None);
            }
        }

        Ok(Some(AuthenticatedUser {
            user_id: entry.login_id.clone(),
            organization_uid: attempt
                .organization_uid
                .clone()
                .or_else(|| entry.organization_uid.clone()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::{PasswordHasher, SaltString};
    use argon2::{Algorithm, Params, Version};
    use std::io::Write;

    /// Cheap parameters; the PHC string carries them to verification.
    fn hash(password: &str) -> String {
        let params = Params::new(256, 1, 1, None).unwrap();
        let hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let salt = SaltString::generate(&mut OsRng);
        hasher
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string()
    }

    fn attempt(login_id: &str, password: &str, org: Option<&str>) -> LoginAttempt {
        LoginAttempt {
            login_id: login_id.into(),
            password: password.to_string().into(),
            organization_uid: org.map(Into::into),
        }
    }

    fn users_json() -> String {
        serde_json::json!([
            {"login_id": "alice", "password_hash": hash("secret123")},
            {"login_id": "bob", "password_hash": hash("pw"), "organization_uid": "org-7"},
        ])
        .to_string()
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(users_json().as_bytes()).unwrap();
        let creds = CredentialFile::load(file.path()).unwrap();
        assert_eq!(creds.len(), 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(CredentialFile::load(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn rejects_plaintext_and_duplicates() {
        assert!(CredentialFile::parse(r#"[{"login_id":"a","password_hash":"plain"}]"#).is_err());
        let h = hash("x");
        let dup = serde_json::json!([
            {"login_id": "a", "password_hash": h},
            {"login_id": "a", "password_hash": h},
        ]);
        assert!(CredentialFile::parse(&dup.to_string()).is_err());
    }

    #[test]
    fn authenticate_checks_password() {
        let creds = CredentialFile::parse(&users_json()).unwrap();
        let user = creds
            .authenticate(&attempt("alice", "secret123", None))
            .unwrap()
            .unwrap();
        assert_eq!(user.user_id, "alice");
        assert!(creds.authenticate(&attempt("alice", "nope", None)).unwrap().is_none());
        assert!(creds.authenticate(&attempt("carol", "secret123", None)).unwrap().is_none());
    }

    #[test]
    fn decoy_hash_is_verifiable_and_matches_nothing() {
        assert!(PasswordHash::new(DECOY_HASH).is_ok());
        assert!(!verify("secret123", DECOY_HASH).unwrap());
        assert!(!verify("", DECOY_HASH).unwrap());
    }

    #[test]
    fn unknown_login_id_still_runs_argon2() {
        let creds = CredentialFile::parse(&users_json()).unwrap();
        let started = std::time::Instant::now();
        assert!(creds.authenticate(&attempt("carol", "pw", None)).unwrap().is_none());
        let unknown = started.elapsed();

        let started = std::time::Instant::now();
        verify("pw", DECOY_HASH).unwrap();
        let decoy = started.elapsed();

        // Same work either way, allowing for scheduler noise.
        assert!(unknown * 4 >= decoy, "unknown={unknown:?} decoy={decoy:?}");
    }

    #[test]
    fn organization_binding() {
        let creds = CredentialFile::parse(&users_json()).unwrap();
        let user = creds.authenticate(&attempt("bob", "pw", None)).unwrap().unwrap();
        assert_eq!(user.organization_uid.as_deref(), Some("org-7"));
        assert!(creds
            .authenticate(&attempt("bob", "pw", Some("org-7")))
            .unwrap()
            .is_some());
        assert!(creds
            .authenticate(&attempt("bob", "pw", Some("org-8")))
            .unwrap()
            .is_none());
    }
}
