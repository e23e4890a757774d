//! Agent-user credentials: generation and encrypted in-memory storage
//!
//! Entries live only as long as the process. Losing them means agents must
//! be re-provisioned; nothing else depends on them surviving a restart.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;

use super::cipher::{CipherError, CredentialCipher};

/// Random bytes behind a generated agent password
const PASSWORD_BYTES: usize = 32;

/// Email of the agent-user paired with `user_id`
pub fn agent_email(user_id: Uuid, domain: &str) -> String {
    format!("agent_{}@{}", user_id, domain)
}

/// Cryptographically secure URL-safe password
pub fn generate_password() -> String {
    let mut bytes = [0u8; PASSWORD_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decrypted agent credentials
#[derive(Clone)]
pub struct AgentCredentials {
    pub agent_user_id: Uuid,
    pub agent_email: String,
    pub password: String,
}

impl fmt::Debug for AgentCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentCredentials")
            .field("agent_user_id", &self.agent_user_id)
            .field("agent_email", &self.agent_email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
struct StoredCredentials {
    agent_user_id: Uuid,
    agent_email: String,
    encrypted_password: String,
}

/// `user_id -> agent credentials`, passwords sealed with the user ID as AAD
#[derive(Clone)]
pub struct AgentCredentialStore {
    cipher: CredentialCipher,
    entries: Arc<DashMap<Uuid, StoredCredentials>>,
}

impl AgentCredentialStore {
    pub fn new(cipher: CredentialCipher) -> Self {
        Self {
            cipher,
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn store(&self, user_id: Uuid, credentials: &AgentCredentials) -> Result<(), CipherError> {
        let encrypted_password = self
            .cipher
            .encrypt(&credentials.password, &user_id.to_string())?;
        self.entries.insert(
            user_id,
            StoredCredentials {
                agent_user_id: credentials.agent_user_id,
                agent_email: credentials.agent_email.clone(),
                encrypted_password,
            },
        );
        Ok(())
    }

    pub fn get(&self, user_id: Uuid) -> Result<Option<AgentCredentials>, CipherError> {
        let Some(stored) = self.entries.get(&user_id).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        let password = self
            .cipher
            .decrypt(&stored.encrypted_password, &user_id.to_string())?;
        Ok(Some(AgentCredentials {
            agent_user_id: stored.agent_user_id,
            agent_email: stored.agent_email,
            password,
        }))
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.entries.contains_key(&user_id)
    }
}
