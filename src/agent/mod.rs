//! Agent-users: a second Supabase account per user that runs tools under
//! its own RLS-scoped session

pub mod cipher;
pub mod credentials;
pub mod service;
pub mod tools;

pub use cipher::{CipherError, CredentialCipher};
pub use credentials::AgentCredentialStore;
pub use service::{AgentError, AgentService, AgentSession};
