use axum::{extract::Request, middleware::Next, response::Response};
use axum_session::{Key, Session, SessionConfig, SessionError, SessionNullPool, SessionStore};
use sha2::{Digest, Sha512};
use uuid::Uuid;

/// Session key under which the per-client identifier is stored.
pub const SESSION_ID_KEY: &str = "session_id";

pub type SessionType = Session<SessionNullPool>;
pub type SessionStoreType = SessionStore<SessionNullPool>;

/// Builds the in-process session store. The cookie key is stretched to the
/// required 64 bytes from the configured secret, so secrets of any length work.
pub async fn create_session_store(secret_key: &str) -> Result<SessionStoreType, SessionError> {
    let digest = Sha512::digest(secret_key.as_bytes());
    let config = SessionConfig::default()
        .with_table_name("pdf_qa_sessions")
        .with_key(Key::from(digest.as_slice()));

    SessionStore::new(None, config).await
}

/// Assigns a session identifier to any request that does not carry one yet,
/// before the handler runs. Identifier generation cannot fail.
pub async fn ensure_session_id(session: SessionType, request: Request, next: Next) -> Response {
    if session.get::<String>(SESSION_ID_KEY).is_none() {
        session.set(SESSION_ID_KEY, Uuid::new_v4().to_string());
    }

    next.run(request).await
}

pub fn current_session_id(session: &SessionType) -> Option<String> {
    session.get(SESSION_ID_KEY)
}
