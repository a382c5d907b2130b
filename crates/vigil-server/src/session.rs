use axum::http::HeaderMap;
use uuid::Uuid;

use vigil_store::users::{UserRepo, UserRow};
use vigil_store::StoreError;

/// Header carrying the dashboard's opaque session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Resolve a request's session to a user, creating both transparently on
/// first contact. Returns the session id so the response can echo it back
/// for the dashboard to persist.
pub fn resolve_session(
    users: &UserRepo,
    headers: &HeaderMap,
) -> Result<(UserRow, String), StoreError> {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(new_session_id);

    let user = users.get_or_create(&session_id)?;
    Ok((user, session_id))
}

pub fn new_session_id() -> String {
    format!("sess_{}", Uuid::now_v7())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_store::Database;

    fn users() -> UserRepo {
        UserRepo::new(Database::in_memory().unwrap())
    }

    #[test]
    fn known_session_resolves_same_user() {
        let repo = users();
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, "sess-abc".parse().unwrap());

        let (first, sid1) = resolve_session(&repo, &headers).unwrap();
        let (second, sid2) = resolve_session(&repo, &headers).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(sid1, "sess-abc");
        assert_eq!(sid2, "sess-abc");
    }

    #[test]
    fn missing_header_creates_fresh_session() {
        let repo = users();
        let headers = HeaderMap::new();

        let (user_a, sid_a) = resolve_session(&repo, &headers).unwrap();
        let (user_b, sid_b) = resolve_session(&repo, &headers).unwrap();
        assert_ne!(user_a.id, user_b.id);
        assert_ne!(sid_a, sid_b);
        assert!(sid_a.starts_with("sess_"));
    }

    #[test]
    fn blank_header_treated_as_missing() {
        let repo = users();
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, "   ".parse().unwrap());

        let (_, sid) = resolve_session(&repo, &headers).unwrap();
        assert!(sid.starts_with("sess_"));
    }
}
