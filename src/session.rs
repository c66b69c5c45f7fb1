//! In-memory browser sessions keyed by the `PORTAL_SESSION` cookie.

// crates.io
use axum::http::{HeaderMap, header::COOKIE};
use cookie::{Cookie, SameSite};
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	oidc::{AuthorizationRequest, OidcUser},
};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "PORTAL_SESSION";

const SESSION_ID_LEN: usize = 48;

/// Opaque session identifier carried by the cookie.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);
impl SessionId {
	fn generate() -> Self {
		Self(rand::rng().sample_iter(Alphanumeric).take(SESSION_ID_LEN).map(char::from).collect())
	}

	/// Raw cookie value.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Debug for SessionId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("SessionId(<redacted>)")
	}
}

/// State tracked for one browser.
#[derive(Clone, Debug)]
pub struct Session {
	/// Authenticated principal, once a login completed.
	pub principal: Option<OidcUser>,
	/// Login waiting for its callback.
	pub pending: Option<AuthorizationRequest>,
	last_seen: OffsetDateTime,
}
impl Session {
	/// Empty session seen at `now`.
	pub fn new(now: OffsetDateTime) -> Self {
		Self { principal: None, pending: None, last_seen: now }
	}

	/// When the session was last used.
	pub fn last_seen(&self) -> OffsetDateTime {
		self.last_seen
	}
}

/// Process-local session store with idle expiry.
#[derive(Clone)]
pub struct SessionStore {
	sessions: Arc<RwLock<HashMap<String, Session>>>,
	idle_timeout: Duration,
}
impl SessionStore {
	/// Idle time after which a session is forgotten unless overridden.
	pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::minutes(30);

	/// Creates an empty store.
	pub fn new(idle_timeout: Duration) -> Self {
		Self { sessions: Default::default(), idle_timeout }
	}

	/// Stores `session` under a fresh identifier.
	pub fn insert(&self, session: Session) -> SessionId {
		let id = SessionId::generate();

		self.sessions.write().insert(id.0.clone(), session);

		id
	}

	/// Returns a live session and refreshes its idle timer; expired sessions are dropped.
	pub fn get(&self, id: &str) -> Option<Session> {
		self.update(id, |session| session.clone())
	}

	/// Mutates a live session in place.
	pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
		let now = OffsetDateTime::now_utc();
		let mut sessions = self.sessions.write();
		let session = sessions.get_mut(id)?;

		if now - session.last_seen > self.idle_timeout {
			sessions.remove(id);

			return None;
		}

		session.last_seen = now;

		Some(f(session))
	}

	/// Forgets a session.
	pub fn remove(&self, id: &str) -> Option<Session> {
		self.sessions.write().remove(id)
	}

	/// Moves a live session to a fresh identifier so a pre-login cookie cannot be replayed.
	pub fn rotate(&self, id: &str) -> Option<SessionId> {
		let session = self.get(id)?;

		self.remove(id);

		Some(self.insert(session))
	}

	/// Drops every idle session; returns how many were removed.
	pub fn purge_expired(&self) -> usize {
		let now = OffsetDateTime::now_utc();
		let mut sessions = self.sessions.write();
		let before = sessions.len();

		sessions.retain(|_, session| now - session.last_seen <= self.idle_timeout);

		before - sessions.len()
	}

	/// Number of stored sessions, expired ones included until purged.
	pub fn len(&self) -> usize {
		self.sessions.read().len()
	}

	/// Whether the store is empty.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// `Set-Cookie` value binding the browser to `id`.
	pub fn cookie(&self, id: &SessionId, secure: bool) -> Cookie<'static> {
		Cookie::build((SESSION_COOKIE, id.0.clone()))
			.path("/")
			.http_only(true)
			.same_site(SameSite::Lax)
			.secure(secure)
			.max_age(self.idle_timeout)
			.build()
	}

	/// `Set-Cookie` value that clears the session cookie.
	pub fn removal_cookie(secure: bool) -> Cookie<'static> {
		Cookie::build((SESSION_COOKIE, ""))
			.path("/")
			.http_only(true)
			.same_site(SameSite::Lax)
			.secure(secure)
			.max_age(Duration::ZERO)
			.build()
	}

	/// Session identifier sent by the browser, if any.
	pub fn session_id(headers: &HeaderMap) -> Option<String> {
		headers
			.get_all(COOKIE)
			.iter()
			.filter_map(|value| value.to_str().ok())
			.flat_map(Cookie::split_parse)
			.filter_map(|cookie| cookie.ok())
			.find(|cookie| cookie.name() == SESSION_COOKIE && !cookie.value().is_empty())
			.map(|cookie| cookie.value().to_owned())
	}
}
impl Default for SessionStore {
	fn default() -> Self {
		Self::new(Self::DEFAULT_IDLE_TIMEOUT)
	}
}
impl Debug for SessionStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionStore")
			.field("sessions", &self.len())
			.field("idle_timeout", &self.idle_timeout)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn sessions_round_trip_and_rotate() {
		let store = SessionStore::default();
		let id = store.insert(Session::new(OffsetDateTime::now_utc()));

		assert!(store.get(id.as_str()).is_some());

		let rotated = store.rotate(id.as_str()).expect("Live sessions should rotate.");

		assert_ne!(rotated, id);
		assert!(store.get(id.as_str()).is_none());
		assert!(store.get(rotated.as_str()).is_some());
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn idle_sessions_expire() {
		let store = SessionStore::new(Duration::minutes(5));
		let stale = store.insert(Session::new(OffsetDateTime::now_utc() - Duration::minutes(6)));
		let fresh = store.insert(Session::new(OffsetDateTime::now_utc()));

		assert_eq!(store.purge_expired(), 1);
		assert!(store.get(fresh.as_str()).is_some());

		let again = store.insert(Session::new(OffsetDateTime::now_utc() - Duration::minutes(6)));

		assert!(store.get(again.as_str()).is_none());
		assert!(store.get(stale.as_str()).is_none());
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn cookies_are_http_only_and_parsed_back() {
		let store = SessionStore::default();
		let id = store.insert(Session::new(OffsetDateTime::now_utc()));
		let set_cookie = store.cookie(&id, true).to_string();

		assert!(set_cookie.starts_with("PORTAL_SESSION="));
		assert!(set_cookie.contains("HttpOnly"));
		assert!(set_cookie.contains("Secure"));
		assert!(set_cookie.contains("SameSite=Lax"));

		let mut headers = HeaderMap::new();

		headers.insert(
			COOKIE,
			format!("theme=dark; {SESSION_COOKIE}={}", id.as_str())
				.parse()
				.expect("Cookie header should be valid."),
		);

		assert_eq!(SessionStore::session_id(&headers).as_deref(), Some(id.as_str()));
		assert!(SessionStore::removal_cookie(false).to_string().contains("Max-Age=0"));
		assert!(!format!("{id:?}").contains(id.as_str()));
	}
}
