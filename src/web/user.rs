//! `GET /user`: the current principal as JSON.

// crates.io
use axum::{Extension, Json};
use serde_json::{Value, json};
// self
use crate::web::guard::CurrentUser;

/// Returns the principal's claims, or `{"authenticated": false}` for anonymous requests.
pub async fn current_user(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<Value> {
	let Some(user) = user else {
		return Json(json!({ "authenticated": false }));
	};
	let name = user.display_name().to_owned();

	Json(json!({
		"authenticated": true,
		"subject": user.subject,
		"name": name,
		"claims": user.claims,
	}))
}
