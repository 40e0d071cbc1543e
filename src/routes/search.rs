use chrono::DateTime;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::{Responder, State, get};

use crate::error::RegistryError;
use crate::services::registry::{SearchResponse, UpdatesResponse};
use crate::state::AppState;

/// Relevance-ranked package search; without a query the whole catalog is
/// returned ordered by modification time
#[get("/search?<q>&<l>&<o>")]
pub fn search(
    q: Option<&str>,
    l: Option<usize>,
    o: Option<usize>,
    state: &State<AppState>,
) -> Result<Json<SearchResponse>, RegistryError> {
    Ok(Json(state.registry.search(q, l, o)?))
}

/// The raw `If-Modified-Since` header, if the client sent one
pub struct IfModifiedSince(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for IfModifiedSince {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(IfModifiedSince(
            request
                .headers()
                .get_one("If-Modified-Since")
                .map(str::to_string),
        ))
    }
}

#[derive(Responder)]
pub enum UpdatesReply {
    #[response(status = 200)]
    Updated(Json<UpdatesResponse>),
    #[response(status = 304)]
    NotModified(()),
}

/// Returns the packages added/updated/removed since the date in the
/// `If-Modified-Since` header, or 304 when nothing changed
#[get("/updates")]
pub fn updates(
    header: IfModifiedSince,
    state: &State<AppState>,
) -> Result<UpdatesReply, RegistryError> {
    let Some(raw) = header.0 else {
        return Ok(UpdatesReply::NotModified(()));
    };
    let since = DateTime::parse_from_rfc2822(&raw)
        .map_err(|_| RegistryError::Validation("Invalid 'if-modified-since' header".to_string()))?
        .naive_utc();

    match state.registry.updates_since(since)? {
        Some(response) => Ok(UpdatesReply::Updated(Json(response))),
        None => Ok(UpdatesReply::NotModified(())),
    }
}
