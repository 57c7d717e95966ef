use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};

use crate::models::{Caller, Role};

// Identity is verified by the gateway in front of us and forwarded as headers
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, (StatusCode, String)> {
    let user_id = header(headers, USER_ID_HEADER)
        .ok_or((StatusCode::UNAUTHORIZED, "missing caller identity".to_string()))?
        .trim()
        .parse::<i64>()
        .map_err(|_| (StatusCode::UNAUTHORIZED, "malformed caller identity".to_string()))?;

    let role = header(headers, USER_ROLE_HEADER)
        .ok_or((StatusCode::UNAUTHORIZED, "missing caller role".to_string()))?
        .parse::<Role>()
        .map_err(|_| (StatusCode::FORBIDDEN, "unknown caller role".to_string()))?;

    Ok(Caller { user_id, role })
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers)
    }
}
