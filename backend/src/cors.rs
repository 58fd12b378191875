//! Origin access decisions and the middleware that applies them.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    /// Echo this exact origin back.
    AllowOrigin(String),
    Deny,
}

/// Decides whether `origin` may read the response.
///
/// Allow-list entries are exact origins, `*.suffix` patterns or a literal
/// `*`. Any match echoes the origin, `*` included. A missing origin is
/// never granted.
pub fn decide_origin(origin: &str, allowed: &[String]) -> OriginDecision {
    if origin.is_empty() {
        return OriginDecision::Deny;
    }

    let granted = allowed
        .iter()
        .any(|entry| entry == "*" || entry == origin || matches_suffix(origin, entry));
    if granted {
        OriginDecision::AllowOrigin(origin.to_string())
    } else {
        OriginDecision::Deny
    }
}

fn matches_suffix(origin: &str, entry: &str) -> bool {
    match entry.strip_prefix("*.") {
        Some(suffix) if !suffix.is_empty() => origin
            .strip_suffix(suffix)
            .is_some_and(|head| head.ends_with('.')),
        _ => false,
    }
}

/// [`CorsConfig`] with its static headers rendered once.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
    static_headers: HeaderMap,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        let mut static_headers = HeaderMap::new();

        let joined = [
            (header::ACCESS_CONTROL_ALLOW_METHODS, &config.allowed_methods),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, &config.allowed_headers),
            (header::ACCESS_CONTROL_EXPOSE_HEADERS, &config.exposed_headers),
        ];
        for (name, values) in joined {
            if values.is_empty() {
                continue;
            }
            match HeaderValue::from_str(&values.join(", ")) {
                Ok(value) => {
                    static_headers.insert(name, value);
                }
                Err(error) => tracing::warn!(header = %name, %error, "skipping invalid CORS header"),
            }
        }

        if config.allow_credentials {
            static_headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if config.max_age > 0 {
            static_headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(config.max_age));
        }

        Self {
            allowed_origins: config.allowed_origins.clone(),
            static_headers,
        }
    }

    pub fn decide(&self, origin: &str) -> OriginDecision {
        decide_origin(origin, &self.allowed_origins)
    }

    /// Whether a denied response would have differed for another origin.
    fn denial_varies(&self) -> bool {
        self.allowed_origins.iter().any(|entry| entry != "*")
    }

    fn apply(&self, origin: &str, headers: &mut HeaderMap) {
        let echoed = match self.decide(origin) {
            OriginDecision::AllowOrigin(origin) => match HeaderValue::from_str(&origin) {
                Ok(value) => {
                    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
                    true
                }
                Err(_) => false,
            },
            OriginDecision::Deny => false,
        };
        if echoed || self.denial_varies() {
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }

        for (name, value) in &self.static_headers {
            headers.insert(name.clone(), value.clone());
        }
    }
}

/// Sets CORS headers on every response and answers preflights directly.
pub async fn apply_cors(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    policy.apply(&origin, response.headers_mut());
    response
}
