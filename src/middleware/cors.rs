use axum::{
    body::Body,
    extract::State,
    http::{
        header::{self, HeaderValue},
        Method, Request, Response, StatusCode,
    },
    middleware::Next,
};
use tracing::debug;

use crate::{app::AppState, app_config::AppConfig};

/// Origin to echo back, if any. A `*` entry reflects any origin outside production
/// so credentialed requests keep working.
pub fn allowed_origin(config: &AppConfig, origin: Option<&str>) -> Option<HeaderValue> {
    let origin = origin?;
    let has_wildcard = config.cors_allowed_origins.iter().any(|o| o == "*");

    let allowed = if has_wildcard && !config.is_production() {
        debug!("CORS: Reflecting origin for staging/dev: {}", origin);
        true
    } else {
        let listed = config.cors_allowed_origins.iter().any(|o| o == origin);
        debug!("CORS: Origin {} in whitelist: {}", origin, listed);
        listed
    };

    if allowed {
        HeaderValue::from_str(origin).ok()
    } else {
        None
    }
}

/// Dynamic CORS middleware that handles wildcard for staging/development
/// while properly supporting credentials
pub async fn dynamic_cors_middleware(
    State(app_state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response<Body>, StatusCode> {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    let allowed = allowed_origin(&app_state.config, origin);

    // Handle preflight OPTIONS requests
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());

        if let Some(allowed) = allowed {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(
                    "content-type, authorization, accept, origin, x-requested-with",
                ),
            );
            headers.insert(
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static("3600"),
            );
        }

        *response.status_mut() = StatusCode::OK;
        return Ok(response);
    }

    let mut response = next.run(req).await;

    if let Some(allowed) = allowed {
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::tests::{load, required_vars};

    #[test]
    fn test_wildcard_reflects_outside_production() {
        let config = load(&required_vars()).unwrap();
        assert_eq!(
            allowed_origin(&config, Some("https://app.example.com")),
            Some(HeaderValue::from_static("https://app.example.com"))
        );
        assert_eq!(allowed_origin(&config, None), None);
    }

    #[test]
    fn test_whitelist_in_production() {
        let mut vars = required_vars();
        vars.insert("ENVIRONMENT", "production");
        vars.insert("AUTH_SECRET", "0123456789abcdef0123456789abcdef");
        vars.insert("CORS_ALLOWED_ORIGINS", "https://app.example.com");
        let config = load(&vars).unwrap();

        assert!(allowed_origin(&config, Some("https://app.example.com")).is_some());
        assert!(allowed_origin(&config, Some("https://evil.example.com")).is_none());
    }
}
