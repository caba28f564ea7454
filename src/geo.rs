use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use std::convert::Infallible;

use crate::{config::AppConfig, country::normalize_country};

/// Name of the cookie carrying the requester's two-letter country code.
pub const COUNTRY_COOKIE: &str = "user-country";

/// UserCountry Extractor Result
///
/// The country every public lookup is filtered by. Read from the `user-country` cookie,
/// falling back to `DEFAULT_COUNTRY` when the cookie is absent or malformed. Never rejects.
#[derive(Debug, Clone, PartialEq)]
pub struct UserCountry(pub String);

impl UserCountry {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Finds `name` in a raw `Cookie` header (`a=1; b=2`).
fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value.trim())
    })
}

impl<S> FromRequestParts<S> for UserCountry
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let from_cookie = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|raw| cookie_value(raw, COUNTRY_COOKIE))
            .and_then(normalize_country)
            .filter(|code| code != crate::country::ALL_COUNTRIES);

        let country = match from_cookie {
            Some(code) => code,
            None => AppConfig::from_ref(state).default_country,
        };
        Ok(UserCountry(country))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(cookie: Option<&str>) -> UserCountry {
        let mut builder = Request::builder().uri("/");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        let config = AppConfig::default();
        UserCountry::from_request_parts(&mut parts, &config).await.unwrap()
    }

    #[tokio::test]
    async fn reads_and_normalizes_cookie() {
        assert_eq!(extract(Some("theme=dark; user-country=us")).await.as_str(), "US");
    }

    #[tokio::test]
    async fn falls_back_to_default_country() {
        assert_eq!(extract(None).await.as_str(), "IN");
        assert_eq!(extract(Some("user-country=usa")).await.as_str(), "IN");
        assert_eq!(extract(Some("user-country=ALL")).await.as_str(), "IN");
    }
}
