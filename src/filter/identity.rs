//! Visitor identity carried in a long-lived cookie

use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use chrono::{DateTime, Duration, Utc};
use tracing::warn;
use uuid::Uuid;

pub const COOKIE_NAME: &str = "uaid";

/// Ten years
const COOKIE_LIFETIME_HOURS: i64 = 87_600;

/// Compact P3P policy; legacy IE only keeps third-party cookies that carry one
pub const P3P_POLICY: &str = "CP=\"CAO DSP COR CUR ADM DEV TAI PSA PSD IVAi IVDi CONi TELo OTPi OUR DELi SAMi OTRi UNRi PUBi IND PHY ONL UNI PUR FIN COM NAV INT DEM CNT STA POL HEA PRE GOV\"";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitorIdentity {
    /// Token read from the request cookie
    Returning(String),
    /// Token minted for a browser without the cookie
    New(String),
}

impl VisitorIdentity {
    /// Reuse the request's token, minting one only when the cookie is absent
    pub fn resolve(headers: &HeaderMap) -> Self {
        match cookie_value(headers, COOKIE_NAME) {
            Some(token) => Self::Returning(token.to_string()),
            None => Self::New(Uuid::new_v4().to_string()),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Self::Returning(token) | Self::New(token) => token,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }

    /// Headers issuing the cookie; empty for returning visitors
    pub fn response_headers(&self, domain: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let Self::New(token) = self else {
            return headers;
        };

        headers.insert("p3p", HeaderValue::from_static(P3P_POLICY));
        match HeaderValue::from_str(&set_cookie_value(token, domain, Utc::now())) {
            Ok(value) => {
                headers.insert(SET_COOKIE, value);
            }
            Err(err) => warn!(domain, error = %err, "cannot encode visitor cookie"),
        }
        headers
    }
}

/// `Set-Cookie` value for a visitor token issued at `now`
pub fn set_cookie_value(token: &str, domain: &str, now: DateTime<Utc>) -> String {
    let expires = now + Duration::hours(COOKIE_LIFETIME_HOURS);
    let mut cookie = format!("{COOKIE_NAME}={token}; Path=/");
    let domain = domain.trim_start_matches('.');
    if !domain.is_empty() {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    cookie.push_str("; Expires=");
    cookie.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
    cookie
}

/// First non-empty value of the named cookie across all `Cookie` headers
fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .find(|value| !value.is_empty())
}
