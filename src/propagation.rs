//! Bridges well-known identity and tracing values between a
//! [`RequestContext`] and HTTP header fields.
//!
//! Both directions iterate the same closed key set ([`WellKnownKey::ALL`]),
//! so a value never crosses the bridge under a key outside that set.

use std::collections::HashMap;

use reqwest::header::HeaderMap;

use crate::RequestContext;

/// Identity/tracing keys propagated between contexts and headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WellKnownKey {
    UserId,
    TenantId,
    RequestId,
    ApiKey,
    ApiContextKey,
    Authorization,
    ForwardedFor,
}

impl WellKnownKey {
    pub const ALL: [WellKnownKey; 7] = [
        WellKnownKey::UserId,
        WellKnownKey::TenantId,
        WellKnownKey::RequestId,
        WellKnownKey::ApiKey,
        WellKnownKey::ApiContextKey,
        WellKnownKey::Authorization,
        WellKnownKey::ForwardedFor,
    ];

    /// Canonical header field name for the key.
    pub const fn header_name(self) -> &'static str {
        match self {
            WellKnownKey::UserId => "user-id",
            WellKnownKey::TenantId => "tenant-id",
            WellKnownKey::RequestId => "x-request-id",
            WellKnownKey::ApiKey => "x-api-key",
            WellKnownKey::ApiContextKey => "apikey",
            WellKnownKey::Authorization => "Authorization",
            WellKnownKey::ForwardedFor => "X-Forwarded-For",
        }
    }
}

/// Collects every non-empty well-known value visible in `ctx`, keyed by
/// canonical header name.
pub fn extract_from_context(ctx: &RequestContext) -> HashMap<String, String> {
    WellKnownKey::ALL
        .iter()
        .filter_map(|key| {
            ctx.value(*key)
                .filter(|value| !value.is_empty())
                .map(|value| (key.header_name().to_owned(), value.to_owned()))
        })
        .collect()
}

/// Layers every non-empty well-known header from `headers` on top of `ctx`.
///
/// Values are decoded as UTF-8, so non-ASCII text such as `José` crosses
/// the bridge. Values that are not valid UTF-8 are skipped, like empty ones.
pub fn inject_into_context(ctx: &RequestContext, headers: &HeaderMap) -> RequestContext {
    WellKnownKey::ALL.iter().fold(ctx.clone(), |acc, key| {
        match headers
            .get(key.header_name())
            .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
            .filter(|value| !value.is_empty())
        {
            Some(value) => acc.with_value(*key, value),
            None => acc,
        }
    })
}
