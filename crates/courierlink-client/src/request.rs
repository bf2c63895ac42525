// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pure assembly of the outbound request.
//!
//! [`build_request`] is a single ordered pipeline over the declarative
//! config plus resolved auth material: header merge, forced content type,
//! query-string assembly, body encoding, intent augmentation. None of the
//! steps can fail — untrusted shapes degrade (a non-object form body encodes
//! to the empty string, a missing docket just skips augmentation) instead of
//! raising mid-workflow. The only blocking check is [`validate`], run before
//! dispatch.

use crate::auth::ResolvedAuth;
use crate::overrides::TrackingBody;
use crate::types::{HttpMethod, RequestConfig, TRACK_SHIPMENT_INTENT};
use serde_json::Value;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Fully assembled request, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<RequestBody>,
}

/// Serialized body form, matching the forced `Content-Type`.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(String),
}

/// Pre-flight configuration errors. Reported to the caller as blocking
/// before anything is dispatched; everything downstream degrades instead.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Request URL is required")]
    MissingUrl,
    #[error("Request URL must be an absolute http(s) URL: '{url}'")]
    InvalidUrl { url: String },
    #[error("A test docket is required for the '{intent}' intent")]
    MissingDocket { intent: String },
}

/// Validate a request configuration before dispatch.
pub fn validate(config: &RequestConfig) -> Result<(), ValidationError> {
    if config.url.trim().is_empty() {
        return Err(ValidationError::MissingUrl);
    }
    match url::Url::parse(&config.url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        _ => {
            return Err(ValidationError::InvalidUrl {
                url: config.url.clone(),
            });
        }
    }
    if config.api_intent == TRACK_SHIPMENT_INTENT
        && config.test_docket.as_deref().unwrap_or("").trim().is_empty()
    {
        return Err(ValidationError::MissingDocket {
            intent: config.api_intent.clone(),
        });
    }
    Ok(())
}

/// Policy guard: the proxy's execution environment cannot reach private
/// networks, so loopback/private/link-local targets are rejected before
/// dispatch. This is a dispatch-boundary policy, not part of the pure
/// builder, so the core stays testable against local mock servers.
pub fn is_private_host(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    match parsed.host() {
        Some(url::Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost") || domain.ends_with(".local")
        }
        Some(url::Host::Ipv4(ip)) => is_private_ipv4(ip),
        Some(url::Host::Ipv6(ip)) => is_private_ipv6(ip),
        None => false,
    }
}

fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_private_ipv6(ip: Ipv6Addr) -> bool {
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique-local, fe80::/10 link-local
        || (ip.segments()[0] & 0xfe00) == 0xfc00
        || (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// Assemble the complete outbound request. Pure; see module docs for the
/// ordered pipeline.
pub fn build_request(
    config: &RequestConfig,
    auth: &ResolvedAuth,
    tracking_body: &TrackingBody,
) -> PreparedRequest {
    // 1. Custom headers, later duplicates win; then auth headers overwrite on
    //    collision — they carry freshly resolved credentials.
    let mut headers: HashMap<String, String> = HashMap::new();
    for kv in &config.headers {
        headers.insert(kv.key.clone(), kv.value.clone());
    }
    for (name, value) in &auth.headers {
        headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        headers.insert(name.clone(), value.clone());
    }

    // 2. Content type is forced last: the adapter serializes the body itself
    //    and needs a predictable encoding.
    let content_type = if config.is_form_url_encoded {
        "application/x-www-form-urlencoded"
    } else {
        "application/json"
    };
    headers.retain(|k, _| !k.eq_ignore_ascii_case("content-type"));
    headers.insert("Content-Type".to_string(), content_type.to_string());

    // 3. Query parameters: declared ones, then auth-contributed ones, then
    //    intent augmentation for GET tracking calls.
    let mut query: Vec<(String, String)> = config
        .query_params
        .iter()
        .map(|kv| (kv.key.clone(), kv.value.clone()))
        .collect();
    query.extend(auth.query_params.iter().cloned());

    let docket = config.test_docket.as_deref().unwrap_or("");
    let is_tracking = config.api_intent == TRACK_SHIPMENT_INTENT && !docket.is_empty();
    if is_tracking
        && config.method == HttpMethod::Get
        && !config.url.contains("trackingNumber=")
        && !query.iter().any(|(k, _)| k == "trackingNumber")
    {
        query.push(("trackingNumber".to_string(), docket.to_string()));
    }

    let url = append_query(&config.url, &query);

    // 4–5. Body for body-bearing methods, with tracking augmentation merged
    //      before encoding.
    let body = if config.method.is_body_bearing() {
        let mut value = config.body.clone();
        if is_tracking {
            merge_tracking_body(&mut value, docket, tracking_body);
        }
        if config.is_form_url_encoded {
            Some(RequestBody::Form(form_encode(&value)))
        } else {
            Some(RequestBody::Json(value))
        }
    } else {
        None
    };

    PreparedRequest {
        method: config.method,
        url,
        headers,
        body,
    }
}

fn append_query(url: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let encoded: Vec<String> = query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{}", encoded.join("&"))
}

fn merge_tracking_body(body: &mut Value, docket: &str, shape: &TrackingBody) {
    // Non-object, non-null bodies are left untouched; there is nothing
    // meaningful to merge into.
    if body.is_null() {
        *body = Value::Object(serde_json::Map::new());
    }
    let Some(map) = body.as_object_mut() else {
        return;
    };
    match shape {
        TrackingBody::Standard => {
            map.insert("docNo".to_string(), Value::String(docket.to_string()));
            map.insert(
                "trackingNumber".to_string(),
                Value::String(docket.to_string()),
            );
        }
        TrackingBody::DocNoWithType { doc_type } => {
            map.insert("docNo".to_string(), Value::String(docket.to_string()));
            map.insert("docType".to_string(), Value::String(doc_type.clone()));
        }
    }
}

/// `key=value&...` with stringified values. A non-object body produces the
/// empty string — documented degrade, not an error.
fn form_encode(body: &Value) -> String {
    let Some(map) = body.as_object() else {
        return String::new();
    };
    map.iter()
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}={}", urlencoding::encode(k), urlencoding::encode(&text))
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ResolvedAuth;
    use crate::types::KeyValue;
    use serde_json::json;

    fn config(url: &str) -> RequestConfig {
        RequestConfig {
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn validate_requires_absolute_http_url() {
        assert_eq!(validate(&config("")), Err(ValidationError::MissingUrl));
        assert_eq!(
            validate(&config("not a url")),
            Err(ValidationError::InvalidUrl {
                url: "not a url".into()
            })
        );
        assert_eq!(
            validate(&config("ftp://example.com")),
            Err(ValidationError::InvalidUrl {
                url: "ftp://example.com".into()
            })
        );
        assert!(validate(&config("https://api.example.com/track")).is_ok());
    }

    #[test]
    fn validate_requires_docket_for_tracking_intent() {
        let mut cfg = config("https://api.example.com/track");
        cfg.api_intent = TRACK_SHIPMENT_INTENT.to_string();
        assert_eq!(
            validate(&cfg),
            Err(ValidationError::MissingDocket {
                intent: TRACK_SHIPMENT_INTENT.into()
            })
        );
        cfg.test_docket = Some("ABC123".into());
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn private_host_policy() {
        assert!(is_private_host("http://localhost:3000/x"));
        assert!(is_private_host("http://127.0.0.1/x"));
        assert!(is_private_host("http://10.1.2.3/x"));
        assert!(is_private_host("http://192.168.0.4/x"));
        assert!(is_private_host("http://172.20.0.1/x"));
        assert!(is_private_host("http://[::1]/x"));
        assert!(!is_private_host("https://api.example.com/x"));
        assert!(!is_private_host("https://8.8.8.8/x"));
    }

    #[test]
    fn auth_headers_win_header_collisions() {
        let mut cfg = config("https://api.example.com/x");
        cfg.headers = vec![
            KeyValue::new("Authorization", "stale"),
            KeyValue::new("X-Trace", "a"),
            KeyValue::new("X-Trace", "b"),
        ];
        let auth = ResolvedAuth {
            headers: vec![("Authorization".to_string(), "Bearer fresh".to_string())],
            ..Default::default()
        };
        let prepared = build_request(&cfg, &auth, &TrackingBody::Standard);
        assert_eq!(
            prepared.headers.get("Authorization").map(String::as_str),
            Some("Bearer fresh")
        );
        // later duplicate wins
        assert_eq!(prepared.headers.get("X-Trace").map(String::as_str), Some("b"));
    }

    #[test]
    fn content_type_is_forced_last() {
        let mut cfg = config("https://api.example.com/x");
        cfg.headers = vec![KeyValue::new("content-type", "text/xml")];
        let prepared = build_request(&cfg, &ResolvedAuth::default(), &TrackingBody::Standard);
        assert_eq!(
            prepared.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert!(!prepared.headers.contains_key("content-type"));

        cfg.is_form_url_encoded = true;
        let prepared = build_request(&cfg, &ResolvedAuth::default(), &TrackingBody::Standard);
        assert_eq!(
            prepared.headers.get("Content-Type").map(String::as_str),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn query_separator_depends_on_existing_query() {
        let mut cfg = config("https://api.example.com/x");
        cfg.query_params = vec![KeyValue::new("a", "1")];
        let prepared = build_request(&cfg, &ResolvedAuth::default(), &TrackingBody::Standard);
        assert_eq!(prepared.url, "https://api.example.com/x?a=1");

        cfg.url = "https://api.example.com/x?b=2".to_string();
        let prepared = build_request(&cfg, &ResolvedAuth::default(), &TrackingBody::Standard);
        assert_eq!(prepared.url, "https://api.example.com/x?b=2&a=1");
    }

    #[test]
    fn deferred_api_key_query_param_lands_in_url() {
        let cfg = config("https://api.example.com/x");
        let auth = ResolvedAuth {
            query_params: vec![("api_token".to_string(), "k2".to_string())],
            ..Default::default()
        };
        let prepared = build_request(&cfg, &auth, &TrackingBody::Standard);
        assert_eq!(prepared.url, "https://api.example.com/x?api_token=k2");
    }

    #[test]
    fn tracking_get_appends_docket_once() {
        let mut cfg = config("https://api.example.com/track");
        cfg.api_intent = TRACK_SHIPMENT_INTENT.to_string();
        cfg.test_docket = Some("ABC123".into());
        let prepared = build_request(&cfg, &ResolvedAuth::default(), &TrackingBody::Standard);
        assert!(prepared.url.ends_with("?trackingNumber=ABC123"));

        cfg.url = "https://api.example.com/track?mode=live".to_string();
        let prepared = build_request(&cfg, &ResolvedAuth::default(), &TrackingBody::Standard);
        assert!(prepared.url.ends_with("&trackingNumber=ABC123"));

        // already present in the URL: leave it alone
        cfg.url = "https://api.example.com/track?trackingNumber=XYZ".to_string();
        let prepared = build_request(&cfg, &ResolvedAuth::default(), &TrackingBody::Standard);
        assert_eq!(prepared.url, "https://api.example.com/track?trackingNumber=XYZ");
    }

    #[test]
    fn tracking_body_merge_standard_and_override() {
        let mut cfg = config("https://api.example.com/track");
        cfg.method = HttpMethod::Post;
        cfg.api_intent = TRACK_SHIPMENT_INTENT.to_string();
        cfg.test_docket = Some("ABC123".into());
        cfg.body = json!({"channel": "web"});

        let prepared = build_request(&cfg, &ResolvedAuth::default(), &TrackingBody::Standard);
        assert_eq!(
            prepared.body,
            Some(RequestBody::Json(json!({
                "channel": "web",
                "docNo": "ABC123",
                "trackingNumber": "ABC123"
            })))
        );

        let prepared = build_request(
            &cfg,
            &ResolvedAuth::default(),
            &TrackingBody::DocNoWithType {
                doc_type: "WB".into(),
            },
        );
        assert_eq!(
            prepared.body,
            Some(RequestBody::Json(json!({
                "channel": "web",
                "docNo": "ABC123",
                "docType": "WB"
            })))
        );
    }

    #[test]
    fn tracking_body_merge_starts_from_null() {
        let mut cfg = config("https://api.example.com/track");
        cfg.method = HttpMethod::Post;
        cfg.api_intent = TRACK_SHIPMENT_INTENT.to_string();
        cfg.test_docket = Some("D1".into());
        let prepared = build_request(&cfg, &ResolvedAuth::default(), &TrackingBody::Standard);
        assert_eq!(
            prepared.body,
            Some(RequestBody::Json(
                json!({"docNo": "D1", "trackingNumber": "D1"})
            ))
        );
    }

    #[test]
    fn json_body_passes_through() {
        let mut cfg = config("https://api.example.com/x");
        cfg.method = HttpMethod::Post;
        cfg.body = json!({"a": 1});
        let prepared = build_request(&cfg, &ResolvedAuth::default(), &TrackingBody::Standard);
        let Some(RequestBody::Json(body)) = prepared.body else {
            panic!("expected a JSON body");
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn form_encoding_stringifies_values() {
        let mut cfg = config("https://api.example.com/x");
        cfg.method = HttpMethod::Post;
        cfg.is_form_url_encoded = true;
        cfg.body = json!({"docket": "AB 12", "count": 3, "live": true});
        let prepared = build_request(&cfg, &ResolvedAuth::default(), &TrackingBody::Standard);
        let Some(RequestBody::Form(encoded)) = prepared.body else {
            panic!("expected a form body");
        };
        assert!(encoded.contains("docket=AB%2012"));
        assert!(encoded.contains("count=3"));
        assert!(encoded.contains("live=true"));
    }

    #[test]
    fn form_encoding_non_object_degrades_to_empty() {
        let mut cfg = config("https://api.example.com/x");
        cfg.method = HttpMethod::Post;
        cfg.is_form_url_encoded = true;
        cfg.body = json!("just a string");
        let prepared = build_request(&cfg, &ResolvedAuth::default(), &TrackingBody::Standard);
        assert_eq!(prepared.body, Some(RequestBody::Form(String::new())));
    }

    #[test]
    fn get_requests_carry_no_body() {
        let mut cfg = config("https://api.example.com/x");
        cfg.body = json!({"ignored": true});
        let prepared = build_request(&cfg, &ResolvedAuth::default(), &TrackingBody::Standard);
        assert_eq!(prepared.body, None);
    }
}
