// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compiles persisted field mappings into a standalone JavaScript adapter
//! module.
//!
//! The emitted module is plain source text, downloadable from the console and
//! executed by a downstream system that knows nothing about this codebase. It
//! exports one object keyed by intent, holding an `is_success` predicate, one
//! optional-chained accessor per mapped field, a `timestamp` closure, and —
//! for couriers whose auth scheme needs a token round trip — an
//! `acquire_token` closure with an expiry guard.
//!
//! Accessors are generated from the same path grammar that field discovery
//! uses ([`courierlink_fields::parse_path`]), so a path surfaced by discovery
//! always compiles to a working accessor.

use courierlink_fields::{PathSegment, parse_path};
use courierlink_store::{Courier, FieldMapping};
use serde_json::Value;
use std::fmt::Write as _;

/// Knobs for the emitted module.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Path into the payload checked by the `is_success` predicate.
    pub success_path: String,
    /// Value the success indicator must equal.
    pub success_value: Value,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            success_path: "status".to_string(),
            success_value: Value::String("success".to_string()),
        }
    }
}

/// Lowercased, underscore-separated identifier derived from a courier name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_separator = true;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            slug.push('_');
            last_was_separator = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("courier");
    }
    slug
}

/// Download filename for a courier's adapter module.
pub fn module_filename(courier: &Courier) -> String {
    format!("{}_mapping.js", slugify(&courier.name))
}

fn is_js_ident(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Optional-chained accessor expression for a field path, rooted at `root`.
///
/// `shipment.tracking[0].status` becomes
/// `payload?.shipment?.tracking?.[0]?.status`; keys that are not valid
/// identifiers fall back to bracket access.
pub fn accessor_expr(root: &str, path: &str) -> String {
    let mut expr = root.to_string();
    for segment in parse_path(path) {
        match segment {
            PathSegment::Key(key) if is_js_ident(&key) => {
                expr.push_str("?.");
                expr.push_str(&key);
            }
            PathSegment::Key(key) => {
                expr.push_str("?.[");
                expr.push_str(&js_string(&key));
                expr.push(']');
            }
            PathSegment::Index(index) => {
                let _ = write!(expr, "?.[{index}]");
            }
        }
    }
    expr
}

fn object_key(key: &str) -> String {
    if is_js_ident(key) {
        key.to_string()
    } else {
        js_string(key)
    }
}

fn needs_token_refresh(courier: &Courier) -> bool {
    courier.auth_type.as_deref() == Some("jwt_auth")
        || courier
            .auth_endpoint
            .as_deref()
            .is_some_and(|endpoint| !endpoint.is_empty())
}

fn emit_token_refresh(out: &mut String, courier: &Courier) {
    let endpoint = courier.auth_endpoint.as_deref().unwrap_or_default();
    let token_path = courier.token_path.as_deref().unwrap_or("access_token");

    let mut body = serde_json::Map::new();
    if let Some(username) = &courier.username {
        body.insert("username".to_string(), Value::String(username.clone()));
    }
    if let Some(password) = &courier.password {
        body.insert("password".to_string(), Value::String(password.clone()));
    }
    if let Some(api_key) = &courier.api_key {
        body.insert("apiKey".to_string(), Value::String(api_key.clone()));
    }
    let body = Value::Object(body);

    out.push_str("    acquire_token: async () => {\n");
    let _ = writeln!(out, "      const response = await fetch({}, {{", js_string(endpoint));
    out.push_str("        method: \"POST\",\n");
    out.push_str("        headers: { \"Content-Type\": \"application/json\" },\n");
    let _ = writeln!(out, "        body: JSON.stringify({body}),");
    out.push_str("      });\n");
    out.push_str("      const data = await response.json();\n");
    let _ = writeln!(out, "      const token = {};", accessor_expr("data", token_path));
    out.push_str("      if (typeof token !== \"string\" || token.length === 0) {\n");
    let _ = writeln!(
        out,
        "        throw new Error({});",
        js_string(&format!("token not found at {token_path}"))
    );
    out.push_str("      }\n");
    out.push_str("      return token;\n");
    out.push_str("    },\n");
    out.push_str("    is_token_expired: (error) =>\n");
    out.push_str(
        "      error?.status === 401 || TOKEN_EXPIRED.test(String(error?.message ?? \"\")),\n",
    );
}

/// Compile a courier's field mappings into adapter-module source text.
///
/// Mappings with an empty `tms_field` are discovery leftovers and are
/// skipped.
pub fn compile(courier: &Courier, mappings: &[FieldMapping], options: &CompileOptions) -> String {
    let slug = slugify(&courier.name);
    let intent = courier
        .api_intent
        .as_deref()
        .filter(|intent| !intent.is_empty())
        .unwrap_or("track_shipment");
    let with_refresh = needs_token_refresh(courier);

    let mut out = String::new();
    let _ = writeln!(out, "// Adapter module for {}.", courier.name);
    out.push_str("// Each field accessor takes the raw tracking payload and returns the\n");
    out.push_str("// mapped value, or undefined when the path is absent.\n\n");
    if with_refresh {
        out.push_str("const TOKEN_EXPIRED = /unauthorized|token expired/i;\n\n");
    }

    let _ = writeln!(out, "export const {slug} = {{");
    let _ = writeln!(out, "  {}: {{", object_key(intent));
    let _ = writeln!(
        out,
        "    is_success: (payload) => {} === {},",
        accessor_expr("payload", &options.success_path),
        options.success_value
    );
    out.push_str("    fields: {\n");
    for mapping in mappings {
        if mapping.tms_field.is_empty() {
            continue;
        }
        let _ = writeln!(
            out,
            "      {}: (payload) => {},",
            object_key(&mapping.tms_field),
            accessor_expr("payload", &mapping.api_field)
        );
    }
    out.push_str("    },\n");
    out.push_str("    timestamp: () => new Date().toISOString(),\n");
    if with_refresh {
        emit_token_refresh(&mut out, courier);
    }
    out.push_str("  },\n");
    out.push_str("};\n\n");
    let _ = writeln!(out, "export default {slug};");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(api_field: &str, tms_field: &str) -> FieldMapping {
        FieldMapping {
            id: "m1".into(),
            courier_id: "c1".into(),
            api_field: api_field.into(),
            tms_field: tms_field.into(),
            api_type: Some("track_shipment".into()),
        }
    }

    fn courier(name: &str) -> Courier {
        Courier {
            id: "c1".into(),
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn accessor_matches_optional_chaining_grammar() {
        assert_eq!(
            accessor_expr("payload", "shipment.tracking[0].status"),
            "payload?.shipment?.tracking?.[0]?.status"
        );
        // Bare brackets mean "first element".
        assert_eq!(
            accessor_expr("payload", "shipment.tracking[].status"),
            "payload?.shipment?.tracking?.[0]?.status"
        );
        assert_eq!(
            accessor_expr("payload", "data.line-items[2]"),
            "payload?.data?.[\"line-items\"]?.[2]"
        );
    }

    #[test]
    fn module_contains_accessor_and_predicate() {
        let source = compile(
            &courier("DTDC"),
            &[mapping("shipment.tracking[0].status", "l2_status")],
            &CompileOptions::default(),
        );
        assert!(source.contains("export const dtdc = {"));
        assert!(source.contains("track_shipment: {"));
        assert!(source.contains("is_success: (payload) => payload?.status === \"success\","));
        assert!(
            source.contains("l2_status: (payload) => payload?.shipment?.tracking?.[0]?.status,")
        );
        assert!(source.contains("timestamp: () => new Date().toISOString(),"));
        assert!(!source.contains("acquire_token"));
    }

    #[test]
    fn unmapped_fields_are_skipped() {
        let source = compile(
            &courier("DTDC"),
            &[
                mapping("shipment.result", ""),
                mapping("shipment.eta", "expected_delivery"),
            ],
            &CompileOptions::default(),
        );
        assert!(!source.contains("shipment?.result"));
        assert!(source.contains("expected_delivery: (payload) => payload?.shipment?.eta,"));
    }

    #[test]
    fn jwt_courier_gets_token_refresh() {
        let courier = Courier {
            id: "c1".into(),
            name: "DTDC".into(),
            auth_type: Some("jwt_auth".into()),
            auth_endpoint: Some("https://auth.dtdc.example.com/login".into()),
            username: Some("ops".into()),
            password: Some("secret".into()),
            token_path: Some("data.token".into()),
            ..Default::default()
        };
        let source = compile(&courier, &[], &CompileOptions::default());
        assert!(source.contains("const TOKEN_EXPIRED = /unauthorized|token expired/i;"));
        assert!(
            source.contains("const response = await fetch(\"https://auth.dtdc.example.com/login\", {")
        );
        assert!(source.contains("const token = data?.data?.token;"));
        assert!(source.contains("throw new Error(\"token not found at data.token\");"));
        assert!(source.contains("is_token_expired: (error) =>"));
        assert!(source.contains("error?.status === 401"));
    }

    #[test]
    fn legacy_auth_endpoint_also_triggers_refresh() {
        let courier = Courier {
            id: "c1".into(),
            name: "Gati".into(),
            auth_endpoint: Some("https://auth.gati.example.com/token".into()),
            ..Default::default()
        };
        let source = compile(&courier, &[], &CompileOptions::default());
        assert!(source.contains("acquire_token"));
        // Default token path applies when the record carries none.
        assert!(source.contains("const token = data?.access_token;"));
    }

    #[test]
    fn filenames_are_slugged() {
        assert_eq!(module_filename(&courier("Blue Dart Express")), "blue_dart_express_mapping.js");
        assert_eq!(module_filename(&courier("DTDC")), "dtdc_mapping.js");
        assert_eq!(module_filename(&courier("  ")), "courier_mapping.js");
        assert_eq!(slugify("Safe-Xpress (India)"), "safe_xpress_india");
    }

    #[test]
    fn custom_success_convention() {
        let options = CompileOptions {
            success_path: "meta.code".into(),
            success_value: json!(0),
        };
        let source = compile(&courier("DTDC"), &[], &options);
        assert!(source.contains("is_success: (payload) => payload?.meta?.code === 0,"));
    }

    #[test]
    fn non_identifier_intent_and_field_names_are_quoted() {
        let mut record = courier("DTDC");
        record.api_intent = Some("track-shipment".into());
        let source = compile(&record, &[mapping("a.b", "l2-status")], &CompileOptions::default());
        assert!(source.contains("\"track-shipment\": {"));
        assert!(source.contains("\"l2-status\": (payload) => payload?.a?.b,"));
    }
}
