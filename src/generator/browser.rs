//! Playwright-style browser-flow script generation.
//!
//! Steps and assertions come straight from the authoring side; the
//! generator substitutes `{{variable}}` placeholders against the flow's
//! environment, injects auth headers into request steps, and records every
//! substituted dynamic value in order.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use regex::Regex;

use crate::error::{EngineError, EngineResult};
use crate::model::{
    Assertion, AssertionKind, AuthConfig, BrowserFlowConfig, EngineKind, Operator, StepAction,
};

use super::GeneratedScript;

pub fn generate(config: &BrowserFlowConfig) -> EngineResult<GeneratedScript> {
    if config.steps.is_empty() {
        return Err(EngineError::InvalidConfiguration(
            "browser flow requires at least one step".to_string(),
        ));
    }

    let placeholder = Regex::new(r"\{\{(\w+)\}\}")
        .map_err(|e| EngineError::InvalidConfiguration(e.to_string()))?;
    let mut substitutions = Vec::new();
    let mut substitute = |input: &str| -> String {
        placeholder
            .replace_all(input, |caps: &regex::Captures| {
                match config.env.get(&caps[1]) {
                    Some(value) => {
                        substitutions.push(value.clone());
                        value.clone()
                    }
                    // Unknown placeholders are left intact for the caller to spot
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    };

    let (auth_headers, auth_query) = auth_parts(config.auth.as_ref());

    let needs_json = config.steps.iter().any(|step| {
        step.assertions
            .iter()
            .any(|a| a.kind == AssertionKind::JsonPath)
    });

    let mut body = String::new();
    for step in &config.steps {
        body.push_str(&format!("  // {}\n", step.name));
        match &step.action {
            StepAction::Goto { url } => {
                let url = resolve_url(&substitute(url), config.base_url.as_deref());
                body.push_str(&format!("  await page.goto({});\n", quote(&url)));
            }
            StepAction::Click { selector } => {
                body.push_str(&format!("  await page.click({});\n", quote(selector)));
            }
            StepAction::Fill { selector, value } => {
                let value = substitute(value);
                body.push_str(&format!(
                    "  await page.fill({}, {});\n",
                    quote(selector),
                    quote(&value)
                ));
            }
            StepAction::Request {
                method,
                url,
                headers,
                body: request_body,
            } => {
                let mut url = resolve_url(&substitute(url), config.base_url.as_deref());
                if !auth_query.is_empty() {
                    let joiner = if url.contains('?') { '&' } else { '?' };
                    let pairs: Vec<String> = auth_query
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect();
                    url = format!("{}{}{}", url, joiner, pairs.join("&"));
                }

                let mut merged: BTreeMap<String, String> = headers
                    .iter()
                    .map(|(k, v)| (k.clone(), substitute(v)))
                    .collect();
                for (k, v) in &auth_headers {
                    merged.insert(k.clone(), v.clone());
                }

                let mut options = Vec::new();
                if !merged.is_empty() {
                    let rendered: Vec<String> = merged
                        .iter()
                        .map(|(k, v)| format!("      {}: {}", quote(k), quote(v)))
                        .collect();
                    options.push(format!("    headers: {{\n{}\n    }}", rendered.join(",\n")));
                }
                if let Some(data) = request_body {
                    options.push(format!("    data: {}", data));
                }
                let options = if options.is_empty() {
                    String::new()
                } else {
                    format!(", {{\n{}\n  }}", options.join(",\n"))
                };

                body.push_str("  t0 = Date.now();\n");
                body.push_str(&format!(
                    "  response = await request.{}({}{});\n",
                    method.to_lowercase(),
                    quote(&url),
                    options
                ));
                body.push_str("  responseTime = Date.now() - t0;\n");
                if needs_json {
                    body.push_str("  data = await response.json();\n");
                }
            }
        }
        for assertion in &step.assertions {
            body.push_str(&render_assertion(assertion));
        }
        body.push('\n');
    }

    let mut text = String::from("import { test, expect } from '@playwright/test';\n\n");
    text.push_str(&format!(
        "test({}, async ({{ page, request }}) => {{\n",
        quote(&config.name)
    ));
    text.push_str("  let response;\n  let responseTime = 0;\n  let t0 = 0;\n");
    if needs_json {
        text.push_str("  let data;\n");
    }
    text.push('\n');
    text.push_str(&body);
    text.push_str("});\n");

    Ok(GeneratedScript {
        engine: EngineKind::BrowserFlow,
        case_id: None,
        text,
        substitutions,
        generated_at: Utc::now(),
    })
}

fn resolve_url(url: &str, base: Option<&str>) -> String {
    match base {
        Some(base) if url.starts_with('/') => format!("{}{}", base.trim_end_matches('/'), url),
        _ => url.to_string(),
    }
}

/// Auth config -> (headers, query pairs) to inject into request steps
fn auth_parts(auth: Option<&AuthConfig>) -> (BTreeMap<String, String>, Vec<(String, String)>) {
    let mut headers = BTreeMap::new();
    let mut query = Vec::new();
    match auth {
        None => {}
        Some(AuthConfig::Bearer { token }) => {
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }
        Some(AuthConfig::Basic { username, password }) => {
            let credentials = BASE64.encode(format!("{}:{}", username, password));
            headers.insert("Authorization".to_string(), format!("Basic {}", credentials));
        }
        Some(AuthConfig::ApiKey {
            key_name,
            key_value,
            in_query,
        }) => {
            if *in_query {
                query.push((key_name.clone(), key_value.clone()));
            } else {
                headers.insert(key_name.clone(), key_value.clone());
            }
        }
    }
    (headers, query)
}

fn matcher(operator: Operator) -> &'static str {
    match operator {
        Operator::Equals => "toBe",
        Operator::NotEquals => "not.toBe",
        Operator::Contains => "toContain",
        Operator::NotContains => "not.toContain",
        Operator::GreaterThan => "toBeGreaterThan",
        Operator::LessThan => "toBeLessThan",
        Operator::MatchesRegex => "toMatch",
        Operator::Exists => "toBeDefined",
        Operator::NotExists => "toBeUndefined",
    }
}

fn render_assertion(assertion: &Assertion) -> String {
    let expected = assertion.expected.as_deref().unwrap_or_default();
    match assertion.kind {
        AssertionKind::StatusCode => {
            format!("  expect(response.status()).toBe({});\n", expected)
        }
        AssertionKind::ResponseTime => {
            format!("  expect(responseTime).toBeLessThan({});\n", expected)
        }
        AssertionKind::JsonPath => {
            let field = assertion.field.as_deref().unwrap_or_default();
            match assertion.operator {
                Operator::Exists => format!("  expect(data.{}).toBeDefined();\n", field),
                Operator::NotExists => format!("  expect(data.{}).toBeUndefined();\n", field),
                op => format!(
                    "  expect(data.{}).{}({});\n",
                    field,
                    matcher(op),
                    quote(expected)
                ),
            }
        }
        AssertionKind::HeaderValue => {
            let field = assertion.field.as_deref().unwrap_or_default();
            format!(
                "  expect(response.headers()[{}]).{}({});\n",
                quote(field),
                matcher(assertion.operator),
                quote(expected)
            )
        }
        AssertionKind::Visible => {
            let selector = assertion.field.as_deref().unwrap_or(expected);
            format!(
                "  await expect(page.locator({})).toBeVisible();\n",
                quote(selector)
            )
        }
    }
}

/// JSON string quoting doubles as JS string quoting
fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}
