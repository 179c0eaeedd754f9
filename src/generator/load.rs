//! k6-style load-test script generation.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::error::{EngineError, EngineResult};
use crate::model::{EngineKind, LoadTestConfig};

use super::GeneratedScript;

/// Default threshold pair applied when the caller specifies none:
/// 95th-percentile latency under 500ms, failure rate under 1%.
pub const DEFAULT_LATENCY_THRESHOLD: &str = "p(95)<500";
pub const DEFAULT_FAILURE_RATE_THRESHOLD: &str = "rate<0.01";

pub fn default_thresholds() -> BTreeMap<String, Vec<String>> {
    let mut thresholds = BTreeMap::new();
    thresholds.insert(
        "http_req_duration".to_string(),
        vec![DEFAULT_LATENCY_THRESHOLD.to_string()],
    );
    thresholds.insert(
        "http_req_failed".to_string(),
        vec![DEFAULT_FAILURE_RATE_THRESHOLD.to_string()],
    );
    thresholds
}

/// Generate a k6 script. The generator validates structural placeholder
/// substitution only; URL and duration-token semantics are the caller's
/// responsibility.
pub fn generate(config: &LoadTestConfig) -> EngineResult<GeneratedScript> {
    if config.target_url.is_empty() {
        return Err(EngineError::InvalidConfiguration(
            "load test requires a targetUrl".to_string(),
        ));
    }
    if config.virtual_users == 0 {
        return Err(EngineError::InvalidConfiguration(
            "virtualUsers must be at least 1".to_string(),
        ));
    }
    if config.duration.trim().is_empty() {
        return Err(EngineError::InvalidConfiguration(
            "load test requires a duration".to_string(),
        ));
    }

    let thresholds = config
        .thresholds
        .clone()
        .unwrap_or_else(default_thresholds);
    // BTreeMap keeps threshold order stable so output is reproducible
    let thresholds_json = serde_json::to_string_pretty(&thresholds)
        .map_err(|e| EngineError::InvalidConfiguration(e.to_string()))?;

    let text = format!(
        r#"import http from 'k6/http';
import {{ check, sleep }} from 'k6';

export const options = {{
  vus: {vus},
  duration: '{duration}',
  thresholds: {thresholds},
}};

export default function () {{
  const res = http.get('{url}');

  check(res, {{
    'status is 200': (r) => r.status === 200,
  }});

  sleep(1);
}}
"#,
        vus = config.virtual_users,
        duration = config.duration,
        thresholds = thresholds_json,
        url = config.target_url,
    );

    Ok(GeneratedScript {
        engine: EngineKind::LoadTest,
        case_id: None,
        text,
        substitutions: vec![
            config.virtual_users.to_string(),
            config.duration.clone(),
            config.target_url.clone(),
        ],
        generated_at: Utc::now(),
    })
}
