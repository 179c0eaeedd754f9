//! Script Generator
//!
//! Pure functions that turn a structured case definition into executable
//! script text for one of two target engines: a browser-flow script
//! (Playwright-style) or a load-test script (k6-style). Generation is
//! deterministic, performs no I/O, and never executes the script.

pub mod browser;
pub mod load;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::model::{CaseDefinition, EngineKind};

/// Derived artifact: script text plus the ordered dynamic values that were
/// substituted into template placeholders. Ephemeral; reproducible
/// byte-for-byte from the same definition and generator version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedScript {
    pub engine: EngineKind,
    #[serde(default)]
    pub case_id: Option<String>,
    pub text: String,
    pub substitutions: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Generate the script for a case definition, dispatching on the tagged
/// engine variant.
pub fn generate(definition: &CaseDefinition) -> EngineResult<GeneratedScript> {
    match definition {
        CaseDefinition::BrowserFlow(config) => browser::generate(config),
        CaseDefinition::LoadTest(config) => load::generate(config),
    }
}

/// File name the sandbox writes the script under, per engine convention.
pub fn script_file_name(engine: EngineKind) -> &'static str {
    match engine {
        EngineKind::BrowserFlow => "case.spec.ts",
        EngineKind::LoadTest => "script.js",
    }
}
