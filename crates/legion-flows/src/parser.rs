//! Flow document parsing (HCL and TOML), mirroring the labeled-block ->
//! map-keyed-by-name idiom: `flow "bugfix" { ... }` deserializes into a
//! `HashMap<String, RawFlow>` entry, then the map key is copied back onto
//! the value as its name.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("HCL parse error: {0}")]
    Hcl(#[from] hcl::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid format in {location}: {message}")]
    InvalidFormat { location: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Hcl,
    Toml,
}

impl Format {
    pub fn from_extension(path: &std::path::Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("hcl") => Some(Format::Hcl),
            Some("toml") => Some(Format::Toml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FlowFile {
    #[serde(default, alias = "flow")]
    flows: HashMap<String, RawFlow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawFlow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inherits: Option<String>,
    #[serde(default)]
    pub initial_stage: Option<String>,
    #[serde(default, alias = "stage")]
    pub stages: IndexMap<String, RawStage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStage {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub fail: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub workers: HashMap<String, Vec<String>>,
}

/// Parse a document that may declare zero or more named flows, returning
/// them keyed by name with the map key copied onto `RawFlow::name`.
pub fn parse_flows(content: &str, format: Format) -> Result<HashMap<String, RawFlow>, ParseError> {
    let mut file: FlowFile = match format {
        Format::Hcl => hcl::from_str(content)?,
        Format::Toml => toml::from_str(content)?,
    };
    for (name, flow) in &mut file.flows {
        flow.name = name.clone();
        if flow.stages.is_empty() {
            return Err(ParseError::InvalidFormat {
                location: format!("flow.{name}"),
                message: "flow must declare at least one stage".to_string(),
            });
        }
    }
    Ok(file.flows)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    const SAMPLE_HCL: &str = r#"
        flow "bugfix" {
          inherits = "_base"

          stage "in_progress" {
            next = "fixed"
            fail = "open"
            workers = { default = ["coder"] }
          }
        }
    "#;

    #[test]
    fn parses_a_single_flow_block_with_inherits() {
        let flows = parse_flows(SAMPLE_HCL, Format::Hcl).expect("parses");
        let bugfix = flows.get("bugfix").expect("present");
        assert_eq!(bugfix.name, "bugfix");
        assert_eq!(bugfix.inherits.as_deref(), Some("_base"));
        let stage = bugfix.stages.get("in_progress").expect("stage present");
        assert_eq!(stage.next.as_deref(), Some("fixed"));
        assert_eq!(stage.fail.as_deref(), Some("open"));
        assert_eq!(stage.workers.get("default").unwrap(), &vec!["coder".to_string()]);
    }

    #[test]
    fn rejects_a_flow_with_no_stages() {
        let empty = r#"flow "nothing" {}"#;
        let err = parse_flows(empty, Format::Hcl).unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat { .. }));
    }
}
