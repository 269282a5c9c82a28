//! Flow registry: built-in `_base` flow, file-tree loading, and the
//! depth-first inheritance merge that the teacher's pipeline loader never
//! needed but this kernel's task flows require.

use crate::parser::{parse_flows, Format, ParseError, RawFlow, RawStage};
use crate::stage::{Flow, Requirement, Stage};
use crate::validate::{validate_flow, ValidationError};
use indexmap::IndexMap;
use legion_core::AgentClass;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validate(#[from] ValidationError),
    #[error("flow {0} not found")]
    NotFound(String),
    #[error("inheritance cycle detected involving {0}")]
    InheritanceCycle(String),
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

const BASE_FLOW_NAME: &str = "_base";

/// Holds raw (unmerged) flow documents and resolves them on demand.
#[derive(Debug, Default, Clone)]
pub struct FlowRegistry {
    raw: HashMap<String, RawFlow>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            raw: HashMap::new(),
        };
        reg.raw.insert(BASE_FLOW_NAME.to_string(), base_flow_raw());
        reg
    }

    /// Load every `.hcl`/`.toml` file directly under `dir` (non-recursive,
    /// matching how the teacher's runbook search path works), merging
    /// declarations into the registry. Missing directories are not an
    /// error: a daemon must boot with an empty `DOCS_DIR`.
    pub fn load_dir(&mut self, dir: &Path) -> Result<(), LoadError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(LoadError::Io {
                    path: dir.display().to_string(),
                    source: e,
                })
            }
        };
        for entry in entries {
            let entry = entry.map_err(|e| LoadError::Io {
                path: dir.display().to_string(),
                source: e,
            })?;
            let path = entry.path();
            let Some(format) = Format::from_extension(&path) else {
                continue;
            };
            let content = std::fs::read_to_string(&path).map_err(|e| LoadError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            let flows = parse_flows(&content, format)?;
            self.raw.extend(flows);
        }
        Ok(())
    }

    pub fn insert_raw(&mut self, flow: RawFlow) {
        self.raw.insert(flow.name.clone(), flow);
    }

    /// Resolve a flow by name: merge it depth-first with its ancestor
    /// chain (child stages override same-named parent stages), then
    /// validate the merged result.
    pub fn resolve(&self, name: &str) -> Result<Flow, LoadError> {
        let (merged, initial_stage) = self.merge_chain(name, &mut Vec::new())?;
        let flow = build_flow(name, merged, initial_stage)?;
        validate_flow(&flow)?;
        Ok(flow)
    }

    /// Merges depth-first, returning the stage map plus whichever
    /// ancestor (closest first) declared an `initial_stage`.
    fn merge_chain(
        &self,
        name: &str,
        visiting: &mut Vec<String>,
    ) -> Result<(IndexMap<String, RawStage>, Option<String>), LoadError> {
        if visiting.iter().any(|v| v == name) {
            return Err(LoadError::InheritanceCycle(name.to_string()));
        }
        visiting.push(name.to_string());
        let raw = self
            .raw
            .get(name)
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;

        let (mut merged, parent_initial) = match &raw.inherits {
            Some(parent) => self.merge_chain(parent, visiting)?,
            None => (IndexMap::new(), None),
        };
        for (stage_name, stage) in &raw.stages {
            merged.insert(stage_name.clone(), stage.clone());
        }
        visiting.pop();
        let initial_stage = raw.initial_stage.clone().or(parent_initial);
        Ok((merged, initial_stage))
    }

    pub fn names(&self) -> Vec<String> {
        self.raw.keys().cloned().collect()
    }
}

fn build_flow(
    name: &str,
    stages: IndexMap<String, RawStage>,
    declared_initial: Option<String>,
) -> Result<Flow, LoadError> {
    let mut resolved = IndexMap::new();
    for (stage_name, raw) in &stages {
        let requires = raw
            .requires
            .iter()
            .map(|r| match r.as_str() {
                "submit_result" => Ok(Requirement::SubmitResult),
                other => Err(LoadError::Validate(ValidationError::UnknownRequirement {
                    flow: name.to_string(),
                    stage: stage_name.clone(),
                    requirement: other.to_string(),
                })),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut workers = IndexMap::new();
        for (bucket, classes) in &raw.workers {
            let parsed = classes
                .iter()
                .map(|c| {
                    AgentClass::parse(c).ok_or_else(|| {
                        LoadError::Validate(ValidationError::UnknownClass {
                            flow: name.to_string(),
                            stage: stage_name.clone(),
                            class: c.clone(),
                        })
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            workers.insert(bucket.clone(), parsed);
        }

        resolved.insert(
            stage_name.clone(),
            Stage {
                name: stage_name.clone(),
                next: raw.next.clone(),
                fail: raw.fail.clone(),
                requires,
                workers,
            },
        );
    }

    // Prefer the declared `initial_stage` (the flow's own, or else the
    // nearest ancestor's that set one), falling back to the first stage
    // still present after merging when nothing declares one explicitly.
    let initial_stage = declared_initial
        .filter(|s| resolved.contains_key(s))
        .or_else(|| resolved.keys().next().cloned())
        .ok_or_else(|| LoadError::NotFound(format!("{name} (no stages)")))?;

    Ok(Flow {
        name: name.to_string(),
        initial_stage,
        stages: resolved,
    })
}

/// The compiled-in fallback flow: `open -> assigned -> in_progress ->
/// fixed -> verified -> closed`, used when no contract document overrides
/// it. Matches the teacher's "workspace folder is always a safe default"
/// philosophy — a daemon with an empty DOCS_DIR still has a working flow.
fn base_flow_raw() -> RawFlow {
    let mut stages = IndexMap::new();
    stages.insert(
        "open".to_string(),
        RawStage {
            next: Some("assigned".to_string()),
            fail: None,
            requires: vec![],
            workers: HashMap::from([("default".to_string(), vec!["lead".to_string()])]),
        },
    );
    stages.insert(
        "assigned".to_string(),
        RawStage {
            next: Some("in_progress".to_string()),
            fail: Some("open".to_string()),
            requires: vec![],
            workers: HashMap::from([(
                "default".to_string(),
                vec![
                    "coder".to_string(),
                    "builder".to_string(),
                    "auditor".to_string(),
                ],
            )]),
        },
    );
    stages.insert(
        "in_progress".to_string(),
        RawStage {
            next: Some("fixed".to_string()),
            fail: Some("open".to_string()),
            requires: vec![],
            workers: HashMap::from([(
                "default".to_string(),
                vec![
                    "coder".to_string(),
                    "builder".to_string(),
                    "auditor".to_string(),
                ],
            )]),
        },
    );
    stages.insert(
        "fixed".to_string(),
        RawStage {
            next: Some("verified".to_string()),
            fail: Some("in_progress".to_string()),
            requires: vec!["submit_result".to_string()],
            workers: HashMap::from([("default".to_string(), vec!["oracle".to_string()])]),
        },
    );
    stages.insert(
        "verified".to_string(),
        RawStage {
            next: Some("closed".to_string()),
            fail: Some("in_progress".to_string()),
            requires: vec![],
            workers: HashMap::from([("default".to_string(), vec!["lead".to_string()])]),
        },
    );
    stages.insert(
        "closed".to_string(),
        RawStage {
            next: None,
            fail: None,
            requires: vec![],
            workers: HashMap::from([("default".to_string(), vec!["lead".to_string()])]),
        },
    );
    RawFlow {
        name: BASE_FLOW_NAME.to_string(),
        inherits: None,
        initial_stage: Some("open".to_string()),
        stages,
    }
}
