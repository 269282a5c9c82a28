//! Structural validation of a resolved flow (§4.G).

use crate::stage::Flow;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("flow {flow} stage {stage}: {edge} target {target} does not exist")]
    DanglingEdge {
        flow: String,
        stage: String,
        edge: &'static str,
        target: String,
    },
    #[error("flow {flow} stage {stage}: unknown requirement {requirement}")]
    UnknownRequirement {
        flow: String,
        stage: String,
        requirement: String,
    },
    #[error("flow {flow} stage {stage}: unknown worker class {class}")]
    UnknownClass {
        flow: String,
        stage: String,
        class: String,
    },
}

pub fn validate_flow(flow: &Flow) -> Result<(), ValidationError> {
    for (name, stage) in &flow.stages {
        if let Some(next) = &stage.next {
            if !flow.stages.contains_key(next) {
                return Err(ValidationError::DanglingEdge {
                    flow: flow.name.clone(),
                    stage: name.clone(),
                    edge: "next",
                    target: next.clone(),
                });
            }
        }
        if let Some(fail) = &stage.fail {
            if !flow.stages.contains_key(fail) {
                return Err(ValidationError::DanglingEdge {
                    flow: flow.name.clone(),
                    stage: name.clone(),
                    edge: "fail",
                    target: fail.clone(),
                });
            }
        }
    }
    Ok(())
}
