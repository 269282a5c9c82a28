//! §6 `next_status`/`transition`: read-only flow introspection and the
//! lead's manual override of `complete_phase`'s usual guarded routing.

use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use legion_core::{authorize, AgentClass, Command, KernelError};

/// What `next_status` reports for a task currently sitting in `status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NextStatus {
    pub next: Option<String>,
    pub fail: Option<String>,
    pub is_terminal: bool,
}

impl Store {
    /// §6 `next_status`: the candidate edges out of a task's current
    /// stage, without mutating anything. Open to any registered caller.
    pub fn next_status(&self, task_id: &str) -> StoreResult<NextStatus> {
        let (task_type, status): (String, String) = self
            .conn
            .query_row(
                "SELECT task_type, status FROM tasks WHERE id = ?1",
                [task_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .map_err(|_| StoreError::Kernel(KernelError::NotFound(task_id.to_string())))?;
        let flow = self.flows().resolve(&task_type)?;
        let stage = flow.stage(&status).ok_or_else(|| {
            StoreError::Kernel(KernelError::InvalidTransition {
                flow: task_type.clone(),
                from: status.clone(),
                to: "?".to_string(),
            })
        })?;
        Ok(NextStatus {
            next: stage.next.clone(),
            fail: stage.fail.clone(),
            is_terminal: stage.is_terminal(),
        })
    }

    /// §6 `transition` (manual): lead-only override that bypasses
    /// `complete_phase`'s worker-class and `requires` guards, but still
    /// refuses any edge the flow itself doesn't define (`InvalidTransition`).
    pub fn transition(
        &mut self,
        caller_class: AgentClass,
        agent: &str,
        task_id: &str,
        to_status: &str,
    ) -> StoreResult<()> {
        authorize(caller_class, Command::Transition).map_err(KernelError::from)?;
        let now = self.now_ms();
        let (task_type, current_status): (String, String) = self
            .conn
            .query_row(
                "SELECT task_type, status FROM tasks WHERE id = ?1",
                [task_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .map_err(|_| StoreError::Kernel(KernelError::NotFound(task_id.to_string())))?;
        let flow = self.flows().resolve(&task_type)?;
        if !flow.is_valid_transition(&current_status, to_status) {
            return Err(StoreError::Kernel(KernelError::InvalidTransition {
                flow: task_type,
                from: current_status,
                to: to_status.to_string(),
            }));
        }
        let task_id_s = task_id.to_string();
        let agent_s = agent.to_string();
        let to_s = to_status.to_string();
        self.with_write_txn(move |txn| {
            txn.execute(
                "UPDATE tasks SET status = ?1, updated_at_ms = ?2 WHERE id = ?3",
                rusqlite::params![to_s, now, task_id_s],
            )?;
            txn.execute(
                "INSERT INTO task_history (task_id, from_status, to_status, agent, timestamp_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![task_id_s, current_status, to_s, agent_s, now],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use legion_core::{FakeClock, Transport};
    use std::sync::Arc;

    fn store_with_base(start_ms: i64) -> Store {
        Store::open_in_memory(Arc::new(FakeClock::new(start_ms))).unwrap()
    }

    #[test]
    fn next_status_reports_the_base_flows_next_edge() {
        let mut s = store_with_base(0);
        s.register("lead-1", AgentClass::Lead, None, Transport::Daemon).unwrap();
        s.set_plan("lead-1", "proj", "the plan").unwrap();
        let id = s
            .create_task(AgentClass::Lead, "lead-1", "proj", "t", "body", "_base", None, None, &[])
            .unwrap();
        let ns = s.next_status(id.as_str()).unwrap();
        assert!(!ns.is_terminal);
        assert!(ns.next.is_some());
    }

    #[test]
    fn manual_transition_refuses_edges_the_flow_does_not_define() {
        let mut s = store_with_base(0);
        s.register("lead-1", AgentClass::Lead, None, Transport::Daemon).unwrap();
        s.set_plan("lead-1", "proj", "the plan").unwrap();
        let id = s
            .create_task(AgentClass::Lead, "lead-1", "proj", "t", "body", "_base", None, None, &[])
            .unwrap();
        assert!(s.transition(AgentClass::Coder, "coder-1", id.as_str(), "done").is_err());
        assert!(s
            .transition(AgentClass::Lead, "lead-1", id.as_str(), "bogus-status")
            .is_err());
    }
}
