//! §4.F War-room: the project's single active plan and its audit log.

use crate::error::StoreResult;
use crate::store::Store;
use legion_core::{authorize, AgentClass, Command, KernelError, PlanId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub project: String,
    pub agent: String,
    pub text: String,
    pub status: String,
    pub set_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub project: String,
    pub agent: String,
    pub text: String,
    pub priority: String,
    pub created_at_ms: i64,
}

impl Store {
    /// Sets a new `active` plan for `project`; any plan already `active`
    /// in the same project is marked `completed` in the same transaction.
    pub fn set_plan(&mut self, agent: &str, project: &str, text: &str) -> StoreResult<PlanId> {
        let now = self.now_ms();
        let id = PlanId::new(self.next_id(PlanId::PREFIX));
        let text_file_rel = format!("battle-plans/{now}.md");
        let root = self.content().root().to_path_buf();

        let agent = agent.to_string();
        let project = project.to_string();
        let id_str = id.as_str().to_string();
        let text_file_for_txn = text_file_rel.clone();
        self.with_write_txn(move |txn| {
            txn.execute(
                "UPDATE plans SET status = 'completed' WHERE project = ?1 AND status = 'active'",
                [&project],
            )?;
            txn.execute(
                "INSERT INTO plans (id, project, agent, text_file, status, set_at_ms)
                 VALUES (?1, ?2, ?3, ?4, 'active', ?5)",
                rusqlite::params![id_str, project, agent, text_file_for_txn, now],
            )?;
            Ok(())
        })?;
        self.content().write(&root.join(&text_file_rel), text)?;
        Ok(id)
    }

    pub fn get_plan(&self, project: &str) -> StoreResult<Option<Plan>> {
        let row: Option<(String, String, String, String, i64)> = self
            .conn
            .query_row(
                "SELECT id, agent, text_file, status, set_at_ms FROM plans
                 WHERE project = ?1 AND status = 'active'
                 ORDER BY set_at_ms DESC LIMIT 1",
                [project],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .optional_none_on_no_rows()?;
        let Some((id, agent, text_file, status, set_at_ms)) = row else {
            return Ok(None);
        };
        let text = self
            .content()
            .read(&self.content().root().join(&text_file))
            .unwrap_or_default();
        Ok(Some(Plan {
            id,
            project: project.to_string(),
            agent,
            text,
            status,
            set_at_ms,
        }))
    }

    pub fn update_plan_status(
        &mut self,
        caller_class: AgentClass,
        plan_id: &str,
        status: &str,
    ) -> StoreResult<()> {
        authorize(caller_class, Command::UpdatePlanStatus).map_err(KernelError::from)?;
        let plan_id = plan_id.to_string();
        let status = status.to_string();
        self.with_write_txn(move |txn| {
            let updated = txn.execute(
                "UPDATE plans SET status = ?1 WHERE id = ?2",
                [&status, &plan_id],
            )?;
            if updated == 0 {
                return Err(crate::error::StoreError::Kernel(KernelError::NotFound(
                    plan_id.clone(),
                )));
            }
            Ok(())
        })
    }

    /// Appends an audit entry to the project's raid log.
    pub fn log(
        &mut self,
        agent: &str,
        project: &str,
        text: &str,
        priority: &str,
    ) -> StoreResult<legion_core::LogEntryId> {
        let now = self.now_ms();
        let id = legion_core::LogEntryId::new(self.next_id(legion_core::LogEntryId::PREFIX));
        let entry_file_rel = format!("raid-log/{now}.md");
        let root = self.content().root().to_path_buf();

        let agent = agent.to_string();
        let project = project.to_string();
        let priority = priority.to_string();
        let id_str = id.as_str().to_string();
        let entry_file_for_txn = entry_file_rel.clone();
        self.with_write_txn(move |txn| {
            txn.execute(
                "INSERT INTO log_entries (id, project, agent, entry_file, priority, created_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id_str, project, agent, entry_file_for_txn, priority, now],
            )?;
            Ok(())
        })?;
        self.content().write(&root.join(&entry_file_rel), text)?;
        Ok(id)
    }

    /// Most recent entries first, bounded by `count`.
    pub fn get_log(&self, project: &str, count: u32) -> StoreResult<Vec<LogEntry>> {
        let root = self.content().root().to_path_buf();
        let mut stmt = self.conn.prepare(
            "SELECT id, agent, entry_file, priority, created_at_ms FROM log_entries
             WHERE project = ?1 ORDER BY created_at_ms DESC LIMIT ?2",
        )?;
        let rows: Vec<(String, String, String, String, i64)> = stmt
            .query_map(rusqlite::params![project, count], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .map(|(id, agent, entry_file, priority, created_at_ms)| LogEntry {
                id,
                project: project.to_string(),
                agent,
                text: std::fs::read_to_string(root.join(&entry_file)).unwrap_or_default(),
                priority,
                created_at_ms,
            })
            .collect())
    }
}

/// `query_row` returns `QueryReturnedNoRows` rather than `None`; this
/// adapts that into the `Option` the callers want.
trait OptionalNoRows<T> {
    fn optional_none_on_no_rows(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalNoRows<T> for rusqlite::Result<T> {
    fn optional_none_on_no_rows(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
