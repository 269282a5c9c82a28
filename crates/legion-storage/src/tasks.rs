//! §4.H Task DAG engine: creation, race-safe pulls, and phase routing.

use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use legion_core::id::ShortId;
use legion_core::{authorize, AgentClass, Command, KernelError, TaskId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub text: String,
    pub project: String,
    pub zone: Option<String>,
    pub status: String,
    pub task_type: String,
    pub assigned_to: Option<String>,
    pub created_by: String,
    pub class_required: Option<AgentClass>,
    pub activity_count: i64,
    pub result_file: Option<String>,
    pub blocked_by: Vec<String>,
    pub files: Vec<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHistoryEntry {
    pub from_status: String,
    pub to_status: String,
    pub agent: String,
    pub timestamp_ms: i64,
}

fn row_to_task(store: &Store, row: &rusqlite::Row<'_>) -> rusqlite::Result<(Task, String)> {
    let id: String = row.get("id")?;
    let task_file: String = row.get("task_file")?;
    let class_required: Option<String> = row.get("class_required")?;
    let task = Task {
        id: id.clone(),
        title: row.get("title")?,
        text: String::new(),
        project: row.get("project")?,
        zone: row.get("zone")?,
        status: row.get("status")?,
        task_type: row.get("task_type")?,
        assigned_to: row.get("assigned_to")?,
        created_by: row.get("created_by")?,
        class_required: class_required.as_deref().and_then(legion_core::AgentClass::parse),
        activity_count: row.get("activity_count")?,
        result_file: row.get("result_file")?,
        blocked_by: store.blockers_of(&id).unwrap_or_default(),
        files: store.files_of(&id).unwrap_or_default(),
        created_at_ms: row.get("created_at_ms")?,
        updated_at_ms: row.get("updated_at_ms")?,
    };
    Ok((task, task_file))
}

impl Store {
    fn blockers_of(&self, task_id: &str) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT blocker_id FROM task_blocked_by WHERE task_id = ?1")?;
        let rows = stmt
            .query_map([task_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn files_of(&self, task_id: &str) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path FROM task_files WHERE task_id = ?1 ORDER BY path")?;
        let rows = stmt
            .query_map([task_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn unclosed_blockers(&self, task_ids: &[String]) -> StoreResult<u64> {
        let mut count = 0u64;
        for id in task_ids {
            let status: Option<String> = self
                .conn
                .query_row("SELECT status FROM tasks WHERE id = ?1", [id], |r| r.get(0))
                .ok();
            let is_closed = match status {
                Some(s) => {
                    let task_type = self.task_type_of(id)?;
                    self.flows()
                        .resolve(&task_type)
                        .ok()
                        .and_then(|f| f.stage(&s).map(|st| st.is_terminal()))
                        .unwrap_or(false)
                }
                None => false,
            };
            if !is_closed {
                count += 1;
            }
        }
        Ok(count)
    }

    fn task_type_of(&self, task_id: &str) -> StoreResult<String> {
        Ok(self
            .conn
            .query_row("SELECT task_type FROM tasks WHERE id = ?1", [task_id], |r| r.get(0))?)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_task(
        &mut self,
        caller_class: AgentClass,
        created_by: &str,
        project: &str,
        title: &str,
        text: &str,
        task_type: &str,
        zone: Option<&str>,
        class_required: Option<AgentClass>,
        blocked_by: &[String],
    ) -> StoreResult<TaskId> {
        authorize(caller_class, Command::CreateTask).map_err(KernelError::from)?;
        if !self.has_active_plan_pub(project)? {
            return Err(StoreError::Kernel(KernelError::NoActivePlan));
        }
        let flow = self.flows().resolve(task_type)?;
        let now = self.now_ms();
        let id = TaskId::new(self.next_id(TaskId::PREFIX));
        let task_file_rel = format!("tasks/{project}/{}.md", id.short());
        let root = self.content().root().to_path_buf();

        let id_str = id.as_str().to_string();
        let title = title.to_string();
        let project = project.to_string();
        let created_by = created_by.to_string();
        let zone = zone.map(str::to_string);
        let task_type = task_type.to_string();
        let class_required_str = class_required.map(|c| c.as_str().to_string());
        let blocked_by = blocked_by.to_vec();
        let task_file_for_txn = task_file_rel.clone();
        let initial_stage = flow.initial_stage.clone();

        self.with_write_txn(move |txn| {
            txn.execute(
                "INSERT INTO tasks (id, title, task_file, project, zone, status, task_type,
                    assigned_to, created_by, class_required, activity_count, result_file,
                    created_at_ms, updated_at_ms, requirement_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9, 0, NULL, ?10, ?10, NULL)",
                rusqlite::params![
                    id_str,
                    title,
                    task_file_for_txn,
                    project,
                    zone,
                    initial_stage,
                    task_type,
                    created_by,
                    class_required_str,
                    now
                ],
            )?;
            for blocker in &blocked_by {
                txn.execute(
                    "INSERT INTO task_blocked_by (task_id, blocker_id) VALUES (?1, ?2)",
                    rusqlite::params![id_str, blocker],
                )?;
            }
            Ok(())
        })?;
        self.content().write(&root.join(&task_file_rel), text)?;
        Ok(id)
    }

    fn has_active_plan_pub(&self, project: &str) -> StoreResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM plans WHERE project = ?1 AND status = 'active'",
            [project],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Transitions `open -> assigned`. Returns an advisory warning string
    /// when the target agent's HP state is CRITICAL; never blocks on it.
    pub fn assign_task(
        &mut self,
        caller_class: AgentClass,
        task_id: &str,
        agent: &str,
    ) -> StoreResult<Option<String>> {
        authorize(caller_class, Command::AssignTask).map_err(KernelError::from)?;
        let now = self.now_ms();
        let (status, blocked_by): (String, Vec<String>) = {
            let status = self
                .conn
                .query_row("SELECT status FROM tasks WHERE id = ?1", [task_id], |r| r.get(0))
                .map_err(|_| StoreError::Kernel(KernelError::NotFound(task_id.to_string())))?;
            (status, self.blockers_of(task_id)?)
        };
        if !blocked_by.is_empty() {
            let open = self.unclosed_blockers(&blocked_by)?;
            if open > 0 {
                return Err(StoreError::Kernel(KernelError::BlockedBy { count: open }));
            }
        }
        let task_id_s = task_id.to_string();
        let agent_s = agent.to_string();
        let status_for_txn = status.clone();
        self.with_write_txn(move |txn| {
            txn.execute(
                "UPDATE tasks SET status = 'assigned', assigned_to = ?1, updated_at_ms = ?2 WHERE id = ?3",
                rusqlite::params![agent_s, now, task_id_s],
            )?;
            txn.execute(
                "INSERT INTO task_history (task_id, from_status, to_status, agent, timestamp_ms)
                 VALUES (?1, ?2, 'assigned', ?3, ?4)",
                rusqlite::params![task_id_s, status_for_txn, agent_s, now],
            )?;
            Ok(())
        })?;
        let warning = match self.get_agent(agent)? {
            Some(a) => {
                let pct = legion_core::hp_pct(a.hp_turn_input as u64, a.hp_tokens_limit.max(1) as u64);
                (legion_core::HealthState::from_pct(pct) == legion_core::HealthState::Critical)
                    .then(|| format!("{agent} is at CRITICAL health"))
            }
            None => None,
        };
        Ok(warning)
    }

    /// Race-safe: exactly one of two concurrent callers wins. Every check
    /// — status, assignment, class match, and blocker closure — is read
    /// inside the same `BEGIN IMMEDIATE` transaction as the write, so a
    /// blocker reopening or a `class_required` edit between a snapshot
    /// read and the commit can never slip through.
    pub fn pull_task(
        &mut self,
        caller_class: AgentClass,
        agent: &str,
        task_id: &str,
    ) -> StoreResult<()> {
        authorize(caller_class, Command::PullTask).map_err(KernelError::from)?;
        let now = self.now_ms();
        let agent = agent.to_string();
        let task_id = task_id.to_string();
        let flows = self.flows.clone();

        self.with_write_txn(move |txn| {
            let (status, assigned_to, class_required): (String, Option<String>, Option<String>) = txn
                .query_row(
                    "SELECT status, assigned_to, class_required FROM tasks WHERE id = ?1",
                    [&task_id],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )
                .map_err(|_| StoreError::Kernel(KernelError::NotFound(task_id.clone())))?;

            if !(status == "open" || status == "assigned") {
                return Err(StoreError::Kernel(KernelError::AlreadyPulled));
            }
            if let Some(holder) = &assigned_to {
                if holder != &agent {
                    return Err(StoreError::Kernel(KernelError::AlreadyPulled));
                }
            }
            let class_required_ok = match class_required.as_deref().and_then(AgentClass::parse) {
                Some(required) => required == caller_class,
                None => true,
            };
            if !class_required_ok {
                return Err(StoreError::Kernel(KernelError::WorkerClassMismatch {
                    class: caller_class,
                    stage: status.clone(),
                }));
            }

            let mut blocker_stmt =
                txn.prepare("SELECT blocker_id FROM task_blocked_by WHERE task_id = ?1")?;
            let blocker_ids: Vec<String> = blocker_stmt
                .query_map([&task_id], |r| r.get::<_, String>(0))?
                .collect::<Result<_, _>>()?;
            let mut open_blockers = 0u64;
            for blocker_id in &blocker_ids {
                let found: Option<(String, String)> = txn
                    .query_row(
                        "SELECT task_type, status FROM tasks WHERE id = ?1",
                        [blocker_id],
                        |r| Ok((r.get(0)?, r.get(1)?)),
                    )
                    .ok();
                let is_closed = found
                    .and_then(|(task_type, blocker_status)| {
                        flows
                            .resolve(&task_type)
                            .ok()
                            .and_then(|f| f.stage(&blocker_status).map(|s| s.is_terminal()))
                    })
                    .unwrap_or(false);
                if !is_closed {
                    open_blockers += 1;
                }
            }
            if open_blockers > 0 {
                return Err(StoreError::Kernel(KernelError::BlockedBy {
                    count: open_blockers,
                }));
            }

            txn.execute(
                "UPDATE tasks SET status = 'in_progress', assigned_to = ?1,
                    activity_count = activity_count + 1, updated_at_ms = ?2 WHERE id = ?3",
                rusqlite::params![agent, now, task_id],
            )?;
            txn.execute(
                "INSERT INTO task_history (task_id, from_status, to_status, agent, timestamp_ms)
                 VALUES (?1, ?2, 'in_progress', ?3, ?4)",
                rusqlite::params![task_id, status, agent, now],
            )?;
            Ok(())
        })
    }

    /// Mutates progress/files within the current stage. A `status` is
    /// only accepted if it equals the task's current stage: transitions
    /// go through `complete_phase`, not this call.
    pub fn update_task(
        &mut self,
        task_id: &str,
        progress: Option<&str>,
        files: Option<&[String]>,
        status: Option<&str>,
    ) -> StoreResult<()> {
        let now = self.now_ms();
        let current: String = self
            .conn
            .query_row("SELECT status FROM tasks WHERE id = ?1", [task_id], |r| r.get(0))
            .map_err(|_| StoreError::Kernel(KernelError::NotFound(task_id.to_string())))?;
        if let Some(s) = status {
            if s != current {
                return Err(StoreError::Kernel(KernelError::InvalidTransition {
                    flow: self.task_type_of(task_id)?,
                    from: current,
                    to: s.to_string(),
                }));
            }
        }
        let task_id_s = task_id.to_string();
        let files = files.map(|f| f.to_vec());
        let root = self.content().root().to_path_buf();
        let project: String = self
            .conn
            .query_row("SELECT project FROM tasks WHERE id = ?1", [task_id], |r| r.get(0))?;
        let task_file: String = self
            .conn
            .query_row("SELECT task_file FROM tasks WHERE id = ?1", [task_id], |r| r.get(0))?;
        if let Some(text) = progress {
            self.content().write(&root.join(&task_file), text)?;
        }
        let _ = project;
        self.with_write_txn(move |txn| {
            txn.execute(
                "UPDATE tasks SET updated_at_ms = ?1 WHERE id = ?2",
                rusqlite::params![now, task_id_s],
            )?;
            if let Some(paths) = &files {
                txn.execute("DELETE FROM task_files WHERE task_id = ?1", [&task_id_s])?;
                for path in paths {
                    txn.execute(
                        "INSERT INTO task_files (task_id, path) VALUES (?1, ?2)",
                        rusqlite::params![task_id_s, path],
                    )?;
                }
            }
            Ok(())
        })
    }

    pub fn submit_result(&mut self, task_id: &str, result_text: &str) -> StoreResult<()> {
        let now = self.now_ms();
        let project: String = self
            .conn
            .query_row("SELECT project FROM tasks WHERE id = ?1", [task_id], |r| r.get(0))
            .map_err(|_| StoreError::Kernel(KernelError::NotFound(task_id.to_string())))?;
        let root = self.content().root().to_path_buf();
        let result_file_rel = format!("results/{project}/{}.md", task_id.short());
        self.content().write(&root.join(&result_file_rel), result_text)?;
        let task_id = task_id.to_string();
        self.with_write_txn(move |txn| {
            txn.execute(
                "UPDATE tasks SET result_file = ?1, updated_at_ms = ?2 WHERE id = ?3",
                rusqlite::params![result_file_rel, now, task_id],
            )?;
            Ok(())
        })
    }

    /// The §4.H phase-routing contract. Returns the new stage name and an
    /// advisory warning when `activity_count` has reached the drag
    /// threshold.
    pub fn complete_phase(
        &mut self,
        caller_class: AgentClass,
        agent: &str,
        task_id: &str,
        failed: bool,
    ) -> StoreResult<(String, Option<String>)> {
        authorize(caller_class, Command::CompletePhase).map_err(KernelError::from)?;
        let now = self.now_ms();
        let (task_type, current_status, result_file, activity_count): (String, String, Option<String>, i64) =
            self.conn
                .query_row(
                    "SELECT task_type, status, result_file, activity_count FROM tasks WHERE id = ?1",
                    [task_id],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
                )
                .map_err(|_| StoreError::Kernel(KernelError::NotFound(task_id.to_string())))?;

        let flow = self.flows().resolve(&task_type)?;
        let stage = flow.stage(&current_status).ok_or_else(|| {
            StoreError::Kernel(KernelError::InvalidTransition {
                flow: task_type.clone(),
                from: current_status.clone(),
                to: "?".to_string(),
            })
        })?;
        if !stage.allows_worker(caller_class) {
            return Err(StoreError::Kernel(KernelError::WorkerClassMismatch {
                class: caller_class,
                stage: current_status.clone(),
            }));
        }
        let target = if failed { &stage.fail } else { &stage.next };
        let target = target.clone().ok_or_else(|| {
            StoreError::Kernel(KernelError::InvalidTransition {
                flow: task_type.clone(),
                from: current_status.clone(),
                to: "<terminal>".to_string(),
            })
        })?;
        if stage
            .requires
            .contains(&legion_flows::Requirement::SubmitResult)
            && result_file.is_none()
        {
            return Err(StoreError::Kernel(KernelError::MissingResult));
        }
        let target_stage = flow.stage(&target).ok_or_else(|| {
            StoreError::Kernel(KernelError::InvalidTransition {
                flow: task_type.clone(),
                from: current_status.clone(),
                to: target.clone(),
            })
        })?;
        // If the next stage's workers differ from the completing agent's
        // class, the task returns to the pool for re-pull.
        let clear_assignment = !target_stage.allows_worker(caller_class);

        let task_id_s = task_id.to_string();
        let agent_s = agent.to_string();
        let target_for_txn = target.clone();
        let new_activity = activity_count + 1;
        self.with_write_txn(move |txn| {
            if clear_assignment {
                txn.execute(
                    "UPDATE tasks SET status = ?1, assigned_to = NULL,
                        activity_count = ?2, updated_at_ms = ?3 WHERE id = ?4",
                    rusqlite::params![target_for_txn, new_activity, now, task_id_s],
                )?;
            } else {
                txn.execute(
                    "UPDATE tasks SET status = ?1, activity_count = ?2, updated_at_ms = ?3 WHERE id = ?4",
                    rusqlite::params![target_for_txn, new_activity, now, task_id_s],
                )?;
            }
            txn.execute(
                "INSERT INTO task_history (task_id, from_status, to_status, agent, timestamp_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![task_id_s, current_status, target_for_txn, agent_s, now],
            )?;
            Ok(())
        })?;

        let warning = (new_activity >= 4).then(|| {
            format!("task {task_id} has required {new_activity} phase completions; this fight is dragging")
        });
        Ok((target, warning))
    }

    pub fn close_task(
        &mut self,
        caller_class: AgentClass,
        caller: &str,
        task_id: &str,
    ) -> StoreResult<()> {
        authorize(caller_class, Command::CloseTask).map_err(KernelError::from)?;
        let now = self.now_ms();
        let (task_type, current_status, result_file): (String, String, Option<String>) = self
            .conn
            .query_row(
                "SELECT task_type, status, result_file FROM tasks WHERE id = ?1",
                [task_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .map_err(|_| StoreError::Kernel(KernelError::NotFound(task_id.to_string())))?;
        if result_file.is_none() {
            return Err(StoreError::Kernel(KernelError::MissingResult));
        }
        let flow = self.flows().resolve(&task_type)?;
        let terminal = flow
            .stages
            .values()
            .find(|s| s.is_terminal())
            .map(|s| s.name.clone())
            .ok_or_else(|| {
                StoreError::Kernel(KernelError::InvalidTransition {
                    flow: task_type.clone(),
                    from: current_status.clone(),
                    to: "<terminal>".to_string(),
                })
            })?;
        let task_id_s = task_id.to_string();
        let caller = caller.to_string();
        self.with_write_txn(move |txn| {
            txn.execute(
                "UPDATE tasks SET status = ?1, updated_at_ms = ?2 WHERE id = ?3",
                rusqlite::params![terminal, now, task_id_s],
            )?;
            txn.execute(
                "INSERT INTO task_history (task_id, from_status, to_status, agent, timestamp_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![task_id_s, current_status, terminal, caller, now],
            )?;
            Ok(())
        })
    }

    pub fn reopen_task(
        &mut self,
        caller_class: AgentClass,
        caller: &str,
        task_id: &str,
        target_stage: &str,
    ) -> StoreResult<()> {
        authorize(caller_class, Command::ReopenTask).map_err(KernelError::from)?;
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
        if flow.stage(target_stage).is_none() {
            return Err(StoreError::Kernel(KernelError::InvalidTransition {
                flow: task_type,
                from: current_status,
                to: target_stage.to_string(),
            }));
        }
        let task_id_s = task_id.to_string();
        let target = target_stage.to_string();
        let caller = caller.to_string();
        self.with_write_txn(move |txn| {
            txn.execute(
                "UPDATE tasks SET status = ?1, assigned_to = NULL, updated_at_ms = ?2 WHERE id = ?3",
                rusqlite::params![target, now, task_id_s],
            )?;
            txn.execute(
                "INSERT INTO task_history (task_id, from_status, to_status, agent, timestamp_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![task_id_s, current_status, target, caller, now],
            )?;
            Ok(())
        })
    }

    pub fn get_task(&self, task_id: &str) -> StoreResult<Option<Task>> {
        let root = self.content().root().to_path_buf();
        let mut stmt = self.conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
        let mut rows = stmt.query_map([task_id], |row| row_to_task(self, row))?;
        match rows.next().transpose()? {
            Some((mut task, task_file)) => {
                task.text = std::fs::read_to_string(root.join(&task_file)).unwrap_or_default();
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    pub fn list_tasks(&self, project: &str, status: Option<&str>) -> StoreResult<Vec<Task>> {
        let root = self.content().root().to_path_buf();
        let (sql, param_status) = match status {
            Some(s) => (
                "SELECT * FROM tasks WHERE project = ?1 AND status = ?2 ORDER BY created_at_ms",
                Some(s.to_string()),
            ),
            None => (
                "SELECT * FROM tasks WHERE project = ?1 ORDER BY created_at_ms",
                None,
            ),
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows: Vec<(Task, String)> = if let Some(s) = &param_status {
            stmt.query_map(rusqlite::params![project, s], |row| row_to_task(self, row))?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            stmt.query_map([project], |row| row_to_task(self, row))?
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(rows
            .into_iter()
            .map(|(mut task, task_file)| {
                task.text = std::fs::read_to_string(root.join(&task_file)).unwrap_or_default();
                task
            })
            .collect())
    }

    pub fn task_lineage(
        &self,
        task_id: &str,
    ) -> StoreResult<(Vec<TaskHistoryEntry>, legion_flows::Flow)> {
        let task_type = self.task_type_of(task_id)?;
        let flow = self.flows().resolve(&task_type)?;
        let mut stmt = self.conn.prepare(
            "SELECT from_status, to_status, agent, timestamp_ms FROM task_history
             WHERE task_id = ?1 ORDER BY id ASC",
        )?;
        let history = stmt
            .query_map([task_id], |r| {
                Ok(TaskHistoryEntry {
                    from_status: r.get(0)?,
                    to_status: r.get(1)?,
                    agent: r.get(2)?,
                    timestamp_ms: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((history, flow))
    }
}
