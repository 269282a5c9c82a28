//! §4.M Fenix-down / cold-start: the pre-death knowledge dump and the
//! post-restart recovery briefing that reads it back.

use crate::error::StoreResult;
use crate::store::Store;
use legion_core::FenixId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FenixRecord {
    pub id: String,
    pub agent: String,
    pub files: Vec<String>,
    pub manifest: String,
    pub created_at_ms: i64,
    pub consumed_at_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColdStartBriefing {
    pub fenix_records: Vec<FenixRecord>,
    pub active_plan: Option<crate::warroom::Plan>,
    pub open_tasks: Vec<crate::tasks::Task>,
    pub last_hp_pct: Option<u32>,
    pub recent_log: Vec<crate::warroom::LogEntry>,
}

impl Store {
    /// Must always be accepted, even if the caller's context is stale:
    /// this is the one write path exempt from the freshness gate, since
    /// an agent calling it is by definition about to die.
    pub fn fenix_down(
        &mut self,
        agent: &str,
        files: &[String],
        manifest: &str,
    ) -> StoreResult<FenixId> {
        let now = self.now_ms();
        let id = FenixId::new(self.next_id(FenixId::PREFIX));
        let agent = agent.to_string();
        let manifest = manifest.to_string();
        let files = files.to_vec();
        let id_str = id.as_str().to_string();
        self.with_write_txn(move |txn| {
            txn.execute(
                "INSERT INTO fenix_records (id, agent, manifest, created_at_ms, consumed_at_ms)
                 VALUES (?1, ?2, ?3, ?4, NULL)",
                rusqlite::params![id_str, agent, manifest, now],
            )?;
            for path in &files {
                txn.execute(
                    "INSERT INTO fenix_files (fenix_id, path) VALUES (?1, ?2)",
                    rusqlite::params![id_str, path],
                )?;
            }
            Ok(())
        })?;
        Ok(id)
    }

    fn unconsumed_fenix_records(&mut self, agent: &str) -> StoreResult<Vec<FenixRecord>> {
        let now = self.now_ms();
        let agent = agent.to_string();
        let agent_for_closure = agent.clone();
        let ids: Vec<(String, String, i64)> = self.with_write_txn(move |txn| {
            let mut stmt = txn.prepare(
                "SELECT id, manifest, created_at_ms FROM fenix_records
                 WHERE agent = ?1 AND consumed_at_ms IS NULL",
            )?;
            let rows = stmt
                .query_map([&agent_for_closure], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            for (id, _, _) in &rows {
                txn.execute(
                    "UPDATE fenix_records SET consumed_at_ms = ?1 WHERE id = ?2",
                    rusqlite::params![now, id],
                )?;
            }
            Ok(rows)
        })?;

        let mut records = Vec::with_capacity(ids.len());
        for (id, manifest, created_at_ms) in ids {
            let mut stmt = self
                .conn
                .prepare("SELECT path FROM fenix_files WHERE fenix_id = ?1")?;
            let files = stmt
                .query_map([&id], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            records.push(FenixRecord {
                id,
                agent: agent.clone(),
                files,
                manifest,
                created_at_ms,
                consumed_at_ms: Some(now),
            });
        }
        Ok(records)
    }

    /// The recovery briefing for a restarted agent: unconsumed fenix
    /// records (atomically marked consumed), the active plan, this
    /// agent's open tasks, last known HP, and recent raid-log entries.
    pub fn cold_start(&mut self, agent: &str, project: &str) -> StoreResult<ColdStartBriefing> {
        let fenix_records = self.unconsumed_fenix_records(agent)?;
        let active_plan = self.get_plan(project)?;
        let open_tasks = self
            .list_tasks(project, None)?
            .into_iter()
            .filter(|t| t.assigned_to.as_deref() == Some(agent))
            .collect();
        let last_hp_pct = self.get_agent(agent)?.map(|a| {
            legion_core::hp_pct(a.hp_turn_input as u64, a.hp_tokens_limit.max(1) as u64)
        });
        let recent_log = self.get_log(project, 10)?;
        Ok(ColdStartBriefing {
            fenix_records,
            active_plan,
            open_tasks,
            last_hp_pct,
            recent_log,
        })
    }
}
