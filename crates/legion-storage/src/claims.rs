//! §4.E File claim service: cooperative exclusive locks with FIFO waitlists.

use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use legion_core::{AgentClass, KernelError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResult {
    pub granted: bool,
    pub holder: Option<String>,
    pub position: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileClaim {
    pub file_path: String,
    pub holder: String,
    pub acquired_at_ms: i64,
    pub waitlist: Vec<String>,
}

impl Store {
    pub fn claim_file(&mut self, agent: &str, file_path: &str) -> StoreResult<ClaimResult> {
        let now = self.now_ms();
        let agent = agent.to_string();
        let file_path = file_path.to_string();
        self.with_write_txn(move |txn| {
            let holder: Option<String> = txn
                .query_row(
                    "SELECT holder FROM file_claims WHERE file_path = ?1",
                    [&file_path],
                    |r| r.get(0),
                )
                .ok();
            match holder {
                None => {
                    txn.execute(
                        "INSERT INTO file_claims (file_path, holder, acquired_at_ms) VALUES (?1, ?2, ?3)",
                        rusqlite::params![file_path, agent, now],
                    )?;
                    Ok(ClaimResult {
                        granted: true,
                        holder: Some(agent.clone()),
                        position: None,
                    })
                }
                Some(h) if h == agent => {
                    txn.execute(
                        "UPDATE file_claims SET acquired_at_ms = ?1 WHERE file_path = ?2",
                        rusqlite::params![now, file_path],
                    )?;
                    Ok(ClaimResult {
                        granted: true,
                        holder: Some(h),
                        position: None,
                    })
                }
                Some(h) => {
                    txn.execute(
                        "INSERT OR IGNORE INTO file_claim_waitlist (file_path, agent, requested_at_ms)
                         VALUES (?1, ?2, ?3)",
                        rusqlite::params![file_path, agent, now],
                    )?;
                    let position: i64 = txn.query_row(
                        "SELECT COUNT(*) FROM file_claim_waitlist
                         WHERE file_path = ?1 AND requested_at_ms <= (
                            SELECT requested_at_ms FROM file_claim_waitlist
                            WHERE file_path = ?1 AND agent = ?2
                         )",
                        rusqlite::params![file_path, agent],
                        |r| r.get(0),
                    )?;
                    Ok(ClaimResult {
                        granted: false,
                        holder: Some(h),
                        position: Some(position as u64),
                    })
                }
            }
        })
    }

    /// `force` is only honored for callers in the `lead` class, and only
    /// past the holder class's staleness window (§4.E liveness-via-lead).
    pub fn release_file(
        &mut self,
        caller_class: AgentClass,
        agent: &str,
        file_path: &str,
        force: bool,
    ) -> StoreResult<()> {
        let now = self.now_ms();
        let agent = agent.to_string();
        let file_path = file_path.to_string();
        self.with_write_txn(move |txn| {
            let row: Option<(String, i64)> = txn
                .query_row(
                    "SELECT holder, acquired_at_ms FROM file_claims WHERE file_path = ?1",
                    [&file_path],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .ok();
            let Some((holder, acquired_at_ms)) = row else {
                return Err(StoreError::Kernel(KernelError::NotFound(file_path.clone())));
            };

            if holder != agent {
                if !(force && caller_class == AgentClass::Lead) {
                    return Err(StoreError::Kernel(KernelError::ClaimHeld { holder }));
                }
                let holder_class: Option<String> = txn
                    .query_row("SELECT class FROM agents WHERE name = ?1", [&holder], |r| r.get(0))
                    .ok();
                let staleness_ms = holder_class
                    .as_deref()
                    .and_then(AgentClass::parse)
                    .unwrap_or(AgentClass::Coder)
                    .staleness_window()
                    .as_millis() as i64;
                if now - acquired_at_ms < staleness_ms {
                    return Err(StoreError::Kernel(KernelError::ClaimHeld { holder }));
                }
            }

            let next: Option<String> = txn
                .query_row(
                    "SELECT agent FROM file_claim_waitlist WHERE file_path = ?1
                     ORDER BY requested_at_ms ASC LIMIT 1",
                    [&file_path],
                    |r| r.get(0),
                )
                .ok();
            match next {
                Some(next_agent) => {
                    txn.execute(
                        "UPDATE file_claims SET holder = ?1, acquired_at_ms = ?2 WHERE file_path = ?3",
                        rusqlite::params![next_agent, now, file_path],
                    )?;
                    txn.execute(
                        "DELETE FROM file_claim_waitlist WHERE file_path = ?1 AND agent = ?2",
                        rusqlite::params![file_path, next_agent],
                    )?;
                }
                None => {
                    txn.execute("DELETE FROM file_claims WHERE file_path = ?1", [&file_path])?;
                }
            }
            Ok(())
        })
    }

    pub fn list_claims(&self) -> StoreResult<Vec<FileClaim>> {
        let mut stmt = self
            .conn
            .prepare("SELECT file_path, holder, acquired_at_ms FROM file_claims ORDER BY file_path")?;
        let claims: Vec<(String, String, i64)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        claims
            .into_iter()
            .map(|(file_path, holder, acquired_at_ms)| {
                let mut wl_stmt = self.conn.prepare(
                    "SELECT agent FROM file_claim_waitlist WHERE file_path = ?1 ORDER BY requested_at_ms ASC",
                )?;
                let waitlist = wl_stmt
                    .query_map([&file_path], |r| r.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FileClaim {
                    file_path,
                    holder,
                    acquired_at_ms,
                    waitlist,
                })
            })
            .collect()
    }
}
