//! §4.C Agent registry & context freshness.

use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use legion_core::{authorize, AgentClass, Command, HpMode, KernelError, Liveness, Transport};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub name: String,
    pub class: AgentClass,
    pub model: Option<String>,
    pub transport: Transport,
    pub status: String,
    pub context_summary: String,
    pub last_seen_ms: i64,
    pub context_updated_ms: i64,
    pub hp_input_tokens: i64,
    pub hp_output_tokens: i64,
    pub hp_turn_input: i64,
    pub hp_turn_output: i64,
    pub hp_tokens_limit: i64,
    pub hp_mode: HpMode,
    pub hp_alerts_fired: Vec<legion_core::AlertLevel>,
    pub current_zone: Option<String>,
    pub current_role: Option<String>,
    pub registered_at_ms: i64,
}

impl AgentRecord {
    pub fn liveness(&self, now_ms: i64) -> Liveness {
        let idle = (now_ms - self.last_seen_ms).max(0) as u64;
        Liveness::from_idle_duration(Duration::from_millis(idle))
    }

    pub fn is_stale(&self, now_ms: i64) -> bool {
        let age = (now_ms - self.context_updated_ms).max(0) as u64;
        age > self.class.staleness_window().as_millis() as u64
    }
}

fn row_to_agent(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentRecord> {
    let class_str: String = row.get("class")?;
    let transport_str: String = row.get("transport")?;
    let hp_mode_str: String = row.get("hp_mode")?;
    let alerts_json: String = row.get("hp_alerts_fired")?;
    Ok(AgentRecord {
        name: row.get("name")?,
        class: AgentClass::parse(&class_str).unwrap_or(AgentClass::Coder),
        model: row.get("model")?,
        transport: if transport_str == "daemon" {
            Transport::Daemon
        } else {
            Transport::Terminal
        },
        status: row.get("status")?,
        context_summary: row.get("context_summary")?,
        last_seen_ms: row.get("last_seen_ms")?,
        context_updated_ms: row.get("context_updated_ms")?,
        hp_input_tokens: row.get("hp_input_tokens")?,
        hp_output_tokens: row.get("hp_output_tokens")?,
        hp_turn_input: row.get("hp_turn_input")?,
        hp_turn_output: row.get("hp_turn_output")?,
        hp_tokens_limit: row.get("hp_tokens_limit")?,
        hp_mode: match hp_mode_str.as_str() {
            "daemon" => HpMode::Daemon,
            "self_reported" => HpMode::SelfReported,
            _ => HpMode::None,
        },
        hp_alerts_fired: serde_json::from_str(&alerts_json).unwrap_or_default(),
        current_zone: row.get("current_zone")?,
        current_role: row.get("current_role")?,
        registered_at_ms: row.get("registered_at_ms")?,
    })
}

impl Store {
    /// Idempotent on `name`: re-registering updates attributes + last_seen.
    pub fn register(
        &mut self,
        name: &str,
        class: AgentClass,
        model: Option<&str>,
        transport: Transport,
    ) -> StoreResult<()> {
        let now = self.now_ms();
        let transport_str = if transport == Transport::Daemon {
            "daemon"
        } else {
            "terminal"
        };
        self.with_write_txn(|txn| {
            txn.execute(
                "INSERT INTO agents (name, class, model, transport, last_seen_ms, context_updated_ms, registered_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?5)
                 ON CONFLICT(name) DO UPDATE SET
                    class = excluded.class,
                    model = excluded.model,
                    transport = excluded.transport,
                    last_seen_ms = excluded.last_seen_ms",
                rusqlite::params![name, class.as_str(), model, transport_str, now],
            )?;
            Ok(())
        })
    }

    pub fn deregister(&mut self, name: &str) -> StoreResult<()> {
        self.with_write_txn(|txn| {
            txn.execute("DELETE FROM agents WHERE name = ?1", [name])?;
            Ok(())
        })
    }

    pub fn rename(&mut self, old_name: &str, new_name: &str) -> StoreResult<()> {
        self.with_write_txn(|txn| {
            let updated = txn.execute(
                "UPDATE agents SET name = ?1 WHERE name = ?2",
                [new_name, old_name],
            )?;
            if updated == 0 {
                return Err(StoreError::Kernel(KernelError::UnknownRecipient(
                    old_name.to_string(),
                )));
            }
            Ok(())
        })
    }

    pub fn get_agent(&self, name: &str) -> StoreResult<Option<AgentRecord>> {
        let mut stmt = self.conn.prepare("SELECT * FROM agents WHERE name = ?1")?;
        let mut rows = stmt.query_map([name], row_to_agent)?;
        Ok(rows.next().transpose()?)
    }

    pub fn who(&self) -> StoreResult<Vec<AgentRecord>> {
        let mut stmt = self.conn.prepare("SELECT * FROM agents ORDER BY name")?;
        let rows = stmt.query_map([], row_to_agent)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn set_context(
        &mut self,
        name: &str,
        context: &str,
        tokens_limit: Option<i64>,
        self_reported_hp_pct: Option<u32>,
    ) -> StoreResult<()> {
        let now = self.now_ms();
        self.with_write_txn(|txn| {
            if let Some(pct) = self_reported_hp_pct {
                txn.execute(
                    "UPDATE agents SET context_summary = ?1, context_updated_ms = ?2, last_seen_ms = ?2,
                        hp_mode = 'self_reported', hp_tokens_limit = COALESCE(?3, hp_tokens_limit)
                     WHERE name = ?4",
                    rusqlite::params![context, now, tokens_limit, name],
                )?;
                // Self-reported HP is stored as an equivalent turn_input
                // against the existing denominator so hp_pct() stays the
                // single source of truth for the percentage.
                let denom: i64 = txn.query_row(
                    "SELECT hp_tokens_limit FROM agents WHERE name = ?1",
                    [name],
                    |r| r.get(0),
                )?;
                let used = denom - (denom * pct as i64 / 100);
                txn.execute(
                    "UPDATE agents SET hp_turn_input = ?1 WHERE name = ?2",
                    rusqlite::params![used, name],
                )?;
            } else {
                txn.execute(
                    "UPDATE agents SET context_summary = ?1, context_updated_ms = ?2, last_seen_ms = ?2
                     WHERE name = ?3",
                    rusqlite::params![context, now, name],
                )?;
            }
            Ok(())
        })
    }

    pub fn set_status(&mut self, name: &str, status: &str) -> StoreResult<()> {
        let now = self.now_ms();
        self.with_write_txn(|txn| {
            txn.execute(
                "UPDATE agents SET status = ?1, last_seen_ms = ?2 WHERE name = ?3",
                rusqlite::params![status, now, name],
            )?;
            Ok(())
        })
    }

    /// HP updates go through a dedicated write path gated by `HpWrite`
    /// rather than `Manage` (see the privilege-leakage design note):
    /// the daemon must never need lead-equivalent authority just to
    /// record telemetry.
    pub fn update_hp(
        &mut self,
        name: &str,
        turn_input_tokens: i64,
        turn_output_tokens: i64,
        context_window: Option<i64>,
    ) -> StoreResult<(u32, Vec<legion_core::AlertLevel>)> {
        let now = self.now_ms();
        self.with_write_txn(|txn| {
            let (denom, prev_alerts_json, cum_in, cum_out): (i64, String, i64, i64) = txn
                .query_row(
                    "SELECT hp_tokens_limit, hp_alerts_fired, hp_input_tokens, hp_output_tokens FROM agents WHERE name = ?1",
                    [name],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
                )?;
            let denom = context_window.unwrap_or(denom);
            let pct = legion_core::hp_pct(turn_input_tokens as u64, denom as u64);
            let prev_alerts: Vec<legion_core::AlertLevel> =
                serde_json::from_str(&prev_alerts_json).unwrap_or_default();
            let (newly_fired, updated_alerts) = legion_core::alerts_to_fire(&prev_alerts, pct);
            txn.execute(
                "UPDATE agents SET hp_turn_input = ?1, hp_turn_output = ?2,
                    hp_input_tokens = ?3, hp_output_tokens = ?4,
                    hp_mode = 'daemon', hp_alerts_fired = ?5, last_seen_ms = ?6
                 WHERE name = ?7",
                rusqlite::params![
                    turn_input_tokens,
                    turn_output_tokens,
                    cum_in + turn_input_tokens,
                    cum_out + turn_output_tokens,
                    serde_json::to_string(&updated_alerts).unwrap_or_default(),
                    now,
                    name
                ],
            )?;
            Ok((pct, newly_fired))
        })
    }

    pub fn check_freshness(&self, name: &str) -> StoreResult<bool> {
        let now = self.now_ms();
        match self.get_agent(name)? {
            Some(agent) => Ok(!agent.is_stale(now)),
            None => Ok(false),
        }
    }

    /// §6 `spawn_party`: bulk-register a crew for a zone in one call.
    /// Each member is registered exactly as `register` would, plus its
    /// `current_zone`/`current_role` are set so `list_crews`/`party_status`
    /// can group them.
    pub fn spawn_party(
        &mut self,
        caller_class: AgentClass,
        zone: &str,
        members: &[(String, AgentClass, Option<String>, Option<String>)],
    ) -> StoreResult<Vec<AgentRecord>> {
        authorize(caller_class, Command::SpawnParty).map_err(KernelError::from)?;
        for (name, class, model, role) in members {
            self.register(name, *class, model.as_deref(), Transport::Daemon)?;
            self.set_zone_and_role(name, Some(zone), role.as_deref())?;
        }
        let names: Vec<&str> = members.iter().map(|(n, ..)| n.as_str()).collect();
        Ok(self
            .who()?
            .into_iter()
            .filter(|a| names.contains(&a.name.as_str()))
            .collect())
    }

    /// §6 `recruit`: register a single new collaborator into a zone.
    pub fn recruit(
        &mut self,
        caller_class: AgentClass,
        name: &str,
        class: AgentClass,
        model: Option<&str>,
        zone: Option<&str>,
        role: Option<&str>,
    ) -> StoreResult<AgentRecord> {
        authorize(caller_class, Command::Recruit).map_err(KernelError::from)?;
        self.register(name, class, model, Transport::Daemon)?;
        if zone.is_some() || role.is_some() {
            self.set_zone_and_role(name, zone, role)?;
        }
        self.get_agent(name)?
            .ok_or_else(|| StoreError::Kernel(KernelError::NotFound(name.to_string())))
    }

    fn set_zone_and_role(&mut self, name: &str, zone: Option<&str>, role: Option<&str>) -> StoreResult<()> {
        let name = name.to_string();
        let zone = zone.map(str::to_string);
        let role = role.map(str::to_string);
        self.with_write_txn(move |txn| {
            txn.execute(
                "UPDATE agents SET current_zone = COALESCE(?1, current_zone),
                    current_role = COALESCE(?2, current_role) WHERE name = ?3",
                rusqlite::params![zone, role, name],
            )?;
            Ok(())
        })
    }

    /// §6 `hand_off_zone`: `to` inherits `from`'s zone/role; `from` is
    /// cleared. Lead-gated via `Manage` like the rest of crew lifecycle.
    pub fn hand_off_zone(&mut self, caller_class: AgentClass, from: &str, to: &str) -> StoreResult<()> {
        authorize(caller_class, Command::HandOffZone).map_err(KernelError::from)?;
        let handoff = self
            .get_agent(from)?
            .ok_or_else(|| StoreError::Kernel(KernelError::NotFound(from.to_string())))?;
        let zone = handoff.current_zone.clone();
        let role = handoff.current_role.clone();
        let from_s = from.to_string();
        let to_s = to.to_string();
        self.with_write_txn(move |txn| {
            txn.execute(
                "UPDATE agents SET current_zone = ?1, current_role = ?2 WHERE name = ?3",
                rusqlite::params![zone, role, to_s],
            )?;
            txn.execute(
                "UPDATE agents SET current_zone = NULL, current_role = NULL WHERE name = ?1",
                [&from_s],
            )?;
            Ok(())
        })
    }

    /// §6 `list_crews`: agents grouped by zone, for anyone with an
    /// already-registered identity (no capability gate beyond `Open`).
    pub fn list_crews(&self) -> StoreResult<std::collections::BTreeMap<String, Vec<AgentRecord>>> {
        let mut crews: std::collections::BTreeMap<String, Vec<AgentRecord>> = std::collections::BTreeMap::new();
        for agent in self.who()? {
            let zone = agent.current_zone.clone().unwrap_or_else(|| "unassigned".to_string());
            crews.entry(zone).or_default().push(agent);
        }
        Ok(crews)
    }

    /// §6 `party_status`: the crew currently holding a zone.
    pub fn party_status(&self, zone: &str) -> StoreResult<Vec<AgentRecord>> {
        Ok(self
            .who()?
            .into_iter()
            .filter(|a| a.current_zone.as_deref() == Some(zone))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use legion_core::FakeClock;
    use std::sync::Arc;

    fn store(start_ms: i64) -> Store {
        Store::open_in_memory(Arc::new(FakeClock::new(start_ms))).unwrap()
    }

    #[test]
    fn register_is_idempotent_on_name() {
        let mut s = store(0);
        s.register("coder-1", AgentClass::Coder, None, Transport::Daemon)
            .unwrap();
        s.register("coder-1", AgentClass::Coder, Some("opus"), Transport::Daemon)
            .unwrap();
        let agents = s.who().unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].model.as_deref(), Some("opus"));
    }

    #[test]
    fn fresh_context_is_not_stale() {
        let mut s = store(0);
        s.register("coder-1", AgentClass::Coder, None, Transport::Daemon)
            .unwrap();
        s.set_context("coder-1", "working", None, None).unwrap();
        assert!(s.check_freshness("coder-1").unwrap());
    }

    #[test]
    fn context_older_than_staleness_window_is_stale() {
        let mut s = store(0);
        s.register("coder-1", AgentClass::Coder, None, Transport::Daemon)
            .unwrap();
        s.set_context("coder-1", "working", None, None).unwrap();
        // Coder staleness window is 5 minutes.
        let agent = s.get_agent("coder-1").unwrap().unwrap();
        assert!(!agent.is_stale(6 * 60 * 1000));
        assert!(agent.is_stale(0 + 6 * 60 * 1000 + 1));
    }

    #[test]
    fn update_hp_fires_alert_on_first_crossing() {
        let mut s = store(0);
        s.register("coder-1", AgentClass::Coder, None, Transport::Daemon)
            .unwrap();
        let (pct, fired) = s.update_hp("coder-1", 190_000, 1_000, Some(200_000)).unwrap();
        assert_eq!(pct, 5);
        assert!(fired.contains(&legion_core::AlertLevel::TwentyFive));
        assert!(fired.contains(&legion_core::AlertLevel::Ten));
        let (_, fired_again) = s.update_hp("coder-1", 190_000, 1_000, Some(200_000)).unwrap();
        assert!(fired_again.is_empty());
    }

    #[test]
    fn cumulative_tokens_are_accounting_only_and_keep_summing() {
        let mut s = store(0);
        s.register("coder-1", AgentClass::Coder, None, Transport::Daemon)
            .unwrap();
        s.update_hp("coder-1", 1_000, 500, Some(200_000)).unwrap();
        s.update_hp("coder-1", 2_000, 700, Some(200_000)).unwrap();
        let agent = s.get_agent("coder-1").unwrap().unwrap();
        assert_eq!(agent.hp_input_tokens, 3_000);
        assert_eq!(agent.hp_output_tokens, 1_200);
    }
}
