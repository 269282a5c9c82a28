//! §3/§5 AgentSignal: the durable record backing `interrupt`/`resume`
//! cancellation. A daemon's poll loop checks for a pending signal
//! addressed to its own agent name once per turn.

use crate::error::StoreResult;
use crate::store::Store;
use legion_core::SignalId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Interrupt,
    Resume,
}

impl SignalKind {
    fn as_str(self) -> &'static str {
        match self {
            SignalKind::Interrupt => "interrupt",
            SignalKind::Resume => "resume",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "resume" => SignalKind::Resume,
            _ => SignalKind::Interrupt,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSignal {
    pub id: String,
    pub agent: String,
    pub kind: SignalKind,
    pub payload: Option<String>,
    pub set_at_ms: i64,
}

impl Store {
    pub fn interrupt(&mut self, agent: &str, payload: Option<&str>) -> StoreResult<SignalId> {
        self.set_signal(agent, SignalKind::Interrupt, payload)
    }

    /// `payload` carries the message to redeliver on the agent's next poll.
    pub fn resume(&mut self, agent: &str, payload: Option<&str>) -> StoreResult<SignalId> {
        self.set_signal(agent, SignalKind::Resume, payload)
    }

    fn set_signal(&mut self, agent: &str, kind: SignalKind, payload: Option<&str>) -> StoreResult<SignalId> {
        let now = self.now_ms();
        let id = SignalId::new(self.next_id(SignalId::PREFIX));
        let agent = agent.to_string();
        let payload = payload.map(str::to_string);
        let id_str = id.as_str().to_string();
        let kind_str = kind.as_str();
        self.with_write_txn(move |txn| {
            txn.execute(
                "INSERT INTO agent_signals (id, agent, kind, payload, set_at_ms, consumed_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
                rusqlite::params![id_str, agent, kind_str, payload, now],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    /// Fetches the oldest unconsumed signal for `agent`, atomically
    /// marking it consumed. A daemon calls this once per poll cycle.
    pub fn poll_signal(&mut self, agent: &str) -> StoreResult<Option<AgentSignal>> {
        let now = self.now_ms();
        let agent = agent.to_string();
        self.with_write_txn(move |txn| {
            let row: Option<(String, String, Option<String>, i64)> = txn
                .query_row(
                    "SELECT id, kind, payload, set_at_ms FROM agent_signals
                     WHERE agent = ?1 AND consumed_at_ms IS NULL
                     ORDER BY set_at_ms ASC LIMIT 1",
                    [&agent],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
                )
                .ok();
            let Some((id, kind, payload, set_at_ms)) = row else {
                return Ok(None);
            };
            txn.execute(
                "UPDATE agent_signals SET consumed_at_ms = ?1 WHERE id = ?2",
                rusqlite::params![now, id],
            )?;
            Ok(Some(AgentSignal {
                id,
                agent: agent.clone(),
                kind: SignalKind::parse(&kind),
                payload,
                set_at_ms,
            }))
        })
    }
}
