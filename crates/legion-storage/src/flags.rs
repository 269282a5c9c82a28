//! §4.L Process-wide emergency flags.

use crate::error::StoreResult;
use crate::store::Store;
use legion_core::{authorize, AgentClass, Command, KernelError};

impl Store {
    pub fn is_flag_set(&self, key: &str) -> StoreResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM flags WHERE key = ?1",
            [key],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    pub(crate) fn set_flag_in_txn(
        txn: &rusqlite::Transaction<'_>,
        key: &str,
        set_by: &str,
        now: i64,
    ) -> rusqlite::Result<()> {
        txn.execute(
            "INSERT INTO flags (key, value, set_by, set_at_ms) VALUES (?1, 'set', ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET set_by = excluded.set_by, set_at_ms = excluded.set_at_ms",
            rusqlite::params![key, set_by, now],
        )?;
        Ok(())
    }

    pub fn clear_moon_crash(&mut self, caller_class: AgentClass) -> StoreResult<()> {
        authorize(caller_class, Command::ClearMoonCrash).map_err(KernelError::from)?;
        self.with_write_txn(|txn| {
            txn.execute("DELETE FROM flags WHERE key = 'moon_crash'", [])?;
            Ok(())
        })
    }

    pub fn set_stand_down(&mut self, caller_class: AgentClass, set_by: &str) -> StoreResult<()> {
        authorize(caller_class, Command::StandDown).map_err(KernelError::from)?;
        let now = self.now_ms();
        self.with_write_txn(|txn| {
            Self::set_flag_in_txn(txn, "stand_down", set_by, now)?;
            Ok(())
        })
    }

    /// Lead-only (§6). Unlike `stand_down`, this flag is scoped to one
    /// agent by name — its poll loop exits gracefully, nobody else's does.
    pub fn retire_agent(&mut self, caller_class: AgentClass, name: &str) -> StoreResult<()> {
        authorize(caller_class, Command::RetireAgent).map_err(KernelError::from)?;
        let now = self.now_ms();
        let key = retire_key(name);
        self.with_write_txn(move |txn| {
            Self::set_flag_in_txn(txn, &key, caller_class.as_str(), now)?;
            Ok(())
        })
    }

    pub fn is_retired(&self, name: &str) -> StoreResult<bool> {
        self.is_flag_set(&retire_key(name))
    }
}

fn retire_key(name: &str) -> String {
    format!("retire:{name}")
}
