//! §4.K daemon runtime: boot sequence plus the single-threaded
//! cooperative poll loop. Concurrency between daemons is coordinated
//! only through the datastore (`legion_storage::Store`); nothing in here
//! shares state across processes.

use crate::circuit_breaker::{CircuitBreaker, Trip};
use crate::config::DaemonConfig;
use crate::rolling_buffer::RollingBuffer;
use crate::state_file::{AlertSink, DaemonState, StateFile};
use crate::usage_log::UsageLog;
use legion_core::AgentClass;
use legion_providers::{Provider, ProviderHandle, ProviderSpawnConfig};
use legion_storage::{SignalKind, Store};
use std::path::PathBuf;
use std::time::Duration;

/// What happened on one pass through the poll loop, for the binary's
/// top-level `while` to decide whether to keep looping.
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// `stand_down` or this agent's own retire flag is set.
    GracefulExit,
    /// Inbox + tasks were empty; caller should sleep the returned duration.
    Idle { sleep_for_ms: u64 },
    /// A turn ran (successfully or not).
    Worked { succeeded: bool },
}

pub struct Daemon<P: Provider> {
    store: Store,
    provider: P,
    agent: String,
    class: AgentClass,
    project: String,
    config: DaemonConfig,
    work_dir: PathBuf,
    boot_rules: String,
    buffer: RollingBuffer,
    breaker: CircuitBreaker,
    inject_history_next_turn: bool,
    empty_polls_in_a_row: u32,
    state_file: StateFile,
    alert_sink: AlertSink,
    usage_log: UsageLog,
    /// The handle backing whatever turn is currently in flight, so an
    /// `interrupt` signal observed on the next poll has something to kill.
    active_handle: Option<ProviderHandle>,
    /// Payload from a `resume` signal, redelivered at the front of the
    /// next turn's prompt and then cleared.
    pending_resume_payload: Option<String>,
}

impl<P: Provider> Daemon<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        provider: P,
        agent: String,
        class: AgentClass,
        project: String,
        config: DaemonConfig,
        work_dir: PathBuf,
        boot_rules: String,
    ) -> Self {
        let state_file = StateFile::new(&work_dir, &agent);
        let alert_sink = AlertSink::new(&work_dir);
        let usage_log = UsageLog::new(&work_dir);
        Self {
            buffer: RollingBuffer::new(config.max_rolling_history_tokens),
            breaker: CircuitBreaker::new(config.circuit_breaker_threshold, config.backoff_initial, config.backoff_max),
            store,
            provider,
            agent,
            class,
            project,
            config,
            work_dir,
            boot_rules,
            inject_history_next_turn: false,
            empty_polls_in_a_row: 0,
            state_file,
            alert_sink,
            usage_log,
            active_handle: None,
            pending_resume_payload: None,
        }
    }

    /// §4.K boot sequence: register, announce, report ready.
    pub fn boot(&mut self, model: Option<&str>) -> Result<(), legion_storage::StoreError> {
        self.store
            .register(&self.agent, self.class, model, legion_core::Transport::Daemon)?;
        self.store.set_context(&self.agent, "just started", None, None)?;
        self.store.set_status(&self.agent, "ready for orders")?;
        self.write_state("ready for orders");
        Ok(())
    }

    fn write_state(&self, status: &str) {
        let state = DaemonState {
            pid: std::process::id(),
            status: status.to_string(),
            updated_at_ms: self.store.now_ms(),
            consecutive_failures: self.breaker.consecutive_failures(),
            resume_ready: self.inject_history_next_turn,
        };
        if let Err(e) = self.state_file.write(&state) {
            tracing::warn!(error = %e, "failed to write daemon state file");
        }
    }

    /// Step 1 of the poll loop (§4.K): `stand_down` or this agent's own
    /// retire record means graceful exit, code 3, before anything else.
    fn should_exit(&self) -> Result<bool, legion_storage::StoreError> {
        Ok(self.store.is_flag_set("stand_down")? || self.store.is_retired(&self.agent)?)
    }

    /// Runs one pass of the poll loop.
    pub async fn poll_once(&mut self) -> Result<PollOutcome, legion_storage::StoreError> {
        if self.should_exit()? {
            tracing::info!(agent = %self.agent, "stand_down or retire observed, exiting");
            self.write_state("stood down");
            return Ok(PollOutcome::GracefulExit);
        }

        if let Some(signal) = self.store.poll_signal(&self.agent)? {
            tracing::info!(agent = %self.agent, kind = ?signal.kind, "consumed pending signal");
            match signal.kind {
                SignalKind::Interrupt => {
                    if let Some(handle) = self.active_handle.take() {
                        self.provider.kill(&handle);
                    }
                    self.write_state("interrupted");
                    return Ok(PollOutcome::Idle {
                        sleep_for_ms: self.config.poll_interval_min.as_millis() as u64,
                    });
                }
                SignalKind::Resume => {
                    self.pending_resume_payload = signal.payload;
                }
            }
        }

        let unread = self.store.check_inbox(&self.agent)?;
        let assigned_tasks: Vec<_> = self
            .store
            .list_tasks(&self.project, None)?
            .into_iter()
            .filter(|t| t.assigned_to.as_deref() == Some(self.agent.as_str()))
            .collect();

        if unread.is_empty() && assigned_tasks.is_empty() {
            self.empty_polls_in_a_row += 1;
            let sleep_for = self.backoff_for_empty_polls();
            return Ok(PollOutcome::Idle {
                sleep_for_ms: sleep_for.as_millis() as u64,
            });
        }
        self.empty_polls_in_a_row = 0;

        let payload_ids: Vec<String> = unread.iter().map(|m| m.id.to_string()).collect();
        let prompt = self.build_prompt(&unread);

        self.write_state("working");
        match self.run_turn(&prompt, &payload_ids).await {
            Ok(()) => {
                self.breaker.record_success();
                self.write_state("ready for orders");
                Ok(PollOutcome::Worked { succeeded: true })
            }
            Err(e) => {
                let trip = self.breaker.record_failure(&payload_ids);
                if matches!(trip, Trip::JustTripped | Trip::StillTripped) {
                    if let Err(alert_err) = self.alert_sink.fire_poll_failure(
                        &self.agent,
                        self.store.now_ms(),
                        self.breaker.consecutive_failures(),
                    ) {
                        tracing::error!(error = %alert_err, "failed to write poll-failure alert");
                    }
                }
                tracing::warn!(error = %e, agent = %self.agent, "provider turn failed");
                self.write_state("provider failure, backing off");
                Ok(PollOutcome::Worked { succeeded: false })
            }
        }
    }

    /// Mandatory back-off on empty polls (§4.K): doubles each empty poll,
    /// capped at `poll_interval_max`, floor `poll_interval_min`.
    fn backoff_for_empty_polls(&self) -> Duration {
        let shift = self.empty_polls_in_a_row.saturating_sub(1).min(16);
        let scaled = self
            .config
            .poll_interval_min
            .as_millis()
            .saturating_mul(1u128 << shift);
        Duration::from_millis(scaled.min(self.config.poll_interval_max.as_millis()) as u64)
    }

    /// The back-off to sleep before the *next* turn after a failed one,
    /// driven by the circuit breaker rather than the empty-poll counter.
    pub fn failure_backoff(&self) -> Duration {
        self.breaker.backoff()
    }

    fn build_prompt(&mut self, unread: &[legion_storage::Message]) -> String {
        let mut prompt = String::new();
        prompt.push_str(&self.boot_rules);
        prompt.push('\n');
        if let Some(payload) = self.pending_resume_payload.take() {
            prompt.push_str(&format!("-- resumed --\n{payload}\n"));
        }
        if self.inject_history_next_turn {
            if let Ok(briefing) = self.store.cold_start(&self.agent, &self.project) {
                prompt.push_str(&format!(
                    "-- recovery briefing --\n{}\n",
                    serde_json::to_string(&briefing).unwrap_or_default()
                ));
            }
            if !self.buffer.is_empty() {
                prompt.push_str("-- rolling history --\n");
                prompt.push_str(&self.buffer.snapshot());
                prompt.push('\n');
            }
            self.inject_history_next_turn = false;
        }
        for message in unread {
            prompt.push_str(&format!("[{}] {}\n", message.from_agent, message.content));
        }
        if prompt.len() > self.config.max_prompt_chars {
            let start = prompt.len() - self.config.max_prompt_chars;
            prompt = prompt[start..].to_string();
        }
        prompt
    }

    async fn run_turn(
        &mut self,
        prompt: &str,
        _payload_ids: &[String],
    ) -> Result<(), legion_providers::ProviderError> {
        let config = ProviderSpawnConfig {
            agent_id: self.agent.clone(),
            agent_class: self.class.as_str().to_string(),
            command: "claude".to_string(),
            args: vec![],
            env: vec![],
            workspace_path: self.work_dir.clone(),
            project_root: self.work_dir.clone(),
            resume_session_id: None,
            provider_config: Default::default(),
        };
        let handle = self.provider.spawn(config).await?;
        self.active_handle = Some(handle.clone());

        let result = self.drain_turn(&handle, prompt).await;
        self.active_handle = None;
        let (counted_turn_input, counted_turn_output, context_window) = result?;

        let failing = self.breaker.consecutive_failures() >= self.config.circuit_breaker_threshold;
        if counted_turn_input > 0 || counted_turn_output > 0 {
            let now = self.store.now_ms();
            if !failing {
                if let Err(e) = self.store.update_hp(
                    &self.agent,
                    counted_turn_input as i64,
                    counted_turn_output as i64,
                    context_window.map(|c| c as i64),
                ) {
                    tracing::warn!(error = %e, agent = %self.agent, "failed to persist hp update");
                }
            }
            if let Err(e) = self.usage_log.append(
                &self.agent,
                now,
                counted_turn_input,
                counted_turn_output,
                !failing,
            ) {
                tracing::warn!(error = %e, "failed to append usage log record");
            }
        }

        Ok(())
    }

    /// Writes the prompt, drains the event stream, and tallies usage.
    /// Split out of `run_turn` so the caller can always clear
    /// `active_handle` on the way out, success or failure alike.
    async fn drain_turn(
        &mut self,
        handle: &legion_providers::ProviderHandle,
        prompt: &str,
    ) -> Result<(u64, u64, Option<u64>), legion_providers::ProviderError> {
        self.provider.write_prompt(handle, prompt).await?;
        let mut stream = self.provider.read_stream(handle)?;

        let mut counted_turn_input: u64 = 0;
        let mut counted_turn_output: u64 = 0;
        let mut context_window: Option<u64> = None;

        while let Some(event) = tokio::time::timeout(self.config.no_output_timeout, stream.recv())
            .await
            .ok()
            .flatten()
        {
            self.buffer.push(&event.text);
            if self.provider.detect_compaction(&event) {
                self.inject_history_next_turn = true;
                tracing::info!(agent = %self.agent, "compaction detected");
            }
            let usage = self.provider.extract_usage(&event);
            if let Some(turn_input) = usage.turn_input_tokens {
                counted_turn_input += turn_input;
            }
            if let Some(turn_output) = usage.turn_output_tokens {
                counted_turn_output += turn_output;
            }
            if usage.context_window.is_some() {
                context_window = usage.context_window;
            }
        }

        Ok((counted_turn_input, counted_turn_output, context_window))
    }
}
