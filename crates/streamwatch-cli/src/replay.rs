//! Scenario replay against in-memory collaborators

use crate::scenario::Scenario;
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use streamwatch_core::{
    Dispatcher, EngineConfig, EngineError, EventOutcome, EventPump, FieldTemplateRenderer,
    MemoryMessageTransport, MemoryRoleTransport, PumpStats, RoleCall, SentMessage,
    StreamingEngine,
};
use streamwatch_ledger::{Ledger, MemoryLedger};
use streamwatch_policy::{CachedPolicyStore, MemoryPolicyStore};
use streamwatch_roster::MemoryRoster;
use streamwatch_types::{GuildId, MemberId};
use tracing::info;

/// Replay options
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Engine configuration
    pub config: EngineConfig,
    /// Deliver events through the concurrent [`EventPump`]
    pub concurrent: bool,
}

/// Result of one replayed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    /// Position in the scenario
    pub index: usize,
    /// Event kind
    pub event: &'static str,
    /// Guild
    pub guild: GuildId,
    /// Human readable outcome
    pub outcome: String,
}

/// Everything a replay did
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    /// Per-step outcomes (sequential replay only)
    pub steps: Vec<StepResult>,
    /// Pump totals (concurrent replay only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump: Option<PumpStats>,
    /// Role calls in issue order
    pub role_calls: Vec<RoleCall>,
    /// Messages in send order
    pub messages: Vec<SentMessage>,
    /// Ledger contents per guild after the replay
    pub streaming: BTreeMap<GuildId, Vec<MemberId>>,
}

/// Replay `scenario`
///
/// # Errors
/// Invalid scenario (duplicate guilds, policies with broken filters) or a
/// ledger that cannot be read back.
pub async fn replay(scenario: &Scenario, options: ReplayOptions) -> anyhow::Result<ReplayReport> {
    scenario.validate()?;
    options.config.validate()?;

    let roster = Arc::new(MemoryRoster::new());
    scenario.seed(&roster);

    let store = Arc::new(MemoryPolicyStore::new());
    for guild in &scenario.guilds {
        store
            .set_policy(guild.id, guild.policy.clone())
            .with_context(|| format!("policy for guild {}", guild.id))?;
    }
    let policies = Arc::new(CachedPolicyStore::new(
        Arc::clone(&store),
        options.config.policy_cache_capacity,
        options.config.policy_cache_ttl(),
    ));

    let ledger = Arc::new(MemoryLedger::new());
    let roles = Arc::new(MemoryRoleTransport::new());
    let messages = Arc::new(MemoryMessageTransport::new());
    let dispatcher = Dispatcher::new(
        roles.clone(),
        messages.clone(),
        Arc::new(FieldTemplateRenderer::new()),
    );
    let engine = Arc::new(StreamingEngine::new(
        policies.clone(),
        roster.clone(),
        ledger.clone(),
        dispatcher,
        options.config.clone(),
    ));

    let mut report = ReplayReport::default();
    if options.concurrent {
        let (tx, pump) = EventPump::channel(Arc::clone(&engine), options.config.event_queue_capacity);
        let runner = tokio::spawn(pump.run());
        for step in &scenario.events {
            if let Some(policy) = &step.policy {
                store.set_policy(step.event.guild(), policy.clone())?;
                policies.invalidate(step.event.guild()).await;
            }
            step.apply(&roster);
            tx.send(step.event).await.context("event pump stopped early")?;
        }
        drop(tx);
        report.pump = Some(runner.await.context("event pump panicked")?);
    } else {
        for (index, step) in scenario.events.iter().enumerate() {
            if let Some(policy) = &step.policy {
                store.set_policy(step.event.guild(), policy.clone())?;
                policies.invalidate(step.event.guild()).await;
            }
            step.apply(&roster);
            let result = engine.handle(step.event).await;
            report.steps.push(StepResult {
                index,
                event: step.event.kind(),
                guild: step.event.guild(),
                outcome: describe(&result),
            });
        }
    }

    report.role_calls = roles.calls();
    report.messages = messages.sent();
    for guild in &scenario.guilds {
        report.streaming.insert(guild.id, ledger.members(guild.id).await?);
    }
    info!(
        events = scenario.events.len(),
        role_calls = report.role_calls.len(),
        messages = report.messages.len(),
        "replay finished"
    );
    Ok(report)
}

fn describe(result: &Result<EventOutcome, EngineError>) -> String {
    match result {
        Ok(EventOutcome::Reconciled(Some(t))) => t.to_string(),
        Ok(EventOutcome::Reconciled(None)) => "no change".to_string(),
        Ok(EventOutcome::Scanned(report)) => format!(
            "scanned {} members: {} started, {} stopped, {} deferred, {} errors",
            report.members_seen,
            report.started(),
            report.stopped(),
            report.deferred,
            report.errors,
        ),
        Ok(EventOutcome::Ignored(reason)) => format!("ignored ({reason:?})"),
        Err(e) => format!("error: {e}"),
    }
}
