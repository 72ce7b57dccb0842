//! The engine facade: `generate`, `replace`, and `explain`.
//!
//! One request = one job. The engine captures provider snapshots at entry,
//! runs the beam search or replace planning under a deadline, and returns
//! tagged results. It owns no HTTP surface; hosts call it in-process and
//! feed wardrobe/rule-set change events through the bus for cache
//! invalidation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::assembly::{Assembler, Bundle, Deadline};
use crate::constraints::ConstraintEngine;
use crate::errors::EngineError;
use crate::events::{EngineEvent, EngineEventBus};
use crate::index::IndexQuery;
use crate::items::SlotClass;
use crate::profile::Context;
use crate::providers::{Clock, ProfileProvider, WearHistoryProvider};
use crate::replace::{AlternativesResult, ReplacePlanner};
use crate::retrieval::{CandidateRetriever, ShortlistCache};
use crate::rules::RuleSetProvider;
use crate::scoring::{ComponentReport, DeltaCache, Scorer};

/// Engine tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Concurrent requests admitted before `BUSY`.
    pub max_inflight: usize,
    /// Bounded size of the shortlist LRU.
    pub shortlist_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_inflight: 64,
            shortlist_cache_capacity: 256,
        }
    }
}

/// A generated bundle with its full scoring story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleResult {
    pub bundle: Bundle,
    pub score: f64,
    /// prefer_strict break deduction already applied to `score`.
    pub penalty: f64,
    pub components: Vec<ComponentReport>,
    /// True when the deadline expired and this is the best terminal found
    /// rather than the exhaustive winner.
    pub partial: bool,
    pub trace_id: String,
    /// Recorded for future stochastic extensions; unused by ranking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub generated_at: DateTime<Utc>,
}

impl BundleResult {
    /// The component report for one key, if present.
    pub fn component(&self, key: crate::scoring::ComponentKey) -> Option<&ComponentReport> {
        self.components.iter().find(|c| c.key == key)
    }
}

/// Per-slot and per-component explanation of a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub aggregate: f64,
    pub penalty: f64,
    pub per_slot: BTreeMap<SlotClass, String>,
    pub components: Vec<ComponentReport>,
}

/// The assembly engine.
#[derive(Debug)]
pub struct Engine {
    index: Arc<dyn IndexQuery>,
    rulesets: Arc<dyn RuleSetProvider>,
    profiles: Arc<dyn ProfileProvider>,
    history: Arc<dyn WearHistoryProvider>,
    clock: Arc<dyn Clock>,
    retriever: CandidateRetriever,
    constraints: ConstraintEngine,
    scorer: Scorer,
    bus: Arc<EngineEventBus>,
    /// Inflight admission; a request holds one permit end to end.
    inflight: Arc<Semaphore>,
    config: EngineConfig,
}

impl Engine {
    /// Build an engine over the host's providers with default config.
    pub fn new(
        index: Arc<dyn IndexQuery>,
        rulesets: Arc<dyn RuleSetProvider>,
        profiles: Arc<dyn ProfileProvider>,
        history: Arc<dyn WearHistoryProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_config(
            index,
            rulesets,
            profiles,
            history,
            clock,
            EngineConfig::default(),
        )
    }

    /// Build an engine with explicit tuning.
    pub fn with_config(
        index: Arc<dyn IndexQuery>,
        rulesets: Arc<dyn RuleSetProvider>,
        profiles: Arc<dyn ProfileProvider>,
        history: Arc<dyn WearHistoryProvider>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let cache = Arc::new(ShortlistCache::new(config.shortlist_cache_capacity));
        let bus = Arc::new(EngineEventBus::new());
        {
            let cache = Arc::clone(&cache);
            bus.register(Arc::new(move |event: &EngineEvent| match event {
                EngineEvent::RuleSetPublished { version } => {
                    log::debug!("rule set v{version} published; clearing shortlists");
                    cache.clear();
                }
                other => {
                    if let Some(user_id) = other.user_id() {
                        cache.invalidate_user(user_id);
                    }
                }
            }));
        }
        Self {
            retriever: CandidateRetriever::new(Arc::clone(&index), cache),
            index,
            rulesets,
            profiles,
            history,
            clock,
            constraints: ConstraintEngine::default(),
            scorer: Scorer::default(),
            bus,
            inflight: Arc::new(Semaphore::new(config.max_inflight)),
            config,
        }
    }

    /// The event bus hosts feed change notifications through.
    pub fn event_bus(&self) -> &Arc<EngineEventBus> {
        &self.bus
    }

    /// Convenience: emit one event on the bus.
    pub fn notify(&self, event: &EngineEvent) {
        self.bus.emit(event);
    }

    /// Requests currently in flight.
    pub fn inflight(&self) -> usize {
        self.config.max_inflight - self.inflight.available_permits()
    }

    fn acquire(&self) -> Result<OwnedSemaphorePermit, EngineError> {
        Arc::clone(&self.inflight)
            .try_acquire_owned()
            .map_err(|_| EngineError::Busy)
    }

    /// Assemble a bundle for a user and occasion context.
    pub async fn generate(
        &self,
        user_id: &str,
        context: &Context,
        allow_catalog: bool,
        budget: Duration,
    ) -> Result<BundleResult, EngineError> {
        self.generate_seeded(user_id, context, allow_catalog, budget, None)
            .await
    }

    /// [`Engine::generate`] with a recorded seed for future stochastic
    /// extensions. The seed never influences ranking today.
    pub async fn generate_seeded(
        &self,
        user_id: &str,
        context: &Context,
        allow_catalog: bool,
        budget: Duration,
        seed: Option<u64>,
    ) -> Result<BundleResult, EngineError> {
        let _guard = self.acquire()?;
        context.validate()?;

        let ruleset = self.rulesets.current();
        let profile = self
            .profiles
            .snapshot(user_id)
            .await
            .ok_or_else(|| EngineError::InvalidInput {
                reason: format!("unknown user '{user_id}'"),
            })?;
        profile.validate()?;

        let dressiness = context.effective_dressiness(&profile);
        let template = ruleset
            .template_for(&context.occasion, dressiness, &profile)
            .ok_or_else(|| EngineError::NoTemplate {
                occasion: context.occasion.clone(),
                dressiness,
            })?;
        log::debug!(
            "generate: user {user_id}, template {}, dressiness {dressiness}",
            template.template_id
        );

        let history = self
            .history
            .recent(user_id, ruleset.thresholds.novelty_window)
            .await;
        let deadline = Deadline::within(budget);
        let deltas = DeltaCache::new();

        let assembler = Assembler {
            retriever: &self.retriever,
            constraints: &self.constraints,
            scorer: &self.scorer,
            index: &self.index,
            ruleset: &ruleset,
            template,
            profile: &profile,
            context,
            history: &history,
            user_id,
            allow_catalog,
            deadline,
            deltas: &deltas,
        };
        let outcome = assembler.assemble().await?;

        let slots: BTreeMap<SlotClass, String> = outcome
            .state
            .entries()
            .map(|(slot, item)| (slot, item.item_id.clone()))
            .collect();
        Ok(BundleResult {
            bundle: Bundle {
                tie_break: outcome.state.tie_break_token(),
                slots,
                template_id: template.template_id.clone(),
                ruleset_version: ruleset.version,
            },
            score: outcome.breakdown.aggregate,
            penalty: outcome.breakdown.penalty,
            components: outcome.breakdown.components,
            partial: outcome.partial,
            trace_id: Uuid::new_v4().to_string(),
            seed,
            generated_at: self.clock.now(),
        })
    }

    /// Rank replacements for one slot of an existing bundle.
    ///
    /// `locks` defaults to every slot except the target; cascade plans may
    /// name locked slots, flagged through `requires_cascade`.
    #[allow(clippy::too_many_arguments)]
    pub async fn replace(
        &self,
        user_id: &str,
        bundle: &Bundle,
        slot: SlotClass,
        locks: Option<&BTreeSet<SlotClass>>,
        context: &Context,
        allow_catalog: bool,
        budget: Duration,
    ) -> Result<AlternativesResult, EngineError> {
        let _guard = self.acquire()?;
        context.validate()?;

        let ruleset = self.rulesets.current();
        let profile = self
            .profiles
            .snapshot(user_id)
            .await
            .ok_or_else(|| EngineError::InvalidInput {
                reason: format!("unknown user '{user_id}'"),
            })?;
        profile.validate()?;
        let history = self
            .history
            .recent(user_id, ruleset.thresholds.novelty_window)
            .await;
        let deadline = Deadline::within(budget);
        let deltas = DeltaCache::new();

        let planner = ReplacePlanner {
            retriever: &self.retriever,
            constraints: &self.constraints,
            scorer: &self.scorer,
            index: &self.index,
            ruleset: &ruleset,
            profile: &profile,
            context,
            history: &history,
            user_id,
            allow_catalog,
            deadline,
            deltas: &deltas,
        };
        planner.plan(bundle, slot, locks).await
    }

    /// Per-slot and per-component explanations for a result.
    pub fn explain(&self, result: &BundleResult) -> Explanation {
        let per_slot = result
            .bundle
            .slots
            .iter()
            .map(|(slot, item_id)| (*slot, format!("{slot:?} filled by '{item_id}'")))
            .collect();
        Explanation {
            aggregate: result.score,
            penalty: result.penalty,
            per_slot,
            components: result.components.clone(),
        }
    }
}
