//! Single-slot replacement with cascade planning.
//!
//! Holds every other slot fixed, re-ranks alternatives for the target slot
//! under the current item's cohesion policy, and emits cascade plans when
//! swapping would break a strict co-ord set.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::assembly::{Bundle, Deadline, PartialBundle};
use crate::constraints::{ConstraintCtx, ConstraintEngine};
use crate::errors::EngineError;
use crate::index::IndexQuery;
use crate::items::{CohesionPolicy, CoordGroup, Item, SlotClass};
use crate::profile::{Context, Profile};
use crate::retrieval::CandidateRetriever;
use crate::rules::{RuleSet, Template};
use crate::scoring::{DeltaCache, ScoreInputs, Scorer};

/// One further replacement entailed by breaking a strict set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeStep {
    pub slot: SlotClass,
    pub replace_with: String,
}

/// The full set of additional replacements for one alternative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadePlan {
    pub steps: Vec<CascadeStep>,
}

/// A ranked replacement candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub item_id: String,
    pub new_score: f64,
    pub delta_vs_current: f64,
    pub requires_cascade: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cascade_plan: Option<CascadePlan>,
    pub coherence_reason: String,
}

/// Ordered alternatives for one replace request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativesResult {
    pub slot: SlotClass,
    pub current_item_id: String,
    pub current_score: f64,
    pub ruleset_version: u64,
    pub alternatives: Vec<Alternative>,
}

/// Per-request replace planning.
pub struct ReplacePlanner<'a> {
    pub retriever: &'a CandidateRetriever,
    pub constraints: &'a ConstraintEngine,
    pub scorer: &'a Scorer,
    pub index: &'a Arc<dyn IndexQuery>,
    pub ruleset: &'a RuleSet,
    pub profile: &'a Profile,
    pub context: &'a Context,
    pub history: &'a [String],
    pub user_id: &'a str,
    pub allow_catalog: bool,
    pub deadline: Deadline,
    pub deltas: &'a DeltaCache,
}

impl ReplacePlanner<'_> {
    /// Rank alternatives for `slot` in `bundle`.
    ///
    /// `locks` defaults to every other slot; the target slot itself must
    /// not be locked. Cascade plans are exempt from locks by design: they
    /// exist to surface which locked slots a group switch would touch.
    pub async fn plan(
        &self,
        bundle: &Bundle,
        slot: SlotClass,
        locks: Option<&BTreeSet<SlotClass>>,
    ) -> Result<AlternativesResult, EngineError> {
        if locks.is_some_and(|l| l.contains(&slot)) {
            return Err(EngineError::InvalidInput {
                reason: format!("target slot {slot:?} is locked"),
            });
        }
        let template = self.template_of(bundle)?;
        let items = self.resolve_bundle_items(bundle).await?;
        let current = items
            .get(&slot)
            .cloned()
            .ok_or_else(|| EngineError::InvalidInput {
                reason: format!("bundle has no item in {slot:?}"),
            })?;

        let mut fixed = PartialBundle::new();
        for (s, item) in &items {
            if *s != slot {
                fixed = fixed.committing(*s, Arc::clone(item));
            }
        }

        let candidates = self
            .retriever
            .shortlist(
                self.user_id,
                slot,
                self.ruleset,
                self.context,
                self.profile,
                self.allow_catalog,
                self.ruleset.thresholds.anchor_shortlist,
            )
            .await?;

        let mut groups = self.resolve_groups(&items, &candidates).await?;
        let current_state = fixed.committing(slot, Arc::clone(&current));
        let current_score = self.rescore(&current_state, &groups);
        let policy = current.set_cohesion_policy.unwrap_or(CohesionPolicy::Loose);

        let mut alternatives: Vec<(u8, Alternative)> = Vec::new();
        for candidate in candidates.iter() {
            if self.deadline.expired() {
                log::warn!("replace deadline expired; returning alternatives ranked so far");
                break;
            }
            if candidate.item_id == current.item_id {
                continue;
            }
            let ranked = match policy {
                CohesionPolicy::Strict => {
                    self.strict_alternative(
                        &items, &fixed, slot, &current, candidate, &mut groups, template,
                    )
                    .await?
                }
                CohesionPolicy::PreferStrict => self.prefer_strict_alternative(
                    &fixed, slot, &current, candidate, &groups, template,
                ),
                CohesionPolicy::Loose => {
                    self.loose_alternative(&fixed, slot, candidate, &groups, template)
                }
            };
            if let Some(ranked) = ranked {
                alternatives.push(ranked);
            }
        }

        alternatives.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| b.1.new_score.total_cmp(&a.1.new_score))
                .then_with(|| a.1.item_id.cmp(&b.1.item_id))
        });
        let alternatives: Vec<Alternative> = alternatives
            .into_iter()
            .map(|(_, mut alt)| {
                alt.delta_vs_current = alt.new_score - current_score;
                alt
            })
            .collect();

        Ok(AlternativesResult {
            slot,
            current_item_id: current.item_id.clone(),
            current_score,
            ruleset_version: self.ruleset.version,
            alternatives,
        })
    }

    /// Strict policy: same-group swaps, or whole-group cascades.
    #[allow(clippy::too_many_arguments)]
    async fn strict_alternative(
        &self,
        items: &BTreeMap<SlotClass, Arc<Item>>,
        fixed: &PartialBundle,
        slot: SlotClass,
        current: &Arc<Item>,
        candidate: &Arc<Item>,
        groups: &mut BTreeMap<String, Arc<CoordGroup>>,
        template: &Template,
    ) -> Result<Option<(u8, Alternative)>, EngineError> {
        let current_group = current.group_id.as_deref().unwrap_or_default();
        match candidate.group_id.as_deref() {
            Some(group_id) if group_id == current_group => {
                let state = fixed.committing(slot, Arc::clone(candidate));
                Ok(self.check_and_rank(
                    &state,
                    groups,
                    template,
                    candidate,
                    0,
                    false,
                    None,
                    format!("stays within co-ord set '{current_group}'"),
                ))
            }
            Some(foreign) => {
                // A different set: every slot the current group occupies
                // must switch with it.
                if !groups.contains_key(foreign) {
                    if let Some(doc) = self.index.coord_group(foreign).await? {
                        groups.insert(foreign.to_string(), doc);
                    }
                }
                let Some(target_group) = groups.get(foreign).cloned() else {
                    return Ok(None);
                };

                let mut cascade_slots: Vec<SlotClass> = Vec::new();
                for (s, item) in items {
                    if *s != slot && item.group_id.as_deref() == Some(current_group) {
                        cascade_slots.push(*s);
                    }
                }

                let mut wanted: Vec<(SlotClass, String)> = Vec::new();
                for s in &cascade_slots {
                    match target_group.member_in(*s) {
                        Some(member) => wanted.push((*s, member.to_string())),
                        None => return Ok(None),
                    }
                }
                let ids: Vec<String> = wanted.iter().map(|(_, id)| id.clone()).collect();
                let found = self.index.items_by_ids(&ids).await?;
                if found.len() != ids.len() {
                    return Ok(None);
                }
                let by_id: BTreeMap<&str, &Arc<Item>> =
                    found.iter().map(|i| (i.item_id.as_str(), i)).collect();

                let mut state = PartialBundle::new();
                for (s, item) in fixed.entries() {
                    if !cascade_slots.contains(&s) {
                        state = state.committing(s, Arc::clone(item));
                    }
                }
                let mut steps = Vec::new();
                for (s, id) in &wanted {
                    let item = by_id.get(id.as_str()).expect("resolved above");
                    state = state.committing(*s, Arc::clone(item));
                    steps.push(CascadeStep {
                        slot: *s,
                        replace_with: id.clone(),
                    });
                }
                state = state.committing(slot, Arc::clone(candidate));

                Ok(self.check_and_rank(
                    &state,
                    groups,
                    template,
                    candidate,
                    1,
                    true,
                    Some(CascadePlan { steps }),
                    format!("switches co-ord set '{current_group}' for '{foreign}'"),
                ))
            }
            None => Ok(None),
        }
    }

    /// prefer_strict: same-group first, then penalized breaks.
    fn prefer_strict_alternative(
        &self,
        fixed: &PartialBundle,
        slot: SlotClass,
        current: &Arc<Item>,
        candidate: &Arc<Item>,
        groups: &BTreeMap<String, Arc<CoordGroup>>,
        template: &Template,
    ) -> Option<(u8, Alternative)> {
        let current_group = current.group_id.as_deref().unwrap_or_default();
        if candidate.group_id.as_deref() == Some(current_group) {
            let state = fixed.committing(slot, Arc::clone(candidate));
            return self.check_and_rank(
                &state,
                groups,
                template,
                candidate,
                0,
                false,
                None,
                format!("stays within co-ord set '{current_group}'"),
            );
        }
        // The scorer deducts the configured break penalty once the set is
        // no longer worn whole.
        let state = fixed.committing(slot, Arc::clone(candidate));
        self.check_and_rank(
            &state,
            groups,
            template,
            candidate,
            1,
            false,
            None,
            format!("breaks prefer_strict set '{current_group}' (penalty applied)"),
        )
    }

    /// Loose or ungrouped: rank by rescored compatibility with the fixed
    /// items.
    fn loose_alternative(
        &self,
        fixed: &PartialBundle,
        slot: SlotClass,
        candidate: &Arc<Item>,
        groups: &BTreeMap<String, Arc<CoordGroup>>,
        template: &Template,
    ) -> Option<(u8, Alternative)> {
        let state = fixed.committing(slot, Arc::clone(candidate));
        let reason = self.palette_reason(fixed, candidate);
        self.check_and_rank(&state, groups, template, candidate, 0, false, None, reason)
    }

    /// Hard-check the swapped state and build the ranked alternative.
    #[allow(clippy::too_many_arguments)]
    fn check_and_rank(
        &self,
        state: &PartialBundle,
        groups: &BTreeMap<String, Arc<CoordGroup>>,
        template: &Template,
        candidate: &Arc<Item>,
        priority: u8,
        requires_cascade: bool,
        cascade_plan: Option<CascadePlan>,
        coherence_reason: String,
    ) -> Option<(u8, Alternative)> {
        let ctx = ConstraintCtx {
            ruleset: self.ruleset,
            template,
            profile: self.profile,
            context: self.context,
            allow_catalog: self.allow_catalog,
            groups,
        };
        if self.constraints.check_complete(state, &ctx).is_err() {
            return None;
        }
        let new_score = self.rescore(state, groups);
        Some((
            priority,
            Alternative {
                item_id: candidate.item_id.clone(),
                new_score,
                delta_vs_current: 0.0, // filled in after current_score is known
                requires_cascade,
                cascade_plan,
                coherence_reason,
            },
        ))
    }

    fn rescore(&self, state: &PartialBundle, groups: &BTreeMap<String, Arc<CoordGroup>>) -> f64 {
        self.scorer
            .score(&ScoreInputs {
                state,
                ruleset: self.ruleset,
                profile: self.profile,
                context: self.context,
                history: self.history,
                deltas: self.deltas,
                groups,
            })
            .aggregate
    }

    /// A short palette/formality compatibility phrase for loose swaps.
    fn palette_reason(&self, fixed: &PartialBundle, candidate: &Arc<Item>) -> String {
        use crate::color::relation;

        let Some(color) = candidate.color else {
            return "no color to coordinate".to_string();
        };
        let c_neutral = self.ruleset.thresholds.c_neutral;
        if color.is_neutral(c_neutral) {
            return "neutral palette fits the rest".to_string();
        }
        let mut relations: Vec<String> = Vec::new();
        for item in fixed.items() {
            if let Some(other) = item.color {
                if !other.is_neutral(c_neutral) {
                    relations.push(format!("{:?}", relation(color, other)));
                }
            }
        }
        if relations.is_empty() {
            "only chromatic item in the outfit".to_string()
        } else {
            format!("palette {} with fixed items", relations.join("/").to_lowercase())
        }
    }

    fn template_of<'b>(&'b self, bundle: &Bundle) -> Result<&'b Template, EngineError> {
        self.ruleset
            .templates
            .iter()
            .find(|t| t.template_id == bundle.template_id)
            .ok_or_else(|| EngineError::InvalidInput {
                reason: format!("unknown template '{}'", bundle.template_id),
            })
    }

    async fn resolve_bundle_items(
        &self,
        bundle: &Bundle,
    ) -> Result<BTreeMap<SlotClass, Arc<Item>>, EngineError> {
        let ids: Vec<String> = bundle.slots.values().cloned().collect();
        let found = self.index.items_by_ids(&ids).await?;
        let by_id: BTreeMap<&str, &Arc<Item>> =
            found.iter().map(|i| (i.item_id.as_str(), i)).collect();
        let mut items = BTreeMap::new();
        for (slot, id) in &bundle.slots {
            let item = by_id.get(id.as_str()).ok_or_else(|| EngineError::InvalidInput {
                reason: format!("bundle item '{id}' no longer exists"),
            })?;
            items.insert(*slot, Arc::clone(item));
        }
        Ok(items)
    }

    /// Group documents for every grouped item in the bundle or shortlist.
    async fn resolve_groups(
        &self,
        items: &BTreeMap<SlotClass, Arc<Item>>,
        candidates: &[Arc<Item>],
    ) -> Result<BTreeMap<String, Arc<CoordGroup>>, EngineError> {
        let mut groups = BTreeMap::new();
        let grouped = items
            .values()
            .chain(candidates.iter())
            .filter_map(|i| i.group_id.as_deref());
        for group_id in grouped {
            if groups.contains_key(group_id) {
                continue;
            }
            if let Some(doc) = self.index.coord_group(group_id).await? {
                groups.insert(group_id.to_string(), doc);
            }
        }
        Ok(groups)
    }
}

