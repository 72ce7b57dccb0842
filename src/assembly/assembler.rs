//! The beam-search assembler.
//!
//! Expands template slots in order (anchor first, accessories last),
//! prunes children through the hard-constraint engine, ranks partials by
//! running soft score, and keeps the top `W` per step. All ordering keys
//! end in item-id material, so results never depend on scheduling.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::constraints::{ConstraintCtx, ConstraintEngine, Violation, ViolationCode};
use crate::errors::EngineError;
use crate::index::IndexQuery;
use crate::items::{CohesionPolicy, CoordGroup, Item, SlotClass};
use crate::profile::{Context, Profile};
use crate::retrieval::CandidateRetriever;
use crate::rules::{RuleSet, SlotRequirement, Template};
use crate::scoring::{DeltaCache, ScoreBreakdown, ScoreInputs, Scorer};

use super::{Deadline, PartialBundle};

/// A completed assembly: the winning state with its score breakdown.
#[derive(Debug)]
pub struct AssemblyOutcome {
    pub state: PartialBundle,
    pub breakdown: ScoreBreakdown,
    /// True when the deadline expired and this is the best terminal found
    /// so far rather than the exhaustive winner.
    pub partial: bool,
}

/// One beam entry: a partial bundle with its running score.
#[derive(Debug, Clone)]
struct BeamNode {
    state: PartialBundle,
    breakdown: ScoreBreakdown,
    token: String,
}

impl BeamNode {
    fn score(&self) -> f64 {
        self.breakdown.aggregate
    }
}

/// Violation bookkeeping for `NO_BUNDLE` diagnostics.
#[derive(Debug, Default)]
struct ViolationTally {
    by_code: BTreeMap<ViolationCode, TallyEntry>,
}

#[derive(Debug, Default)]
struct TallyEntry {
    count: usize,
    group_id: Option<String>,
}

impl ViolationTally {
    fn record(&mut self, violation: &Violation) {
        let entry = self.by_code.entry(violation.code).or_default();
        entry.count += 1;
        if entry.group_id.is_none() {
            entry.group_id = violation.group_id.clone();
        }
    }

    /// The dominant code: highest count, ties by code order.
    fn dominant(&self) -> Option<(ViolationCode, Option<String>)> {
        self.by_code
            .iter()
            .max_by(|a, b| a.1.count.cmp(&b.1.count).then_with(|| b.0.cmp(a.0)))
            .map(|(code, entry)| (*code, entry.group_id.clone()))
    }
}

/// Per-request beam search over one template.
pub struct Assembler<'a> {
    pub retriever: &'a CandidateRetriever,
    pub constraints: &'a ConstraintEngine,
    pub scorer: &'a Scorer,
    pub index: &'a Arc<dyn IndexQuery>,
    pub ruleset: &'a RuleSet,
    pub template: &'a Template,
    pub profile: &'a Profile,
    pub context: &'a Context,
    pub history: &'a [String],
    pub user_id: &'a str,
    pub allow_catalog: bool,
    pub deadline: Deadline,
    pub deltas: &'a DeltaCache,
}

impl Assembler<'_> {
    /// Run the beam search to a winning bundle.
    pub async fn assemble(&self) -> Result<AssemblyOutcome, EngineError> {
        let width = self.ruleset.thresholds.beam_width.max(1);
        let slots = self.template.ordered_slots();
        let mut groups: BTreeMap<String, Arc<CoordGroup>> = BTreeMap::new();
        let mut members: BTreeMap<String, Option<BTreeMap<SlotClass, Arc<Item>>>> =
            BTreeMap::new();
        let mut tally = ViolationTally::default();
        let mut best_terminal: Option<BeamNode> = None;

        let mut beam = vec![self.node(PartialBundle::new(), &groups)];

        for slot in slots {
            if self.deadline.expired() {
                return self.deadline_outcome(best_terminal);
            }
            let requirement = self
                .template
                .requirement_of(slot)
                .expect("ordered slots come from the template");
            let k = self.ruleset.shortlist_size(slot, self.template.anchor);
            let shortlist = self
                .retriever
                .shortlist(
                    self.user_id,
                    slot,
                    self.ruleset,
                    self.context,
                    self.profile,
                    self.allow_catalog,
                    k,
                )
                .await?;

            // Group documents feed atomic anchor commits, strict-conflict
            // checks, and the prefer_strict break deduction; resolve them
            // for every grouped candidate (memoized across slots).
            self.resolve_groups(&shortlist, &mut groups, &mut members)
                .await?;

            let mut child_states: Vec<PartialBundle> = Vec::new();
            for node in &beam {
                if self.deadline.expired() {
                    return self.deadline_outcome(best_terminal);
                }
                self.expand_node(
                    node,
                    slot,
                    requirement,
                    &shortlist,
                    &groups,
                    &members,
                    &mut tally,
                    &mut child_states,
                );
            }

            let mut children: Vec<BeamNode> = Vec::new();
            let ctx = self.constraint_ctx(&groups);
            for state in child_states {
                match self.constraints.check_partial(&state, &ctx) {
                    Ok(()) => children.push(self.node(state, &groups)),
                    Err(violation) => tally.record(&violation),
                }
            }

            if children.is_empty() {
                log::debug!("beam died at {slot:?}");
                return Err(self.no_bundle(&tally, Some(slot)));
            }

            children.sort_by(beam_order);
            children.truncate(width);
            beam = children;

            for node in &beam {
                if self.constraints.check_complete(&node.state, &ctx).is_ok() {
                    self.keep_best_terminal(&mut best_terminal, node);
                }
            }
        }

        // Terminal selection among coverage-satisfying beams.
        let ctx = self.constraint_ctx(&groups);
        let mut terminals: Vec<BeamNode> = Vec::new();
        for node in beam {
            match self.constraints.check_complete(&node.state, &ctx) {
                Ok(()) => terminals.push(node),
                Err(violation) => tally.record(&violation),
            }
        }
        if terminals.is_empty() {
            return Err(self.no_bundle(&tally, None));
        }
        terminals.sort_by(|a, b| self.terminal_order(a, b));
        let winner = terminals.swap_remove(0);
        Ok(AssemblyOutcome {
            state: winner.state,
            breakdown: winner.breakdown,
            partial: false,
        })
    }

    /// Expand one beam node over one slot into child states.
    #[allow(clippy::too_many_arguments)]
    fn expand_node(
        &self,
        node: &BeamNode,
        slot: SlotClass,
        requirement: SlotRequirement,
        shortlist: &[Arc<Item>],
        groups: &BTreeMap<String, Arc<CoordGroup>>,
        members: &BTreeMap<String, Option<BTreeMap<SlotClass, Arc<Item>>>>,
        tally: &mut ViolationTally,
        out: &mut Vec<PartialBundle>,
    ) {
        // A group commit may already have filled this slot.
        if node.state.contains(slot) {
            out.push(node.state.clone());
            return;
        }
        // A committed one-piece displaces top/mid/bottom outright.
        if node.state.one_piece_committed() && slot.excluded_by_one_piece() {
            out.push(node.state.skipping(slot));
            return;
        }

        for candidate in shortlist {
            match candidate.set_cohesion_policy {
                Some(CohesionPolicy::Strict) => {
                    if slot == self.template.anchor {
                        self.expand_group(node, candidate, groups, members, tally, out);
                    }
                    // Elsewhere strict items only enter through their group.
                }
                Some(CohesionPolicy::PreferStrict) => {
                    if slot == self.template.anchor {
                        self.expand_group(node, candidate, groups, members, tally, out);
                    }
                    // A lone member is allowed too; the scorer deducts the
                    // break penalty while the set stays partial.
                    out.push(node.state.committing(slot, Arc::clone(candidate)));
                }
                Some(CohesionPolicy::Loose) | None => {
                    out.push(node.state.committing(slot, Arc::clone(candidate)));
                }
            }
        }

        let may_skip = match requirement {
            SlotRequirement::Optional => true,
            SlotRequirement::RequiredUnlessOnePiece => node.state.one_piece_committed(),
            SlotRequirement::Required => false,
        };
        if may_skip {
            out.push(node.state.skipping(slot));
        }
    }

    /// Atomic commit-group expansion at the anchor slot.
    fn expand_group(
        &self,
        node: &BeamNode,
        candidate: &Arc<Item>,
        groups: &BTreeMap<String, Arc<CoordGroup>>,
        members: &BTreeMap<String, Option<BTreeMap<SlotClass, Arc<Item>>>>,
        tally: &mut ViolationTally,
        out: &mut Vec<PartialBundle>,
    ) {
        let Some(group_id) = candidate.group_id.as_deref() else {
            return;
        };
        let (Some(group), Some(resolved)) = (groups.get(group_id), members.get(group_id)) else {
            tally.record(
                &Violation::new(
                    ViolationCode::StrictCoordIncomplete,
                    format!("co-ord group '{group_id}' has no resolvable document"),
                )
                .with_group(group_id),
            );
            return;
        };
        let Some(member_items) = resolved else {
            tally.record(
                &Violation::new(
                    ViolationCode::StrictCoordIncomplete,
                    format!("co-ord group '{group_id}' is missing members"),
                )
                .with_group(group_id),
            );
            return;
        };
        out.push(node.state.committing_group(
            Arc::clone(group),
            member_items
                .iter()
                .map(|(slot, item)| (*slot, Arc::clone(item))),
        ));
    }

    /// Resolve group documents and member items for grouped candidates.
    /// A group with an unresolvable template-relevant member maps to
    /// `None` in `members`.
    async fn resolve_groups(
        &self,
        shortlist: &[Arc<Item>],
        groups: &mut BTreeMap<String, Arc<CoordGroup>>,
        members: &mut BTreeMap<String, Option<BTreeMap<SlotClass, Arc<Item>>>>,
    ) -> Result<(), EngineError> {
        for candidate in shortlist {
            let Some(group_id) = candidate.group_id.as_deref() else {
                continue;
            };
            if members.contains_key(group_id) {
                continue;
            }
            let Some(group) = self.index.coord_group(group_id).await? else {
                members.insert(group_id.to_string(), None);
                continue;
            };

            let wanted: Vec<(SlotClass, String)> = group
                .member_slots
                .iter()
                .filter(|(slot, _)| self.template.includes(**slot))
                .map(|(slot, id)| (*slot, id.clone()))
                .collect();
            let ids: Vec<String> = wanted.iter().map(|(_, id)| id.clone()).collect();
            let found = self.index.items_by_ids(&ids).await?;
            let by_id: BTreeMap<&str, &Arc<Item>> =
                found.iter().map(|i| (i.item_id.as_str(), i)).collect();

            let mut resolved = BTreeMap::new();
            let mut complete = true;
            for (slot, id) in &wanted {
                match by_id.get(id.as_str()) {
                    Some(item) => {
                        resolved.insert(*slot, Arc::clone(item));
                    }
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            groups.insert(group_id.to_string(), group);
            members.insert(group_id.to_string(), complete.then_some(resolved));
        }
        Ok(())
    }

    fn node(&self, state: PartialBundle, groups: &BTreeMap<String, Arc<CoordGroup>>) -> BeamNode {
        let breakdown = self.scorer.score(&ScoreInputs {
            state: &state,
            ruleset: self.ruleset,
            profile: self.profile,
            context: self.context,
            history: self.history,
            deltas: self.deltas,
            groups,
        });
        let token = state.tie_break_token();
        BeamNode {
            state,
            breakdown,
            token,
        }
    }

    fn constraint_ctx<'b>(
        &'b self,
        groups: &'b BTreeMap<String, Arc<CoordGroup>>,
    ) -> ConstraintCtx<'b> {
        ConstraintCtx {
            ruleset: self.ruleset,
            template: self.template,
            profile: self.profile,
            context: self.context,
            allow_catalog: self.allow_catalog,
            groups,
        }
    }

    fn keep_best_terminal(&self, best: &mut Option<BeamNode>, node: &BeamNode) {
        let replace = match best {
            None => true,
            Some(current) => self.terminal_order(node, current) == Ordering::Less,
        };
        if replace {
            *best = Some(node.clone());
        }
    }

    /// Terminal composite order: score, fewer catalog items, lower mean
    /// near-face ΔE, lexicographic id tuple. `Less` ranks first.
    fn terminal_order(&self, a: &BeamNode, b: &BeamNode) -> Ordering {
        b.score()
            .total_cmp(&a.score())
            .then_with(|| a.state.catalog_count().cmp(&b.state.catalog_count()))
            .then_with(|| {
                self.mean_near_face_delta(&a.state)
                    .total_cmp(&self.mean_near_face_delta(&b.state))
            })
            .then_with(|| a.state.id_tuple().cmp(&b.state.id_tuple()))
    }

    /// Mean pairwise ΔE among near-face items; 0.0 below two colors.
    fn mean_near_face_delta(&self, state: &PartialBundle) -> f64 {
        let near_face: Vec<&Arc<Item>> = state
            .entries()
            .filter(|(slot, item)| slot.is_near_face() && item.color.is_some())
            .map(|(_, item)| item)
            .collect();
        if near_face.len() < 2 {
            return 0.0;
        }
        let mut sum = 0.0;
        let mut pairs = 0usize;
        for (i, a) in near_face.iter().enumerate() {
            for b in &near_face[i + 1..] {
                if let Some(delta) = self.deltas.between(a, b) {
                    sum += delta;
                    pairs += 1;
                }
            }
        }
        if pairs == 0 {
            0.0
        } else {
            sum / pairs as f64
        }
    }

    fn deadline_outcome(
        &self,
        best_terminal: Option<BeamNode>,
    ) -> Result<AssemblyOutcome, EngineError> {
        log::warn!("assembly deadline expired (template {})", self.template.template_id);
        match best_terminal {
            Some(node) => Ok(AssemblyOutcome {
                state: node.state,
                breakdown: node.breakdown,
                partial: true,
            }),
            None => Err(EngineError::Deadline),
        }
    }

    fn no_bundle(&self, tally: &ViolationTally, slot: Option<SlotClass>) -> EngineError {
        let (code, group_id) = tally
            .dominant()
            .unwrap_or((ViolationCode::CoverageIncomplete, None));
        EngineError::NoBundle {
            code,
            slot,
            group_id,
        }
    }
}

/// Beam pruning order: running score descending, then tie-break token.
fn beam_order(a: &BeamNode, b: &BeamNode) -> Ordering {
    b.score()
        .total_cmp(&a.score())
        .then_with(|| a.token.cmp(&b.token))
}
