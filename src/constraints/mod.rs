//! Hard constraints: pure, monotone predicates over partial bundles.
//!
//! A violated constraint can never be repaired by committing more items, so
//! the assembler prunes on first failure. Constraints that inherently need
//! the finished outfit (coverage, the belt gate, strict-set completeness)
//! run only at completion.

mod checks;

pub use checks::default_constraints;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::assembly::PartialBundle;
use crate::items::{CoordGroup, SlotClass};
use crate::profile::{Context, Profile};
use crate::rules::{RuleSet, Template};

/// Machine-readable violation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    LayeringOrder,
    OnePieceExclusive,
    StrictCoordConflict,
    StrictCoordIncomplete,
    FormalityOutOfBounds,
    SeasonalityMismatch,
    CatalogCapExceeded,
    BeltRequired,
    CoverageIncomplete,
}

/// A reported hard-constraint violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub code: ViolationCode,
    /// Items implicated in the violation.
    #[serde(default)]
    pub items: Vec<String>,
    /// The co-ord group implicated, when the code concerns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub reason: String,
}

impl Violation {
    pub fn new(code: ViolationCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            items: Vec::new(),
            group_id: None,
            reason: reason.into(),
        }
    }

    pub fn with_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}

/// Read-only request state constraints evaluate against.
pub struct ConstraintCtx<'a> {
    pub ruleset: &'a RuleSet,
    pub template: &'a Template,
    pub profile: &'a Profile,
    pub context: &'a Context,
    pub allow_catalog: bool,
    /// Co-ord group documents resolved so far this request, by group id.
    pub groups: &'a BTreeMap<String, Arc<CoordGroup>>,
}

impl ConstraintCtx<'_> {
    /// The dressiness target for this request.
    pub fn target_dressiness(&self) -> u8 {
        self.context.effective_dressiness(self.profile)
    }
}

/// A single hard constraint.
pub trait HardConstraint: Send + Sync {
    /// The code this constraint reports.
    fn code(&self) -> ViolationCode;

    /// Monotone check on a partial bundle; default passes.
    fn check_partial(
        &self,
        bundle: &PartialBundle,
        ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        let _ = (bundle, ctx);
        Ok(())
    }

    /// Check at completion; defaults to the partial check.
    fn check_complete(
        &self,
        bundle: &PartialBundle,
        ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        self.check_partial(bundle, ctx)
    }
}

/// The ordered set of constraints the assembler runs.
pub struct ConstraintEngine {
    constraints: Vec<Box<dyn HardConstraint>>,
}

impl std::fmt::Debug for ConstraintEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let codes: Vec<ViolationCode> = self.constraints.iter().map(|c| c.code()).collect();
        f.debug_struct("ConstraintEngine")
            .field("constraints", &codes)
            .finish()
    }
}

impl Default for ConstraintEngine {
    fn default() -> Self {
        Self {
            constraints: default_constraints(),
        }
    }
}

impl ConstraintEngine {
    pub fn new(constraints: Vec<Box<dyn HardConstraint>>) -> Self {
        Self { constraints }
    }

    /// First violation in declared order on a partial bundle.
    pub fn check_partial(
        &self,
        bundle: &PartialBundle,
        ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        for constraint in &self.constraints {
            constraint.check_partial(bundle, ctx)?;
        }
        Ok(())
    }

    /// First violation in declared order on a finished bundle.
    pub fn check_complete(
        &self,
        bundle: &PartialBundle,
        ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        for constraint in &self.constraints {
            constraint.check_complete(bundle, ctx)?;
        }
        Ok(())
    }

    /// Which slot classes a violation's offending items occupy, for
    /// pruning diagnostics.
    pub fn offending_slots(bundle: &PartialBundle, violation: &Violation) -> Vec<SlotClass> {
        bundle
            .entries()
            .filter(|(_, item)| violation.items.contains(&item.item_id))
            .map(|(slot, _)| slot)
            .collect()
    }
}
