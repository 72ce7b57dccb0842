//! The built-in hard constraints.

use crate::assembly::PartialBundle;
use crate::items::{CohesionPolicy, SlotClass};
use crate::rules::SlotRequirement;

use super::{ConstraintCtx, HardConstraint, Violation, ViolationCode};

/// The constraints the engine runs, in evaluation order.
pub fn default_constraints() -> Vec<Box<dyn HardConstraint>> {
    vec![
        Box::new(LayeringOrder),
        Box::new(OnePieceExclusivity),
        Box::new(StrictCoordConflict),
        Box::new(StrictCoordCompleteness),
        Box::new(FormalityBounds),
        Box::new(TemperatureSafety),
        Box::new(CatalogCap),
        Box::new(BeltRule),
        Box::new(Coverage),
    ]
}

/// Committed layer slots must lie on one wear chain of the layering graph;
/// at completion, a non-base layer needs a committed base under it.
pub struct LayeringOrder;

impl HardConstraint for LayeringOrder {
    fn code(&self) -> ViolationCode {
        ViolationCode::LayeringOrder
    }

    fn check_partial(
        &self,
        bundle: &PartialBundle,
        ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        let graph = &ctx.ruleset.layering;
        let nodes = graph.nodes();
        let layered: Vec<(SlotClass, &str)> = bundle
            .entries()
            .filter(|(slot, _)| nodes.contains(slot))
            .map(|(slot, item)| (slot, item.item_id.as_str()))
            .collect();
        for (i, (a, a_id)) in layered.iter().enumerate() {
            for (b, b_id) in &layered[i + 1..] {
                if !graph.comparable(*a, *b) {
                    return Err(Violation::new(
                        ViolationCode::LayeringOrder,
                        format!("{a:?} and {b:?} cannot be layered together"),
                    )
                    .with_items([*a_id, *b_id]));
                }
            }
        }
        Ok(())
    }

    fn check_complete(
        &self,
        bundle: &PartialBundle,
        ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        self.check_partial(bundle, ctx)?;
        let graph = &ctx.ruleset.layering;
        let sources = graph.sources();
        let has_base = sources.iter().any(|slot| bundle.contains(*slot));
        for (slot, item) in bundle.entries() {
            if graph.nodes().contains(&slot) && !sources.contains(&slot) && !has_base {
                return Err(Violation::new(
                    ViolationCode::LayeringOrder,
                    format!("{slot:?} layer has no base layer beneath it"),
                )
                .with_items([item.item_id.as_str()]));
            }
        }
        Ok(())
    }
}

/// A one-piece displaces top, mid, and bottom.
pub struct OnePieceExclusivity;

impl HardConstraint for OnePieceExclusivity {
    fn code(&self) -> ViolationCode {
        ViolationCode::OnePieceExclusive
    }

    fn check_partial(
        &self,
        bundle: &PartialBundle,
        _ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        let Some(one_piece) = bundle.get(SlotClass::OnePiece) else {
            return Ok(());
        };
        for slot in [SlotClass::Top, SlotClass::Mid, SlotClass::Bottom] {
            if let Some(item) = bundle.get(slot) {
                return Err(Violation::new(
                    ViolationCode::OnePieceExclusive,
                    format!("one-piece excludes {slot:?}"),
                )
                .with_items([one_piece.item_id.as_str(), item.item_id.as_str()]));
            }
        }
        Ok(())
    }
}

/// No two strict groups may mix, and a committed strict group owns its
/// declared slots.
pub struct StrictCoordConflict;

impl HardConstraint for StrictCoordConflict {
    fn code(&self) -> ViolationCode {
        ViolationCode::StrictCoordConflict
    }

    fn check_partial(
        &self,
        bundle: &PartialBundle,
        ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        let mut strict_group: Option<&str> = None;
        for (_, item) in bundle.items_with_policy(CohesionPolicy::Strict) {
            let group = item.group_id.as_deref().unwrap_or_default();
            match strict_group {
                None => strict_group = Some(group),
                Some(committed) if committed != group => {
                    return Err(Violation::new(
                        ViolationCode::StrictCoordConflict,
                        format!("strict groups '{committed}' and '{group}' cannot mix"),
                    )
                    .with_items([item.item_id.as_str()])
                    .with_group(group));
                }
                Some(_) => {}
            }
        }

        // A committed strict group's declared slots admit only its members.
        let Some(group_id) = strict_group else {
            return Ok(());
        };
        if let Some(group) = ctx.groups.get(group_id) {
            if group.policy == CohesionPolicy::Strict {
                for (slot, item) in bundle.entries() {
                    if let Some(member) = group.member_in(slot) {
                        if item.item_id != member {
                            return Err(Violation::new(
                                ViolationCode::StrictCoordConflict,
                                format!(
                                    "slot {slot:?} belongs to strict set '{group_id}' but holds a different item"
                                ),
                            )
                            .with_items([item.item_id.as_str()])
                            .with_group(group_id));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// At completion every strict group member the template calls for must be
/// present.
pub struct StrictCoordCompleteness;

impl HardConstraint for StrictCoordCompleteness {
    fn code(&self) -> ViolationCode {
        ViolationCode::StrictCoordIncomplete
    }

    fn check_complete(
        &self,
        bundle: &PartialBundle,
        ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        let mut seen: Vec<&str> = Vec::new();
        for (_, item) in bundle.items_with_policy(CohesionPolicy::Strict) {
            let Some(group_id) = item.group_id.as_deref() else {
                continue;
            };
            if seen.contains(&group_id) {
                continue;
            }
            seen.push(group_id);

            let Some(group) = ctx.groups.get(group_id) else {
                continue;
            };
            let mut missing = Vec::new();
            for (slot, member_id) in &group.member_slots {
                if !ctx.template.includes(*slot) {
                    continue;
                }
                let committed = bundle
                    .get(*slot)
                    .is_some_and(|item| item.item_id == *member_id);
                if !committed {
                    missing.push(member_id.clone());
                }
            }
            if !missing.is_empty() {
                return Err(Violation::new(
                    ViolationCode::StrictCoordIncomplete,
                    format!("strict set '{group_id}' is missing members"),
                )
                .with_items(missing)
                .with_group(group_id));
            }
        }
        Ok(())
    }
}

/// Every item's formality sits inside target ± tolerance.
pub struct FormalityBounds;

impl HardConstraint for FormalityBounds {
    fn code(&self) -> ViolationCode {
        ViolationCode::FormalityOutOfBounds
    }

    fn check_partial(
        &self,
        bundle: &PartialBundle,
        ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        let target = ctx.target_dressiness();
        let lo = target.saturating_sub(ctx.ruleset.thresholds.formality_tolerance_lo);
        let hi = target.saturating_add(ctx.ruleset.thresholds.formality_tolerance_hi);
        for (_, item) in bundle.entries() {
            if !(lo..=hi).contains(&item.formality) {
                return Err(Violation::new(
                    ViolationCode::FormalityOutOfBounds,
                    format!(
                        "formality {} outside {lo}..={hi} for target {target}",
                        item.formality
                    ),
                )
                .with_items([item.item_id.as_str()]));
            }
        }
        Ok(())
    }
}

/// Every item must suit the context temperature band.
pub struct TemperatureSafety;

impl HardConstraint for TemperatureSafety {
    fn code(&self) -> ViolationCode {
        ViolationCode::SeasonalityMismatch
    }

    fn check_partial(
        &self,
        bundle: &PartialBundle,
        ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        if !ctx.ruleset.thresholds.strict_temperature {
            return Ok(());
        }
        let band = ctx.context.temperature_band;
        for (_, item) in bundle.entries() {
            if !item.seasonality.contains(&band) {
                return Err(Violation::new(
                    ViolationCode::SeasonalityMismatch,
                    format!("seasonality excludes {band:?}"),
                )
                .with_items([item.item_id.as_str()]));
            }
        }
        Ok(())
    }
}

/// At most one catalog item, and none when catalog use is off.
pub struct CatalogCap;

impl HardConstraint for CatalogCap {
    fn code(&self) -> ViolationCode {
        ViolationCode::CatalogCapExceeded
    }

    fn check_partial(
        &self,
        bundle: &PartialBundle,
        ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        let cap = usize::from(ctx.allow_catalog);
        if bundle.catalog_count() > cap {
            let catalog: Vec<&str> = bundle
                .items()
                .filter(|i| i.is_catalog())
                .map(|i| i.item_id.as_str())
                .collect();
            return Err(Violation::new(
                ViolationCode::CatalogCapExceeded,
                format!("{} catalog items exceed the cap of {cap}", catalog.len()),
            )
            .with_items(catalog));
        }
        Ok(())
    }
}

/// Dressy trousers with belt loops require a belt when the template
/// exposes the slot.
pub struct BeltRule;

impl HardConstraint for BeltRule {
    fn code(&self) -> ViolationCode {
        ViolationCode::BeltRequired
    }

    fn check_complete(
        &self,
        bundle: &PartialBundle,
        ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        if !ctx.template.includes(SlotClass::Belt) || ctx.target_dressiness() < 4 {
            return Ok(());
        }
        let Some(bottom) = bundle.get(SlotClass::Bottom) else {
            return Ok(());
        };
        if bottom.has_belt_loops && !bundle.contains(SlotClass::Belt) {
            return Err(Violation::new(
                ViolationCode::BeltRequired,
                "belt-looped trousers at this dressiness require a belt",
            )
            .with_items([bottom.item_id.as_str()]));
        }
        Ok(())
    }
}

/// All mandatory template slots are filled.
pub struct Coverage;

impl HardConstraint for Coverage {
    fn code(&self) -> ViolationCode {
        ViolationCode::CoverageIncomplete
    }

    fn check_complete(
        &self,
        bundle: &PartialBundle,
        ctx: &ConstraintCtx<'_>,
    ) -> Result<(), Violation> {
        let one_piece = bundle.one_piece_committed();
        let mut missing = Vec::new();
        for slot in &ctx.template.slots {
            let satisfied = match slot.requirement {
                SlotRequirement::Required => bundle.contains(slot.slot),
                SlotRequirement::Optional => true,
                SlotRequirement::RequiredUnlessOnePiece => {
                    one_piece || bundle.contains(slot.slot)
                }
            };
            if !satisfied {
                missing.push(slot.slot);
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Violation::new(
                ViolationCode::CoverageIncomplete,
                format!("mandatory slots unfilled: {missing:?}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use crate::constraints::ConstraintEngine;
    use crate::items::{CohesionPolicy, CoordGroup, Item, Owner, TemperatureBand};
    use crate::profile::{Context, Profile};
    use crate::rules::RuleSet;

    struct Fixture {
        ruleset: RuleSet,
        profile: Profile,
        context: Context,
        groups: BTreeMap<String, Arc<CoordGroup>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                ruleset: RuleSet::builtin(1),
                profile: Profile::new("u1", 4),
                context: Context::new("work_office", TemperatureBand::Warm).with_dressiness(4),
                groups: BTreeMap::new(),
            }
        }

        fn ctx(&self, allow_catalog: bool) -> ConstraintCtx<'_> {
            ConstraintCtx {
                ruleset: &self.ruleset,
                template: self
                    .ruleset
                    .templates
                    .iter()
                    .find(|t| t.template_id == "work_office_core")
                    .unwrap(),
                profile: &self.profile,
                context: &self.context,
                allow_catalog,
                groups: &self.groups,
            }
        }
    }

    fn item(id: &str, role: &str, slot: SlotClass, formality: u8) -> Arc<Item> {
        Arc::new(Item::new(
            id,
            Owner::Wardrobe,
            role,
            slot,
            formality,
            [TemperatureBand::Warm, TemperatureBand::Mild],
        ))
    }

    fn suit_group() -> Arc<CoordGroup> {
        Arc::new(CoordGroup::new(
            "g1",
            "suit",
            CohesionPolicy::Strict,
            [
                (SlotClass::Outer, "g1-jacket".to_string()),
                (SlotClass::Bottom, "g1-trousers".to_string()),
            ],
        ))
    }

    fn strict_member(id: &str, role: &str, slot: SlotClass) -> Arc<Item> {
        Arc::new(
            Item::new(
                id,
                Owner::Wardrobe,
                role,
                slot,
                4,
                [TemperatureBand::Warm, TemperatureBand::Mild],
            )
            .with_group("g1", role, "suit", CohesionPolicy::Strict),
        )
    }

    #[test]
    fn test_one_piece_excludes_top() {
        let fixture = Fixture::new();
        let state = PartialBundle::new()
            .committing(SlotClass::OnePiece, item("dress", "dress", SlotClass::OnePiece, 4))
            .committing(SlotClass::Top, item("shirt", "shirt", SlotClass::Top, 4));
        let err = OnePieceExclusivity
            .check_partial(&state, &fixture.ctx(false))
            .unwrap_err();
        assert_eq!(err.code, ViolationCode::OnePieceExclusive);
        assert_eq!(err.items.len(), 2);
    }

    #[test]
    fn test_formality_bounds() {
        let fixture = Fixture::new();
        let ok = PartialBundle::new().committing(
            SlotClass::Footwear,
            item("oxfords", "shoes", SlotClass::Footwear, 5),
        );
        assert!(FormalityBounds.check_partial(&ok, &fixture.ctx(false)).is_ok());

        let bad = PartialBundle::new().committing(
            SlotClass::Footwear,
            item("flipflops", "shoes", SlotClass::Footwear, 1),
        );
        let err = FormalityBounds
            .check_partial(&bad, &fixture.ctx(false))
            .unwrap_err();
        assert_eq!(err.code, ViolationCode::FormalityOutOfBounds);
    }

    #[test]
    fn test_temperature_safety() {
        let fixture = Fixture::new();
        let parka = Arc::new(Item::new(
            "parka",
            Owner::Wardrobe,
            "coat",
            SlotClass::Outer,
            4,
            [TemperatureBand::Cold],
        ));
        let state = PartialBundle::new().committing(SlotClass::Outer, parka);
        let err = TemperatureSafety
            .check_partial(&state, &fixture.ctx(false))
            .unwrap_err();
        assert_eq!(err.code, ViolationCode::SeasonalityMismatch);
    }

    #[test]
    fn test_catalog_cap() {
        let fixture = Fixture::new();
        let catalog = |id: &str, slot| {
            Arc::new(Item::new(
                id,
                Owner::Catalog,
                "shirt",
                slot,
                4,
                [TemperatureBand::Warm],
            ))
        };
        let one = PartialBundle::new().committing(SlotClass::Top, catalog("c1", SlotClass::Top));
        assert!(CatalogCap.check_partial(&one, &fixture.ctx(true)).is_ok());
        assert_eq!(
            CatalogCap
                .check_partial(&one, &fixture.ctx(false))
                .unwrap_err()
                .code,
            ViolationCode::CatalogCapExceeded
        );
        let two = one.committing(SlotClass::Mid, catalog("c2", SlotClass::Mid));
        assert!(CatalogCap.check_partial(&two, &fixture.ctx(true)).is_err());
    }

    #[test]
    fn test_strict_conflict_between_groups() {
        let fixture = Fixture::new();
        let other = Arc::new(
            Item::new(
                "g2-jacket",
                Owner::Wardrobe,
                "jacket",
                SlotClass::Outer,
                4,
                [TemperatureBand::Warm],
            )
            .with_group("g2", "jacket", "suit", CohesionPolicy::Strict),
        );
        let state = PartialBundle::new()
            .committing(
                SlotClass::Bottom,
                strict_member("g1-trousers", "trousers", SlotClass::Bottom),
            )
            .committing(SlotClass::Outer, other);
        let err = StrictCoordConflict
            .check_partial(&state, &fixture.ctx(false))
            .unwrap_err();
        assert_eq!(err.code, ViolationCode::StrictCoordConflict);
    }

    #[test]
    fn test_strict_owned_slot_rejects_foreign_item() {
        let mut fixture = Fixture::new();
        fixture.groups.insert("g1".to_string(), suit_group());
        let state = PartialBundle::new()
            .committing(
                SlotClass::Outer,
                strict_member("g1-jacket", "jacket", SlotClass::Outer),
            )
            .committing(
                SlotClass::Bottom,
                item("chinos", "trousers", SlotClass::Bottom, 4),
            );
        let err = StrictCoordConflict
            .check_partial(&state, &fixture.ctx(false))
            .unwrap_err();
        assert_eq!(err.code, ViolationCode::StrictCoordConflict);
        assert_eq!(err.group_id.as_deref(), Some("g1"));
    }

    #[test]
    fn test_strict_completeness_reports_missing_member() {
        let mut fixture = Fixture::new();
        fixture.groups.insert("g1".to_string(), suit_group());
        let state = PartialBundle::new().committing(
            SlotClass::Outer,
            strict_member("g1-jacket", "jacket", SlotClass::Outer),
        );
        let err = StrictCoordCompleteness
            .check_complete(&state, &fixture.ctx(false))
            .unwrap_err();
        assert_eq!(err.code, ViolationCode::StrictCoordIncomplete);
        assert_eq!(err.group_id.as_deref(), Some("g1"));
        assert_eq!(err.items, vec!["g1-trousers".to_string()]);
    }

    #[test]
    fn test_strict_completeness_monotone_partial_passes() {
        // The partial stage must not fail a half-committed group: the
        // missing member can still arrive.
        let mut fixture = Fixture::new();
        fixture.groups.insert("g1".to_string(), suit_group());
        let state = PartialBundle::new().committing(
            SlotClass::Outer,
            strict_member("g1-jacket", "jacket", SlotClass::Outer),
        );
        assert!(StrictCoordCompleteness
            .check_partial(&state, &fixture.ctx(false))
            .is_ok());
    }

    #[test]
    fn test_belt_rule_fires_at_dressiness_four() {
        let fixture = Fixture::new();
        let mut trousers = Item::new(
            "trousers",
            Owner::Wardrobe,
            "trousers",
            SlotClass::Bottom,
            4,
            [TemperatureBand::Warm],
        );
        trousers.has_belt_loops = true;
        let state = PartialBundle::new().committing(SlotClass::Bottom, Arc::new(trousers));
        let err = BeltRule
            .check_complete(&state, &fixture.ctx(false))
            .unwrap_err();
        assert_eq!(err.code, ViolationCode::BeltRequired);

        let belt = item("belt", "belt", SlotClass::Belt, 4);
        let with_belt = state.committing(SlotClass::Belt, belt);
        assert!(BeltRule.check_complete(&with_belt, &fixture.ctx(false)).is_ok());
    }

    #[test]
    fn test_coverage_satisfied_by_one_piece() {
        let fixture = Fixture::new();
        let state = PartialBundle::new()
            .committing(SlotClass::OnePiece, item("dress", "dress", SlotClass::OnePiece, 4))
            .committing(
                SlotClass::Footwear,
                item("heels", "shoes", SlotClass::Footwear, 4),
            );
        assert!(Coverage.check_complete(&state, &fixture.ctx(false)).is_ok());

        let missing_shoes = PartialBundle::new().committing(
            SlotClass::OnePiece,
            item("dress", "dress", SlotClass::OnePiece, 4),
        );
        let err = Coverage
            .check_complete(&missing_shoes, &fixture.ctx(false))
            .unwrap_err();
        assert_eq!(err.code, ViolationCode::CoverageIncomplete);
    }

    #[test]
    fn test_layering_requires_base_at_completion() {
        let fixture = Fixture::new();
        let lone_jacket = PartialBundle::new().committing(
            SlotClass::Outer,
            item("jacket", "jacket", SlotClass::Outer, 4),
        );
        assert!(LayeringOrder
            .check_partial(&lone_jacket, &fixture.ctx(false))
            .is_ok());
        let err = LayeringOrder
            .check_complete(&lone_jacket, &fixture.ctx(false))
            .unwrap_err();
        assert_eq!(err.code, ViolationCode::LayeringOrder);

        let with_base = lone_jacket.committing(SlotClass::Top, item("shirt", "shirt", SlotClass::Top, 4));
        assert!(LayeringOrder
            .check_complete(&with_base, &fixture.ctx(false))
            .is_ok());
    }

    #[test]
    fn test_engine_runs_in_declared_order() {
        let fixture = Fixture::new();
        let engine = ConstraintEngine::default();
        let state = PartialBundle::new().committing(
            SlotClass::Top,
            item("shirt", "shirt", SlotClass::Top, 4),
        );
        assert!(engine.check_partial(&state, &fixture.ctx(false)).is_ok());
        // Incomplete coverage only surfaces at completion.
        assert!(engine.check_complete(&state, &fixture.ctx(false)).is_err());
    }
}
