//! Candidate retrieval: per-slot filtered, ranked shortlists.
//!
//! Wardrobe and catalog are queried in parallel, merged by
//! `(−unary, owner_rank, item_id)`, and truncated to the slot's shortlist
//! size. A process-wide LRU fronts the index so repeated beam expansions
//! and back-to-back requests reuse one retrieval.

mod cache;

pub use cache::{ShortlistCache, ShortlistKey};

use std::cmp::Ordering;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::index::{IndexError, IndexQuery, ItemFilter};
use crate::items::{Item, Owner, SlotClass};
use crate::profile::{Context, Profile};
use crate::rules::RuleSet;

/// Unary (single-item) relevance score used for shortlist ranking.
///
/// Formality closeness + temperature fit + style tag match + a small
/// confidence term; higher is better.
pub fn unary_score(item: &Item, target_dressiness: u8, context: &Context, profile: &Profile) -> f64 {
    let formality = 1.0 - (item.formality as f64 - target_dressiness as f64).abs() / 4.0;
    let temperature = if item.seasonality.contains(&context.temperature_band) {
        1.0
    } else {
        0.0
    };
    let signature = &profile.style_signature;
    let style = if signature.is_empty() {
        0.5
    } else {
        let intersection = item
            .style_tags
            .iter()
            .filter(|t| signature.contains(*t))
            .count();
        let union = item.style_tags.len() + signature.len() - intersection;
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    };
    let confidence = item.confidence.values().fold(1.0_f64, |acc, v| acc.min(*v));
    formality + temperature + style + 0.1 * confidence
}

/// Retrieves ranked candidate shortlists per slot.
#[derive(Debug)]
pub struct CandidateRetriever {
    index: Arc<dyn IndexQuery>,
    cache: Arc<ShortlistCache>,
}

impl CandidateRetriever {
    pub fn new(index: Arc<dyn IndexQuery>, cache: Arc<ShortlistCache>) -> Self {
        Self { index, cache }
    }

    /// The cache this retriever reads through.
    pub fn cache(&self) -> &Arc<ShortlistCache> {
        &self.cache
    }

    /// A ranked shortlist of up to `k` candidates for one slot.
    #[allow(clippy::too_many_arguments)]
    pub async fn shortlist(
        &self,
        user_id: &str,
        slot: SlotClass,
        ruleset: &RuleSet,
        context: &Context,
        profile: &Profile,
        allow_catalog: bool,
        k: usize,
    ) -> Result<Arc<Vec<Arc<Item>>>, IndexError> {
        let key = ShortlistKey {
            user_id: user_id.to_string(),
            ruleset_version: ruleset.version,
            context_hash: context_hash(context, slot, allow_catalog, k),
        };
        if let Some(hit) = self.cache.get(&key) {
            log::debug!("shortlist cache hit for {slot:?} (user {user_id})");
            return Ok(hit);
        }

        let target = context.effective_dressiness(profile);
        let lo = target.saturating_sub(ruleset.thresholds.formality_tolerance_lo);
        let hi = target.saturating_add(ruleset.thresholds.formality_tolerance_hi);
        let filter = ItemFilter::for_slot(slot)
            .with_band(context.temperature_band)
            .with_formality(lo, hi)
            .with_forbidden_tags(profile.forbidden_tags.clone());
        let wardrobe_filter = filter.clone().with_user(user_id);

        let mut merged = if allow_catalog {
            let (wardrobe, catalog) = futures::join!(
                self.index.search(Owner::Wardrobe, &wardrobe_filter, k, None),
                self.index.search(Owner::Catalog, &filter, k, None)
            );
            let mut items = wardrobe?.items;
            items.extend(catalog?.items);
            items
        } else {
            self.index
                .search(Owner::Wardrobe, &wardrobe_filter, k, None)
                .await?
                .items
        };

        merged.sort_by(|a, b| rank_key_cmp(a, b, target, context, profile));
        merged.truncate(k);

        let shortlist = Arc::new(merged);
        self.cache.put(key, Arc::clone(&shortlist));
        Ok(shortlist)
    }
}

/// Total order `(−unary, owner_rank, item_id)`.
fn rank_key_cmp(
    a: &Arc<Item>,
    b: &Arc<Item>,
    target: u8,
    context: &Context,
    profile: &Profile,
) -> Ordering {
    let ua = unary_score(a, target, context, profile);
    let ub = unary_score(b, target, context, profile);
    ub.total_cmp(&ua)
        .then_with(|| a.owner.rank().cmp(&b.owner.rank()))
        .then_with(|| a.item_id.cmp(&b.item_id))
}

/// Hash of the retrieval context for cache keying.
fn context_hash(context: &Context, slot: SlotClass, allow_catalog: bool, k: usize) -> String {
    let canonical = serde_json::json!({
        "context": context,
        "slot": slot,
        "allow_catalog": allow_catalog,
        "k": k,
    });
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
