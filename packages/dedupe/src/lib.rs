#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-cycle deduplication of normalized traffic records.
//!
//! Records with the same fingerprint id describe the same real-world
//! disruption or camera. Exactly one survives per id, chosen by:
//!
//! 1. fewest fields holding the `"unknown"` sentinel,
//! 2. then structural strategies over text strategies,
//! 3. then earliest discovery (strategy registry order, then document
//!    order).
//!
//! Survivors are returned in order of first discovery of their id.

pub mod fingerprint;

use std::cmp::Ordering;
use std::collections::HashMap;

use traffic_monitor_traffic_models::{Identified, Normalized, StrategyKind, Unresolved};

pub use fingerprint::{AnchorPrecision, CameraKey, Fingerprinter, JamKey};

/// Collapses records sharing an id into one.
#[must_use]
pub fn dedupe<T: Identified + Unresolved>(mut items: Vec<Normalized<T>>) -> Vec<Normalized<T>> {
    items.sort_by_key(|item| item.provenance.ordinal);

    let total = items.len();
    let mut index: HashMap<String, usize> = HashMap::with_capacity(total);
    let mut kept: Vec<Normalized<T>> = Vec::with_capacity(total);

    for item in items {
        match index.get(item.entity.id()) {
            Some(&slot) => {
                if preference(&item, &kept[slot]) == Ordering::Less {
                    kept[slot] = item;
                }
            }
            None => {
                index.insert(item.entity.id().to_owned(), kept.len());
                kept.push(item);
            }
        }
    }

    if kept.len() < total {
        log::debug!("Merged {} duplicate records into {}", total - kept.len(), kept.len());
    }

    kept
}

/// Orders two records with the same id; `Less` means `a` is preferred.
fn preference<T: Unresolved>(a: &Normalized<T>, b: &Normalized<T>) -> Ordering {
    a.entity
        .unresolved_fields()
        .cmp(&b.entity.unresolved_fields())
        .then_with(|| kind_rank(a.provenance.kind).cmp(&kind_rank(b.provenance.kind)))
        .then_with(|| a.provenance.ordinal.cmp(&b.provenance.ordinal))
}

const fn kind_rank(kind: StrategyKind) -> u8 {
    match kind {
        StrategyKind::Structural => 0,
        StrategyKind::Text => 1,
    }
}
