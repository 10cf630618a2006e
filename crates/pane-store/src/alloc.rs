//! Local id allocation.
//!
//! Stations, items, dummies, item links and bucket links all draw ids from
//! the same rule: one past the largest id in the collection, or `0` for an
//! empty collection. Gaps left by deletion are never refilled.

use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Next local id for `ids`, or `None` once `u64::MAX` is taken.
pub fn allocate_local_id(ids: &[u64]) -> Option<u64> {
    match ids.iter().max() {
        None => Some(0),
        Some(max) => max.checked_add(1),
    }
}

/// Allocate the next id and append it to `ids`. `scope` names the collection
/// in the error.
pub fn push_next(ids: &mut Vec<u64>, scope: impl fmt::Display) -> StoreResult<u64> {
    let id = allocate_local_id(ids).ok_or_else(|| StoreError::IdSpaceExhausted {
        scope: scope.to_string(),
    })?;
    ids.push(id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_collection_starts_at_zero() {
        assert_eq!(allocate_local_id(&[]), Some(0));
    }

    #[test]
    fn gaps_are_not_refilled() {
        let mut ids = vec![0, 1, 2, 3];
        ids.retain(|&id| id != 2);
        assert_eq!(ids, vec![0, 1, 3]);
        assert_eq!(allocate_local_id(&ids), Some(4));
    }

    #[test]
    fn sequential_pushes() {
        let mut ids = Vec::new();
        assert_eq!(push_next(&mut ids, "0").unwrap(), 0);
        assert_eq!(push_next(&mut ids, "0").unwrap(), 1);
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn emptied_collection_restarts() {
        let mut ids = vec![0, 1];
        ids.clear();
        assert_eq!(push_next(&mut ids, "0").unwrap(), 0);
    }

    #[test]
    fn reordered_collection_still_allocates_past_max() {
        assert_eq!(allocate_local_id(&[5, 1, 3]), Some(6));
    }

    #[test]
    fn exhausted_collection_is_an_error() {
        assert_eq!(allocate_local_id(&[3, u64::MAX]), None);
        let mut ids = vec![u64::MAX];
        let err = push_next(&mut ids, "0,0,i").unwrap_err();
        assert!(matches!(err, StoreError::IdSpaceExhausted { ref scope } if scope == "0,0,i"));
        assert_eq!(ids, vec![u64::MAX]);
    }

    proptest! {
        #[test]
        fn allocation_is_fresh_and_keeps_sorted(mut ids in proptest::collection::btree_set(0u64..1_000, 0..40)
            .prop_map(|s| s.into_iter().collect::<Vec<_>>())) {
            let next = push_next(&mut ids, "test").unwrap();
            prop_assert_eq!(ids.iter().filter(|&&id| id == next).count(), 1);
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn only_deleting_the_last_id_changes_the_next_id(ids in proptest::collection::btree_set(0u64..1_000, 1..40)
            .prop_map(|s| s.into_iter().collect::<Vec<_>>()), pick in any::<prop::sample::Index>()) {
            let before = allocate_local_id(&ids);
            let victim = ids[pick.index(ids.len())];
            let remaining: Vec<u64> = ids.iter().copied().filter(|&id| id != victim).collect();
            let after = allocate_local_id(&remaining);
            if victim == *ids.last().unwrap() {
                prop_assert!(after <= before);
            } else {
                prop_assert_eq!(after, before);
            }
        }
    }
}
