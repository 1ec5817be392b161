//! Crossing from distributed to local representations
//!
//! Every materialization goes through [`materialize`], which enforces the
//! configured cap, logs the crossing and counts it. Bounded peeks use
//! [`peek`] and are not capped.

use crate::cluster::Collection;
use crate::errors::{EngineError, EngineResult, SourcePosition};
use crate::observability::{log_event_with_fields, Event};
use crate::session::Session;

/// Pulls every record of `collection` to the host
pub fn materialize<T>(
    collection: &Collection<T>,
    session: &Session,
    position: &SourcePosition,
) -> EngineResult<Vec<T>>
where
    T: Clone + Send + Sync,
{
    let records = match session.config().materialization_cap {
        Some(cap) => {
            let records = collection.take(cap + 1);
            if records.len() > cap {
                return Err(EngineError::materialization_limit(cap).at(position));
            }
            records
        }
        None => collection.collect(),
    };

    session.metrics().record_materialization(records.len() as u64);
    log_event_with_fields(
        Event::CollectionMaterialized,
        &[
            ("items", &records.len().to_string()),
            ("partitions", &collection.num_partitions().to_string()),
            ("position", &position.to_string()),
        ],
    );
    Ok(records)
}

/// The first `n` records, without materializing the rest
pub fn peek<T>(collection: &Collection<T>, n: usize) -> Vec<T>
where
    T: Clone + Send + Sync,
{
    collection.take(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::item::Item;
    use crate::session::EngineConfig;

    fn items(n: i64) -> Collection<Item> {
        Collection::parallelize((0..n).map(Item::Integer).collect(), 3)
    }

    #[test]
    fn test_materialize_counts() {
        let session = Session::start(EngineConfig::default()).unwrap();
        let records = materialize(&items(7), &session, &SourcePosition::default()).unwrap();
        assert_eq!(records.len(), 7);
        assert_eq!(session.metrics().snapshot().materializations, 1);
        assert_eq!(session.metrics().snapshot().items_materialized, 7);
    }

    #[test]
    fn test_cap_exceeded() {
        let config = EngineConfig {
            materialization_cap: Some(5),
            ..EngineConfig::default()
        };
        let session = Session::start(config).unwrap();
        let position = SourcePosition::new(2, 3);

        assert_eq!(materialize(&items(5), &session, &position).unwrap().len(), 5);
        let err = materialize(&items(6), &session, &position).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MaterializationLimit);
        assert_eq!(err.position(), Some(&position));
    }

    #[test]
    fn test_peek_is_bounded() {
        assert_eq!(peek(&items(100), 1), vec![Item::Integer(0)]);
        assert!(peek(&Collection::<Item>::empty(), 1).is_empty());
    }
}
