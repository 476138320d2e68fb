/// Join hash table: an insertion-ordered multi-map from key to row ids
///
/// Built single-threaded from the join column of the build side, then read
/// concurrently during the probe phase. Duplicate keys keep their insertion
/// order, which pins down the output order of duplicate matches.
use fxhash::FxHashMap;

const EMPTY: &[u64] = &[];

#[derive(Debug, Default)]
pub struct JoinHashTable {
    buckets: FxHashMap<u64, Vec<u64>>,
    rows: usize,
}

impl JoinHashTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            rows: 0,
        }
    }

    /// Build from a key column. Capacity is pre-reserved to
    /// `keys.len() * reserve_factor` to amortize growth.
    pub fn build(keys: &[u64], reserve_factor: usize) -> Self {
        let mut table = Self::with_capacity(keys.len().saturating_mul(reserve_factor));
        for (row, &key) in keys.iter().enumerate() {
            table.insert(key, row as u64);
        }
        table
    }

    pub fn insert(&mut self, key: u64, row: u64) {
        self.buckets.entry(key).or_default().push(row);
        self.rows += 1;
    }

    /// All rows matching `key`, in insertion order
    pub fn probe(&self, key: u64) -> &[u64] {
        self.buckets.get(&key).map(Vec::as_slice).unwrap_or(EMPTY)
    }

    /// Total number of inserted rows
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_probe() {
        let mut table = JoinHashTable::with_capacity(8);
        table.insert(1, 100);
        table.insert(1, 200);
        table.insert(2, 300);

        assert_eq!(table.probe(1), &[100, 200]);
        assert_eq!(table.probe(2), &[300]);
        assert!(table.probe(99).is_empty());
        assert_eq!(table.len(), 3);
        assert_eq!(table.key_count(), 2);
    }

    #[test]
    fn build_preserves_insertion_order_per_key() {
        let table = JoinHashTable::build(&[5, 7, 5, 5, 7], 2);
        assert_eq!(table.probe(5), &[0, 2, 3]);
        assert_eq!(table.probe(7), &[1, 4]);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn empty_build_side() {
        let table = JoinHashTable::build(&[], 2);
        assert!(table.is_empty());
        assert!(table.probe(0).is_empty());
    }
}
