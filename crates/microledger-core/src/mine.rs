use crate::{hasher, pow};
use rayon::prelude::*;
use tracing::info;

/// Parallel nonce search: rayon partitions the nonce space across worker
/// threads, each digesting `prefix ++ nonce` for its shard, and the race
/// stops at the first nonce any worker finds valid. Unlike `pow::search` the
/// winning nonce is not deterministic, so `Chain` never uses this path;
/// callers opt in through `Block::seal_parallel`.
pub fn search_parallel(prefix: &[u8], difficulty: u32) -> (u64, String) {
    let found = (1u64..u64::MAX)
        .into_par_iter()
        .find_any(|nonce| {
            let mut buf = prefix.to_vec();
            buf.extend_from_slice(&nonce.to_le_bytes());
            pow::meets_difficulty(&hasher::digest(&buf), difficulty)
        })
        .expect("nonce space exhausted (practically impossible)");

    let mut buf = prefix.to_vec();
    buf.extend_from_slice(&found.to_le_bytes());
    let hash = hasher::digest(&buf);
    info!("parallel search found nonce {} with hash {}", found, hash);
    (found, hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Block, Transaction};

    #[test]
    fn parallel_search_satisfies_difficulty() {
        let prefix = hasher::serialize(&[], "prev", 42);
        let (nonce, hash) = search_parallel(&prefix, 1);
        assert!(hash.starts_with('0'));
        let mut buf = prefix.clone();
        buf.extend_from_slice(&nonce.to_le_bytes());
        assert_eq!(hash, hasher::digest(&buf));
    }

    #[test]
    fn parallel_seal_validates() {
        let mut block = Block::with_timestamp(
            vec![Transaction {
                payer: "alice".into(),
                payee: "bob".into(),
                amount: 10.0,
            }],
            "prev".into(),
            1_600_000_000_000_000,
        );
        block.seal_parallel(1);
        assert!(block.is_sealed());
        assert!(block.validate(1));
    }
}
