//! In-process ledger core: transactions are batched into fixed-capacity
//! blocks, each block is sealed by a SHA-256 proof-of-work search and linked
//! to its predecessor by hash.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod constants;
pub mod mine;

pub use chain::{Chain, ChainError};
pub use constants::{DEFAULT_BLOCK_CAPACITY, DEFAULT_DIFFICULTY};

/// A transfer record. The core performs no validation: the amount may be zero
/// or negative and the payer may equal the payee.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub payer: String,
    pub payee: String,
    pub amount: f64,
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_micros() as u64
}

pub mod hasher {
    use super::Transaction;
    use sha2::{Digest, Sha256};

    /// Deterministic, order-preserving encoding of a block's immutable fields.
    /// Variable-length fields are length-prefixed so field boundaries stay
    /// unambiguous and distinct inputs cannot collide byte-wise.
    pub fn serialize(txs: &[Transaction], previous_hash: &str, timestamp_micros: u64) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(16 + previous_hash.len() + txs.len() * 32);
        bytes.extend_from_slice(&(txs.len() as u32).to_le_bytes());
        for tx in txs {
            bytes.extend_from_slice(&(tx.payer.len() as u32).to_le_bytes());
            bytes.extend_from_slice(tx.payer.as_bytes());
            bytes.extend_from_slice(&(tx.payee.len() as u32).to_le_bytes());
            bytes.extend_from_slice(tx.payee.as_bytes());
            bytes.extend_from_slice(&tx.amount.to_bits().to_le_bytes());
        }
        bytes.extend_from_slice(&(previous_hash.len() as u32).to_le_bytes());
        bytes.extend_from_slice(previous_hash.as_bytes());
        bytes.extend_from_slice(&timestamp_micros.to_le_bytes());
        bytes
    }

    /// SHA-256 digest rendered as 64 lowercase hex characters.
    pub fn digest(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }
}

pub mod pow {
    use super::hasher;

    /// Number of leading `'0'` hex characters in a hash string.
    pub fn leading_zero_hex_chars(hash: &str) -> u32 {
        hash.bytes().take_while(|&b| b == b'0').count() as u32
    }

    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        leading_zero_hex_chars(hash) >= difficulty
    }

    /// Brute-force nonce search: increment from `start_nonce`, digest
    /// `prefix ++ nonce`, and accept the first digest with at least
    /// `difficulty` leading zero hex characters. Unbounded; expected
    /// iterations are 16^difficulty.
    pub fn search(prefix: &[u8], start_nonce: u64, difficulty: u32) -> (u64, String) {
        search_bounded(prefix, start_nonce, difficulty, u64::MAX)
            .expect("nonce space exhausted (practically impossible)")
    }

    /// Same search with an injected nonce ceiling, for callers that must not
    /// risk an unbounded loop. Returns `None` when no nonce in
    /// `start_nonce + 1 ..= max_nonce` satisfies the difficulty.
    pub fn search_bounded(
        prefix: &[u8],
        start_nonce: u64,
        difficulty: u32,
        max_nonce: u64,
    ) -> Option<(u64, String)> {
        let mut buf = prefix.to_vec();
        let mut nonce = start_nonce;
        while nonce < max_nonce {
            nonce += 1;
            buf.truncate(prefix.len());
            buf.extend_from_slice(&nonce.to_le_bytes());
            let hash = hasher::digest(&buf);
            if meets_difficulty(&hash, difficulty) {
                return Some((nonce, hash));
            }
        }
        None
    }
}

/// One sealed unit of the ledger, or the single in-progress unit still
/// accumulating transactions. The hash is a pure function of
/// (transactions, previous hash, timestamp, nonce) and stays empty until the
/// block is sealed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    transactions: Vec<Transaction>,
    previous_hash: String,
    timestamp_micros: u64,
    nonce: u64,
    hash: String,
}

impl Block {
    /// Build an unsealed block, capturing the wall clock once. The previous
    /// hash is empty for the genesis block only.
    pub fn new(transactions: Vec<Transaction>, previous_hash: String) -> Self {
        Self::with_timestamp(transactions, previous_hash, now_micros())
    }

    /// Fixed-timestamp constructor; sealing a block built this way is fully
    /// deterministic.
    pub fn with_timestamp(
        transactions: Vec<Transaction>,
        previous_hash: String,
        timestamp_micros: u64,
    ) -> Self {
        Self {
            transactions,
            previous_hash,
            timestamp_micros,
            nonce: 0,
            hash: String::new(),
        }
    }

    fn push(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    fn recomputed_hash(&self) -> String {
        let mut bytes =
            hasher::serialize(&self.transactions, &self.previous_hash, self.timestamp_micros);
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        hasher::digest(&bytes)
    }

    /// Proof-of-work search: serialize the fixed fields once, then walk the
    /// nonce space from the current nonce until the digest meets
    /// `difficulty`. Runs to completion before returning; only the nonce and
    /// hash change.
    pub fn seal(&mut self, difficulty: u32) {
        let prefix =
            hasher::serialize(&self.transactions, &self.previous_hash, self.timestamp_micros);
        let (nonce, hash) = pow::search(&prefix, self.nonce, difficulty);
        self.nonce = nonce;
        self.hash = hash;
    }

    /// Bounded seal. On failure the block stays unsealed with its nonce
    /// advanced to `max_nonce`, so a later seal resumes the search there.
    pub fn seal_bounded(&mut self, difficulty: u32, max_nonce: u64) -> bool {
        let prefix =
            hasher::serialize(&self.transactions, &self.previous_hash, self.timestamp_micros);
        match pow::search_bounded(&prefix, self.nonce, difficulty, max_nonce) {
            Some((nonce, hash)) => {
                self.nonce = nonce;
                self.hash = hash;
                true
            }
            None => {
                self.nonce = max_nonce;
                false
            }
        }
    }

    /// Parallel variant of `seal`, racing worker threads to the first valid
    /// nonce. The winning nonce may differ between runs; the resulting hash
    /// always satisfies the difficulty predicate.
    pub fn seal_parallel(&mut self, difficulty: u32) {
        let prefix =
            hasher::serialize(&self.transactions, &self.previous_hash, self.timestamp_micros);
        let (nonce, hash) = mine::search_parallel(&prefix, difficulty);
        self.nonce = nonce;
        self.hash = hash;
    }

    /// Recompute the digest from the stored fields and nonce; true iff it
    /// matches the stored hash and meets `difficulty`.
    pub fn validate(&self, difficulty: u32) -> bool {
        self.recomputed_hash() == self.hash && pow::meets_difficulty(&self.hash, difficulty)
    }

    pub fn is_sealed(&self) -> bool {
        !self.hash.is_empty()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn timestamp_micros(&self) -> u64 {
        self.timestamp_micros
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Empty until the block is sealed.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

pub mod chain {
    use super::{constants::DEFAULT_BLOCK_CAPACITY, pow, Block, Transaction};
    use thiserror::Error;
    use tracing::info;

    /// Integrity violations reported by `Chain::verify`, naming the first
    /// offending sealed block.
    #[derive(Clone, Debug, Error, PartialEq, Eq)]
    pub enum ChainError {
        #[error("block {index}: stored hash does not match its contents")]
        HashMismatch { index: usize },
        #[error("block {index}: hash does not meet difficulty {difficulty}")]
        DifficultyNotMet { index: usize, difficulty: u32 },
        #[error("block {index}: previous hash does not link to its predecessor")]
        BrokenLink { index: usize },
    }

    /// The full ledger: an append-only sequence of sealed blocks (index 0 is
    /// genesis) plus at most one open block accumulating new transactions.
    #[derive(Clone, Debug)]
    pub struct Chain {
        pub(crate) sealed: Vec<Block>,
        pub(crate) open: Option<Block>,
        pub(crate) difficulty: u32,
        pub(crate) capacity: usize,
    }

    impl Chain {
        /// Build a chain with the default per-block capacity and immediately
        /// mine its genesis block.
        pub fn new(difficulty: u32) -> Self {
            Self::with_capacity(difficulty, DEFAULT_BLOCK_CAPACITY)
        }

        pub fn with_capacity(difficulty: u32, capacity: usize) -> Self {
            let mut genesis = Block::new(Vec::new(), String::new());
            genesis.seal(difficulty);
            info!(
                "sealed genesis block with nonce {} and hash {}",
                genesis.nonce(),
                genesis.hash()
            );
            Self {
                sealed: vec![genesis],
                open: None,
                difficulty,
                capacity,
            }
        }

        /// Append a transaction to the open block, first sealing and rotating
        /// it if it is absent or already at capacity. Never rejects.
        pub fn submit(&mut self, tx: Transaction) {
            match self.open.as_mut() {
                Some(block) if block.transactions().len() < self.capacity => block.push(tx),
                _ => {
                    self.commit();
                    let previous_hash = self.tail().hash().to_string();
                    self.open = Some(Block::new(vec![tx], previous_hash));
                }
            }
        }

        /// Seal the open block with the chain's difficulty and append it to
        /// the sealed sequence. No-op when no block is open; this is the only
        /// path from open to sealed.
        pub fn commit(&mut self) {
            if let Some(mut block) = self.open.take() {
                block.seal(self.difficulty);
                info!(
                    "sealed block {} with nonce {} and hash {}",
                    self.sealed.len(),
                    block.nonce(),
                    block.hash()
                );
                self.sealed.push(block);
            }
        }

        /// The last sealed block. The open block is never the tail: new
        /// blocks always link to the last sealed hash.
        pub fn tail(&self) -> &Block {
            self.sealed.last().expect("genesis block always exists")
        }

        pub fn blocks(&self) -> &[Block] {
            &self.sealed
        }

        pub fn open_block(&self) -> Option<&Block> {
            self.open.as_ref()
        }

        pub fn difficulty(&self) -> u32 {
            self.difficulty
        }

        pub fn capacity(&self) -> usize {
            self.capacity
        }

        /// Recompute every sealed block's hash and check it against the
        /// difficulty and the predecessor link. The open block is not part of
        /// the check.
        pub fn verify(&self) -> Result<(), ChainError> {
            for (index, block) in self.sealed.iter().enumerate() {
                if block.recomputed_hash() != block.hash() {
                    return Err(ChainError::HashMismatch { index });
                }
                if !pow::meets_difficulty(block.hash(), self.difficulty) {
                    return Err(ChainError::DifficultyNotMet {
                        index,
                        difficulty: self.difficulty,
                    });
                }
                if index > 0 && block.previous_hash() != self.sealed[index - 1].hash() {
                    return Err(ChainError::BrokenLink { index });
                }
            }
            Ok(())
        }
    }
}
