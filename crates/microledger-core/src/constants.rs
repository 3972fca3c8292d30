pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Transactions packed into a block before `submit` forces a seal.
pub const DEFAULT_BLOCK_CAPACITY: usize = 5;
/// Leading zero hex characters the demo driver requires of each sealed hash.
pub const DEFAULT_DIFFICULTY: u32 = 4;
