//! Protocol constants.

/// Name of the change bin created at account birth (index 0).
pub const CHANGE_BIN_NAME: &str = "@change";

/// Name of the default receive bin created at account birth (index 1).
pub const DEFAULT_BIN_NAME: &str = "@default";

/// Meta-name selecting every account or bin in view queries.
pub const ALL_SELECTOR: &str = "@all";

/// How far past the horizon timestamp block ingestion still attaches
/// headers whose parent is unknown.
pub const TIME_HORIZON_WINDOW: u32 = 6 * 60 * 60;

/// Horizon timestamp reported when no account exists yet.
pub const HORIZON_NONE: u32 = 0xffff_ffff;

/// Sentinel recorded as a transaction's index within its merkle block.
pub const BLOCK_TX_INDEX_UNKNOWN: u32 = 0xffff_ffff;

/// Pool size used when an account does not specify one.
pub const DEFAULT_UNUSED_POOL_SIZE: u32 = 25;

/// SIGHASH byte appended to signature hashes and signatures.
pub const SIGHASH_ALL: u8 = 0x01;
