//! Build-time constants shared across the node.

/// Directory under `$HOME` holding all persistent node state.
pub const DEFAULT_DATA_DIR_NAME: &str = ".metabasenet";

/// Subdirectory of the data directory used when running on the test
/// network, so mainnet and testnet state never mix.
pub const TESTNET_DIR_NAME: &str = "testnet";

/// Name of the exclusive lock file, both for the data directory itself
/// and for each managed database directory below it.
pub const LOCK_FILE_NAME: &str = ".lock";

/// Optional JSON configuration file inside the data directory.
pub const CONFIG_FILE_NAME: &str = "metabasenet.json";

/// Node log file inside the data directory.
pub const LOG_FILE_NAME: &str = "metabasenet.log";

/// Directory of the statistics database inside the data directory.
pub const DATASTAT_DIR_NAME: &str = "datastat";

/// Minimum free space required on the data directory filesystem.
pub const MIN_DATA_DIR_FREE_SPACE: u64 = 100 * 1024 * 1024;

/// Default peer-to-peer listen port.
pub const DEFAULT_P2P_PORT: u16 = 6801;

/// Default JSON-RPC listen port.
pub const DEFAULT_RPC_PORT: u16 = 6812;

/// Port offset applied to the defaults on testnet.
pub const TESTNET_PORT_OFFSET: u16 = 10000;

/// Accepted range for the log file size cap, in MiB.
pub const LOG_FILE_SIZE_RANGE_MB: std::ops::RangeInclusive<u64> = 1..=1024;

/// Accepted range for the number of rotated log files kept around.
pub const LOG_HISTORY_RANGE: std::ops::RangeInclusive<usize> = 1..=64;
