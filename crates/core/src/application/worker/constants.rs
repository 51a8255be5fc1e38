// Engine constants (ADR: No magic values)
use std::time::Duration;

/// Dispatcher poll interval (5s)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Pending jobs fetched per dispatcher tick
pub const DEFAULT_DISPATCH_LIMIT: usize = 10;

/// Pause between two input lines of the same job (1s)
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_secs(1);

/// How long shutdown waits for in-flight workers to hand their jobs back (30s)
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Age of `updated_at` after which a `processing` job counts as orphaned.
/// Zero suits a single daemon: nothing else can own a processing job at startup.
pub const DEFAULT_RECOVERY_WINDOW_MS: i64 = 0;

/// Minimum title length accepted by the validation gate (characters)
pub const MIN_TITLE_CHARS: usize = 40;

/// Minimum readable text extracted from a source page (characters)
pub const MIN_SOURCE_CHARS: usize = 200;

/// Upper bound on input lines per job
pub const MAX_LINES_PER_JOB: usize = 500;

/// Upper bound on one input line (bytes)
pub const MAX_LINE_BYTES: usize = 2048;
