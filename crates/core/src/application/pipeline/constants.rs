// Pipeline constants (no magic values)
use std::time::Duration;

/// Records requested per store page during batch loading
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Upper bound on pages read in one load (guards against a store that never
/// returns a short page)
pub const MAX_LOAD_PAGES: u32 = 10_000;

/// Delay inserted before and after each item's engine call (rate limiting)
pub const DEFAULT_PACING_DELAY: Duration = Duration::from_millis(500);

/// Per-call engine timeout
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(300);

/// Progress steps contributed by the ingestion phase
pub const INGESTION_STEPS: u32 = 1;

/// Progress steps contributed by each item (one Data + one AI outcome)
pub const STEPS_PER_ITEM: u32 = 2;

/// Alerts retained for the presentation layer
pub const ALERT_HISTORY_CAPACITY: usize = 200;

/// Buffer of the live alert broadcast channel
pub const ALERT_CHANNEL_CAPACITY: usize = 256;
