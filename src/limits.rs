// Hard upper bounds enforced by `SimConfig::validate`.

pub const MAX_EVENTS: usize = 10_000;
pub const MAX_CAPACITY: u32 = 1_000_000;
pub const MAX_WORKERS: usize = 4_096;
pub const MAX_REGISTRY_SLOTS: usize = 4_096;
pub const MAX_TICKETS_PER_BOOKING: u32 = 10_000;
pub const MAX_DELAY_MS: u64 = 60_000;
