mod mode;
pub use mode::Mode;

mod overlap;
pub use overlap::OverlapPolicy;

mod task_descriptor;
pub use task_descriptor::{DEFAULT_LOCK_TTL, MAX_LOCK_TTL, TaskDescriptor};

/// Cron-style schedule expression as accepted by the trigger engine.
pub type Spec = String;

/// Key under which one task coordinates across every instance of the fleet.
pub type LockKey = String;
