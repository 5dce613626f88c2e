pub mod scheduler;

pub use scheduler::{next_run_after, BatchRunner, ImportSchedule, PgScheduleStore, ScheduleStore, Scheduler};
