mod task_config;
pub use task_config::TaskConfig;

mod schedules_config;
pub use schedules_config::SchedulesConfig;
