// 进程生命周期：信号、关闭状态机、后台任务登记

pub mod coordinator;
pub mod signal;
pub mod tasks;

pub use coordinator::{LifecycleError, LifecyclePhase, ShutdownCoordinator, ShutdownReport};
pub use signal::{spawn_signal_listener, wait_for_signal};
pub use tasks::{BackgroundTasks, TaskRegistration};
