pub mod lifecycle;
pub mod runtime;
pub mod spec;

#[cfg(test)]
pub mod fake;

pub use lifecycle::{LifecycleEvent, LifecycleManager};
pub use runtime::{ContainerRuntime, DockerRuntime, LogStream};
pub use spec::ContainerStatus;
