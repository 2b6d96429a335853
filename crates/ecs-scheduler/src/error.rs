use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("dependency cycle detected among system indices {cycle:?}")]
    CircularDependency { cycle: Vec<usize> },
}
