pub(crate) mod colors;
pub mod shutdown;

/// Name the annotation patcher reports as field manager.
pub(crate) const MANAGER_NAME: &str = "autocrane";
