//! Concrete, cluster-backed implementations of the collaborator traits
//! (§6). Everything here is thin glue over `kube`; the decision logic lives
//! in `oracle` and `window`.

pub mod annotations;
pub mod evict;
pub mod gc;
pub mod known_good;
pub mod latest;
pub mod leader;
pub mod manifest;
pub mod requests;
pub mod watchdog;
