//! The glue layer: concrete job factories, the job registry, and the
//! mapping from trigger events to pipelines.

pub mod jobs;
pub mod router;

pub use jobs::default_registry;
pub use router::{Dispatch, dispatch};
