//! Round resolution engine: the resolver settles expired rounds, the
//! scheduler drives it on a fixed poll interval.

pub mod resolver;
pub mod scheduler;

pub use resolver::Resolver;
pub use scheduler::Scheduler;
