//! Concurrency primitives for shared filter state

mod striped;

pub use striped::{StripedLock, STRIPE_COUNT};
