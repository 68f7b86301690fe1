pub mod delivery;
pub mod domain;
pub mod observability;
pub mod payments;
