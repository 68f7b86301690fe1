pub mod enums;
pub mod orders;
pub mod plans;
