pub mod google_form;
pub mod memory_ledger;
