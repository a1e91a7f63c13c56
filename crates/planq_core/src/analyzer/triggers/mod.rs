//! Trigger rewriting.
//!
//! Trigger definitions are validated when created. Statements that mutate a
//! table with stored triggers get each matching trigger's compiled body
//! wrapped around the mutation.

pub mod apply;
pub mod order;
pub mod resolve_old_new;
