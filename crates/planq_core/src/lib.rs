//! Logical plan analysis and rewriting.
//!
//! Plans are trees of [`logical::operator::LogicalOperator`] nodes. The
//! [`analyzer::Analyzer`] resolves names, pushes projections, filters and
//! index lookups into table access, plans indexed joins and wraps mutations
//! with the triggers that fire on them. The [`execution`] module runs the
//! resulting plan as pull-based row iterators.

pub mod analyzer;
pub mod arrays;
pub mod catalog;
pub mod config;
pub mod execution;
pub mod explain;
pub mod expr;
pub mod logical;
pub mod testutil;
