pub mod logical_decorated;
pub mod logical_delete;
pub mod logical_filter;
pub mod logical_insert;
pub mod logical_join;
pub mod logical_project;
pub mod logical_scan;
pub mod logical_set;
pub mod logical_table;
pub mod logical_trigger;
pub mod logical_update;
pub mod logical_values;
pub mod operator;
pub mod scope;
pub mod transform;
