pub mod sql_refs;

pub use sql_refs::*;
