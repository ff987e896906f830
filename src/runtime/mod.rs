pub mod interpreter;
pub mod object_store;
