pub mod deps;
pub mod store;
