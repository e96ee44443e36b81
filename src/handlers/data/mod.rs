// handlers/data/mod.rs - Generic CRUD over any collection

pub mod collection;
pub mod document;
pub mod utils;
