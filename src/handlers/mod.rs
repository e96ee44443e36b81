// handlers/mod.rs - Route handlers grouped by surface
//
// system → always open (/ping, /health, 404)
// file   → open, raw bytes behind `<base>_linked` URLs
// auth   → credential lifecycle, checks its own bearer tokens
// data   → generic CRUD, behind the request gate

pub mod auth;
pub mod data;
pub mod file;
pub mod system;
