pub mod files;
pub mod format;
