pub mod context;
pub mod reporter;
