pub mod analysis;
pub mod builder;
pub mod discovery;
pub mod model;
pub mod parser;
pub mod rewrite;
pub mod tokens;
