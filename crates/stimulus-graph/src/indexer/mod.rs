pub mod filesystem;
pub mod graph;
pub mod imports;
pub mod manifest;
pub mod members;
pub mod parser;
pub mod pipeline;
pub mod symbols;
