pub mod facet_parser;

pub use facet_parser::build_catalog;
