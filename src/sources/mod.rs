pub mod readm;
pub mod readm_parser;
