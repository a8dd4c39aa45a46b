pub mod download;
pub mod match_cmd;
pub mod scan;
