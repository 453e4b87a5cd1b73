pub mod config_cmd;
pub mod decay;
pub mod pack;
pub mod plan;
pub mod text;
