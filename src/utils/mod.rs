pub mod logger;
pub mod stats;
pub mod text;
