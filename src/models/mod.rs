pub mod aggregate;
pub mod community;
pub mod correlation;
pub mod effectiveness;
pub mod household;
pub mod learning;
pub mod progress;
pub mod settings;
pub mod survey;
pub mod task;
