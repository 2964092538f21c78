pub mod cache;
pub mod classifier;
pub mod community_service;
pub mod correlation_service;
pub mod effectiveness_analyzer;
pub mod feedback_learning_service;
pub mod progressive_adapter;
pub mod settings_service;
pub mod task_aggregator;
