pub mod community_contribution_repository;
pub mod correlation_repository;
pub mod effectiveness_repository;
pub mod learning_pattern_repository;
pub mod question_feedback_repository;
pub mod settings_repository;
pub mod survey_repository;
pub mod task_source_repository;
