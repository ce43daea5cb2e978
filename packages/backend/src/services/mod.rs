pub mod assessment;
pub mod concept;
pub mod feedback;
pub mod llm_provider;
pub mod mastery;
pub mod plan;
pub mod profile;
