pub mod events;
pub mod filters;
pub mod health;
pub mod metrics;
pub mod neural;
pub mod sessions;
pub mod squadrons;
