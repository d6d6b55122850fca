pub mod collaborators;
pub mod credentials;
pub mod dashboard;
pub mod errors;
pub mod generator;
pub mod models;
pub mod probe;
pub mod providers;
pub mod registry;
pub mod relay;
pub mod store;
