pub mod captcha;
pub mod config;
pub mod driver;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod session;
pub mod shutdown;
pub mod workflow;
