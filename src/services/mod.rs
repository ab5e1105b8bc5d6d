//! Orchestration services, one module per core operation group

pub mod accounts;
pub mod backup;
pub mod credentials;
pub mod lifecycle;
pub mod register;
pub mod status;
pub mod steps;
