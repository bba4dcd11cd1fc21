/// Authorization gate over the configured admin roster.
pub mod auth;
/// Chat-command parsing and dispatch.
pub mod commands;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Game lifecycle orchestration.
pub mod lifecycle;
/// Pairing draw over unassigned participants.
pub mod pairing;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
