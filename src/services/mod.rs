/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Leaderboard reads.
pub mod leaderboard_service;
/// Post submission with limits and quotas.
pub mod post_service;
/// Presence socket handling and count publication.
pub mod presence_service;
/// Background lifecycle scheduler and limiter sweeper.
pub mod round_scheduler;
/// Round reads and administration.
pub mod round_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
/// Wallet-to-user resolution.
pub mod user_service;
/// Vote casting with limits and quotas.
pub mod vote_service;
