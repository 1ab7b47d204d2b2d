use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the voting rounds backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rounds::current_round,
        crate::routes::rounds::round_winner,
        crate::routes::rounds::round_posts,
        crate::routes::admin::create_round,
        crate::routes::admin::reset_rounds,
        crate::routes::admin::debug_rounds,
        crate::routes::posts::create_post,
        crate::routes::votes::cast_vote,
        crate::routes::leaderboard::leaderboard,
        crate::routes::sse::public_stream,
        crate::routes::presence::presence_socket,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::StorageStatus,
            crate::dto::round::RoundStatusResponse,
            crate::dto::round::RoundWinnerResponse,
            crate::dto::round::CreateRoundRequest,
            crate::dto::round::CreateRoundResponse,
            crate::dto::round::ResetResponse,
            crate::dto::round::DebugResponse,
            crate::dto::post::CreatePostRequest,
            crate::dto::post::CreatePostResponse,
            crate::dto::post::RoundPostsResponse,
            crate::dto::vote::CastVoteRequest,
            crate::dto::vote::CastVoteResponse,
            crate::dto::leaderboard::LeaderboardResponse,
            crate::dto::presence::PresenceUpdate,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::RoundPhaseEvent,
            crate::dto::sse::WinnerEvent,
            crate::dto::sse::PresenceEvent,
            crate::dao::models::GameMode,
            crate::dao::models::VoteType,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rounds", description = "Round status, winners and posts"),
        (name = "admin", description = "Token-guarded round administration"),
        (name = "posts", description = "Post submission"),
        (name = "votes", description = "Voting on posts"),
        (name = "leaderboard", description = "Recorded round winners"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "presence", description = "Online presence WebSocket"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/rounds/current",
            "/rounds/{id}/winner",
            "/rounds/{id}/posts",
            "/rounds/create-manual",
            "/rounds/reset",
            "/rounds/debug",
            "/posts",
            "/votes",
            "/leaderboard",
            "/sse/public",
            "/ws/presence",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
    }
}
