use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Secret Santa backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::webhook::receive_update,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::command::InboundUpdate,
            crate::dto::command::CommandAck,
            crate::dto::command::AckStatus,
            crate::dto::game::GameSummary,
            crate::dao::models::GameState,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "webhook", description = "Chat platform update intake"),
    )
)]
pub struct ApiDoc;
