use axum::{Json, Router, extract::State, routing::post};
use validator::Validate;

use crate::{
    dto::command::{CommandAck, InboundUpdate},
    error::AppError,
    services::commands,
    state::SharedState,
};

#[utoipa::path(
    post,
    path = "/webhook",
    tag = "webhook",
    request_body = InboundUpdate,
    responses(
        (status = 200, description = "Update consumed", body = CommandAck),
        (status = 400, description = "Malformed update"),
        (status = 503, description = "Storage unavailable"),
    )
)]
/// Consume one chat update pushed by the platform adapter.
pub async fn receive_update(
    State(state): State<SharedState>,
    Json(update): Json<InboundUpdate>,
) -> Result<Json<CommandAck>, AppError> {
    update.validate()?;
    let ack = commands::dispatch(&state, update).await?;
    Ok(Json(ack))
}

/// Configure the webhook routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/webhook", post(receive_update))
}
