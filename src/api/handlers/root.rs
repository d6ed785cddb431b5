use axum::response::IntoResponse;

// Plain banner for load balancers and the curious.
pub async fn root() -> impl IntoResponse {
    "FRAGO Backend Running"
}
