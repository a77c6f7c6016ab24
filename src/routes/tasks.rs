use axum::{
    Json,
    extract::{Path, State},
};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::geo::valid_coordinates;
use crate::tasks::{HelpRequest, HelpRequestOutcome, ResponseTask};

pub async fn generate_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ResponseTask>> {
    let task = state.tasks.generate_for_disaster(&id).await?;
    Ok(Json(task))
}

pub async fn submit_help_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut body): Json<HelpRequest>,
) -> AppResult<Json<HelpRequestOutcome>> {
    if body.help.trim().is_empty() {
        return Err(AppError::Validation("help must not be empty".into()));
    }
    if !valid_coordinates(body.latitude, body.longitude) {
        return Err(AppError::Validation("coordinates are out of range".into()));
    }
    body.disaster_id = id;

    let outcome = state.tasks.submit_help_request(body).await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_request_body_without_disaster_id() {
        let body: HelpRequest = serde_json::from_str(
            r#"{"user_id": "u-1", "help": "water", "urgency_type": "moderate",
                "latitude": 6.9, "longitude": 79.8}"#,
        )
        .unwrap();
        assert!(body.disaster_id.is_empty());
        assert_eq!(body.help, "water");
    }
}
