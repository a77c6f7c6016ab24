use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
};
use serde::Deserialize;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::geo::valid_coordinates;
use crate::service::{SubmitOutcome, SubmitReport};
use crate::store::{DisasterRecord, LedgerRecord, NearbyDisaster};

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
}

/// Multipart form: text fields plus one `image` file part.
pub async fn submit_report(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<SubmitOutcome>> {
    let mut form = ReportForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("could not read image: {e}")))?;
            form.image = Some(bytes.to_vec());
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("could not read field {name}: {e}")))?;
            form.set(&name, value);
        }
    }

    let report = form.into_report()?;
    let outcome = state.emergency.submit_report(report).await?;
    Ok(Json(outcome))
}

pub async fn nearby_disasters(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> AppResult<Json<Vec<NearbyDisaster>>> {
    if !valid_coordinates(query.latitude, query.longitude) {
        return Err(AppError::Validation("coordinates are out of range".into()));
    }
    let disasters = state
        .emergency
        .nearby_disasters(query.latitude, query.longitude)
        .await?;
    Ok(Json(disasters))
}

pub async fn get_disaster(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DisasterRecord>> {
    let disaster = state
        .records
        .get_disaster(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("disaster {id}")))?;
    Ok(Json(disaster))
}

pub async fn get_ledger(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<LedgerRecord>> {
    let ledger = state
        .records
        .get_ledger(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("execution ledger for {id}")))?;
    Ok(Json(ledger))
}

#[derive(Debug, Default)]
struct ReportForm {
    emergency_type: Option<String>,
    urgency_level: Option<String>,
    situation: Option<String>,
    people_count: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    user_id: Option<String>,
    image: Option<Vec<u8>>,
}

impl ReportForm {
    fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "emergency_type" => &mut self.emergency_type,
            "urgency_level" => &mut self.urgency_level,
            "situation" => &mut self.situation,
            "people_count" => &mut self.people_count,
            "latitude" => &mut self.latitude,
            "longitude" => &mut self.longitude,
            "user_id" => &mut self.user_id,
            _ => return,
        };
        *slot = Some(value);
    }

    fn into_report(self) -> AppResult<SubmitReport> {
        Ok(SubmitReport {
            emergency_type: required(self.emergency_type, "emergency_type")?,
            urgency_level: required(self.urgency_level, "urgency_level")?,
            situation: self.situation.unwrap_or_default(),
            people_count: parse(self.people_count.as_deref().unwrap_or("0"), "people_count")?,
            latitude: parse(&required(self.latitude, "latitude")?, "latitude")?,
            longitude: parse(&required(self.longitude, "longitude")?, "longitude")?,
            image: self.image,
            submitter_id: required(self.user_id, "user_id")?,
        })
    }
}

fn required(value: Option<String>, name: &str) -> AppResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parse<T: std::str::FromStr>(raw: &str, name: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("{name} is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> ReportForm {
        let mut form = ReportForm::default();
        for (name, value) in [
            ("emergency_type", "flood"),
            ("urgency_level", "urgent"),
            ("situation", "Water rising"),
            ("people_count", "3"),
            ("latitude", "6.9271"),
            ("longitude", "79.8612"),
            ("user_id", "u-1"),
            ("unknown", "ignored"),
        ] {
            form.set(name, value.to_string());
        }
        form
    }

    #[test]
    fn test_form_builds_report() {
        let report = filled().into_report().unwrap();
        assert_eq!(report.emergency_type, "flood");
        assert_eq!(report.people_count, 3);
        assert_eq!(report.latitude, 6.9271);
        assert!(report.image.is_none());
    }

    #[test]
    fn test_form_rejects_bad_numbers() {
        let mut form = filled();
        form.set("latitude", "north".to_string());
        let err = form.into_report().unwrap_err();
        assert_eq!(err.to_string(), "Validation error: latitude is not a valid number");
    }

    #[test]
    fn test_form_requires_emergency_type() {
        let mut form = filled();
        form.emergency_type = None;
        assert!(form.into_report().is_err());
    }

    #[test]
    fn test_nearby_query_deserialize() {
        let query: NearbyQuery =
            serde_json::from_str(r#"{"latitude": 1.5, "longitude": -2.0}"#).unwrap();
        assert_eq!(query.latitude, 1.5);
        assert_eq!(query.longitude, -2.0);
    }
}
