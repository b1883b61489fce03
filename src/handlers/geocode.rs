// handlers/geocode.rs - GET /api/geocode/reverse handler

use std::collections::HashMap;

use axum::extract::State;
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AppQuery, AuthUser};
use crate::services::geocoding::Address;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReverseQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl ReverseQuery {
    pub fn coordinates(&self) -> Result<(f64, f64), ApiError> {
        let mut errors = HashMap::new();
        match self.lat {
            Some(lat) if (-90.0..=90.0).contains(&lat) => {}
            Some(_) => {
                errors.insert("lat".to_string(), "must be between -90 and 90".to_string());
            }
            None => {
                errors.insert("lat".to_string(), "is required".to_string());
            }
        }
        match self.lon {
            Some(lon) if (-180.0..=180.0).contains(&lon) => {}
            Some(_) => {
                errors.insert("lon".to_string(), "must be between -180 and 180".to_string());
            }
            None => {
                errors.insert("lon".to_string(), "is required".to_string());
            }
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) if errors.is_empty() => Ok((lat, lon)),
            _ => Err(ApiError::validation_error("Invalid coordinates", Some(errors))),
        }
    }
}

/// GET /api/geocode/reverse?lat=&lon= - Address for a coordinate pair
pub async fn reverse(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(query): AppQuery<ReverseQuery>,
) -> ApiResult<Address> {
    let (lat, lon) = query.coordinates()?;
    let address = state.geocoder.reverse(lat, lon).await?;
    Ok(ApiResponse::success(address))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_pair() {
        let q = ReverseQuery {
            lat: Some(13.7563),
            lon: Some(100.5018),
        };
        assert_eq!(q.coordinates().unwrap(), (13.7563, 100.5018));
    }

    #[test]
    fn reports_missing_and_out_of_range() {
        let q = ReverseQuery {
            lat: None,
            lon: Some(200.0),
        };
        let body = q.coordinates().unwrap_err().to_json();
        assert_eq!(body["field_errors"]["lat"], "is required");
        assert_eq!(body["field_errors"]["lon"], "must be between -180 and 180");
    }
}
