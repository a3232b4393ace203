//! HTTP handler functions for the ADS-B hex map API.

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use adsb_hex_aggregate::geojson::{IdField, ValueField, to_feature_collection};
use adsb_hex_aggregate::{AggregationRequest, SpatialAggregator, records};
use adsb_hex_imagery::{
    DEFAULT_RESOLUTION, EVALSCRIPT_TRUE_COLOR, cell_to_bbox, dimensions_for_resolution,
};
use adsb_hex_observation::DatasetError;
use adsb_hex_observation_models::ObservationSet;
use adsb_hex_server_models::{
    AggregateParams, AggregateResponse, ApiHealth, ApiReload, BboxParams, BboxResponse,
    MapErrorPayload, MapRequest, ObservationPage, ObservationQueryParams,
};
use serde::Serialize;
use serde_json::Value;

use crate::{AppState, MapError};

/// Rows returned by `/api/observations` when no limit is given.
const DEFAULT_PAGE_SIZE: usize = 100;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
#[serde(untagged)]
enum MapResponse {
    Aggregate(AggregateResponse),
    Bbox(BboxResponse),
}

/// `POST /map`
///
/// Dispatches on the shape of `{"data": {...}}`: an aggregation when
/// `Distance` is present, otherwise a bounding box when `x_adjust` is
/// present. Every failure is answered with HTTP 400 and the
/// `{"Error during map making": ..., "data": ...}` payload.
pub async fn map(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            let raw = Value::String(String::from_utf8_lossy(&body).into_owned());
            return map_error(&MapError::from(e), raw);
        }
    };

    let dataset = state.dataset.snapshot();
    let request_body = body.clone();
    let result = web::block(move || handle_map(dataset, &request_body))
        .await
        .map_err(MapError::from)
        .and_then(|result| result);

    match result {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => map_error(&e, body),
    }
}

fn handle_map(dataset: Arc<ObservationSet>, body: &Value) -> Result<MapResponse, MapError> {
    let request = MapRequest::try_from(body)?;
    log::debug!("map request: {request:?}");

    Ok(match request {
        MapRequest::Aggregate(params) => MapResponse::Aggregate(aggregate(dataset, &params)?),
        MapRequest::Bbox(params) => MapResponse::Bbox(bbox(&params)?),
    })
}

fn aggregate(
    dataset: Arc<ObservationSet>,
    params: &AggregateParams,
) -> Result<AggregateResponse, MapError> {
    let aggregates = SpatialAggregator::new(dataset).aggregate(&AggregationRequest {
        distance_miles: params.distance,
        resolution: params.resolution,
        significance: params.significance,
    })?;

    Ok(AggregateResponse {
        h3_df: records::records_json(&aggregates, params.resolution)?,
        h3_gdf: records::geodataframe_json(&aggregates, params.resolution)?,
        geojson_obj_h3_gdf: to_feature_collection(
            &aggregates,
            IdField::CellId,
            &ValueField::Count,
        ),
    })
}

fn bbox(params: &BboxParams) -> Result<BboxResponse, MapError> {
    let bbox = cell_to_bbox(&params.cell_id, params.x_adjust, params.y_adjust)?;
    let sized = dimensions_for_resolution(&bbox, DEFAULT_RESOLUTION)?;

    Ok(BboxResponse {
        evalscript_true_color: EVALSCRIPT_TRUE_COLOR.to_string(),
        tampa_bbox: bbox.normalized(),
        tampa_size: sized.size,
        bcords_str: bbox.describe(),
        nw_rs_str: sized.correction_note(),
    })
}

fn map_error(error: &MapError, data: Value) -> HttpResponse {
    if error.is_rejection() {
        log::warn!("Rejected map request: {error}");
    } else {
        log::error!("Map request failed: {error}");
    }

    HttpResponse::BadRequest().json(MapErrorPayload {
        error: error.to_string(),
        data,
    })
}

/// `GET /api/observations`
///
/// Pages through the loaded dataset.
pub async fn observations(
    state: web::Data<AppState>,
    params: web::Query<ObservationQueryParams>,
) -> HttpResponse {
    let dataset = state.dataset.snapshot();
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    HttpResponse::Ok().json(ObservationPage {
        total: dataset.len(),
        offset,
        observations: dataset
            .observations()
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect(),
    })
}

/// `POST /api/dataset/reload`
///
/// Re-reads the dataset file. Requests already running keep the snapshot
/// they started with.
pub async fn reload(state: web::Data<AppState>) -> HttpResponse {
    let handle = state.dataset.clone();
    match web::block(move || handle.reload()).await {
        Ok(Ok(set)) => HttpResponse::Ok().json(ApiReload {
            observations: set.len(),
            resolutions: set.resolutions().iter().copied().collect(),
        }),
        Ok(Err(DatasetError::NotReloadable)) => {
            log::warn!("Reload requested for a dataset without a source file");
            HttpResponse::Conflict().json(serde_json::json!({
                "error": DatasetError::NotReloadable.to_string()
            }))
        }
        Ok(Err(e)) => {
            log::error!("Failed to reload dataset: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to reload dataset: {e}")
            }))
        }
        Err(e) => {
            log::error!("Dataset reload was interrupted: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Dataset reload was interrupted"
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use actix_web::{App, http::StatusCode, test};
    use adsb_hex_observation::{DatasetHandle, DatasetSource, header_for};
    use adsb_hex_observation_models::Observation;
    use serde_json::json;

    use super::*;
    use crate::configure;

    const RESOLUTION: u8 = 9;

    fn cell(lat: f64, lon: f64) -> String {
        adsb_hex_grid::cell_for_point(lat, lon, RESOLUTION).unwrap()
    }

    fn dataset() -> ObservationSet {
        let a = cell(27.84, -82.50);
        let b = cell(27.97, -82.53);
        let obs = |distance, category: &str, cell: &str| {
            Observation::new(distance, category).with_cell(RESOLUTION, cell)
        };
        ObservationSet::new(
            BTreeSet::from([RESOLUTION]),
            vec![
                obs(0.5, "A1", &a),
                obs(0.7, "A3", &a),
                obs(0.9, "A1", &a),
                obs(1.2, "B6", &b),
                obs(9.0, "A1", &b),
            ],
        )
    }

    fn state(handle: DatasetHandle) -> web::Data<AppState> {
        web::Data::new(AppState {
            dataset: Arc::new(handle),
        })
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state).configure(configure)).await
        };
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let app = app!(state(DatasetHandle::from_set(dataset())));
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["healthy"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn aggregation_request_returns_all_three_tables() {
        let app = app!(state(DatasetHandle::from_set(dataset())));
        let req = test::TestRequest::post()
            .uri("/map")
            .set_json(json!({"data": {"Distance": 100, "Resolution": RESOLUTION, "Significance": 2}}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let collection = &body["geojson_obj_h3_gdf"];
        assert_eq!(collection["type"], "FeatureCollection");
        let features = collection["features"].as_array().unwrap();
        assert_eq!(features.len(), 1, "{body}");
        assert_eq!(features[0]["id"], cell(27.84, -82.50));
        assert_eq!(features[0]["properties"]["value"], 3);

        let records: Value = serde_json::from_str(body["h3_df"].as_str().unwrap()).unwrap();
        assert_eq!(records[0]["H3_9_cell"], cell(27.84, -82.50));
        assert_eq!(records[0]["category"], json!({"A1": 2, "A3": 1}));

        let gdf: Value = serde_json::from_str(body["h3_gdf"].as_str().unwrap()).unwrap();
        assert_eq!(gdf["features"][0]["id"], "0");
    }

    #[actix_web::test]
    async fn aggregation_is_also_mounted_under_api() {
        let app = app!(state(DatasetHandle::from_set(dataset())));
        let req = test::TestRequest::post()
            .uri("/api/map")
            .set_json(json!({"data": {"Distance": 1000, "Resolution": RESOLUTION}}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["geojson_obj_h3_gdf"]["features"].as_array().unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn bbox_request_returns_sized_box() {
        let app = app!(state(DatasetHandle::from_set(dataset())));
        let req = test::TestRequest::post()
            .uri("/map")
            .set_json(json!({"data": {"x_adjust": 0.02, "y_adjust": 0.02, "cell_id": cell(27.84, -82.50)}}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert!(body["evalscript_true_color"].as_str().unwrap().contains("VERSION=3"));
        assert_eq!(body["tampa_bbox"]["_crs"], "4326");
        // x spans longitude.
        let min_x = body["tampa_bbox"]["min_x"].as_f64().unwrap();
        assert!((-82.6..-82.4).contains(&min_x), "{body}");
        let size = body["tampa_size"].as_array().unwrap();
        assert_eq!(size.iter().filter_map(Value::as_u64).max(), Some(2500));
        assert!(body["bcords_str"].as_str().unwrap().starts_with("Box coordinates: ("));
        assert!(body["nw_rs_str"].as_str().is_some(), "{body}");
    }

    #[actix_web::test]
    async fn negative_adjustments_send_an_ordered_box() {
        let app = app!(state(DatasetHandle::from_set(dataset())));
        let req = test::TestRequest::post()
            .uri("/map")
            .set_json(json!({"data": {"x_adjust": -0.02, "y_adjust": -0.01, "cell_id": cell(27.84, -82.50)}}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let bbox = &body["tampa_bbox"];
        let coord = |key: &str| bbox[key].as_f64().unwrap();
        assert!(coord("min_x") < coord("max_x"), "{body}");
        assert!(coord("min_y") < coord("max_y"), "{body}");
        assert!((coord("max_x") - coord("min_x") - 0.04).abs() < 1e-9, "{body}");

        // The description keeps the box as built from the adjustments.
        let described = body["bcords_str"].as_str().unwrap();
        let first: f64 = described
            .trim_start_matches("Box coordinates: (")
            .split(',')
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert!((first - coord("max_x")).abs() < 1e-9, "{body}");
    }

    #[actix_web::test]
    async fn box_past_the_poles_is_rejected() {
        let app = app!(state(DatasetHandle::from_set(dataset())));
        let request = json!({"data": {"x_adjust": 90, "y_adjust": 90, "cell_id": cell(27.84, -82.50)}});
        let req = test::TestRequest::post()
            .uri("/map")
            .set_json(&request)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        let message = body["Error during map making"].as_str().unwrap();
        assert!(message.starts_with("Bounding box latitudes ("), "{message}");
        assert!(message.ends_with(") are outside [-90, 90]"), "{message}");
        assert_eq!(body["data"], request);
    }

    #[actix_web::test]
    async fn oversized_adjustment_is_reported_with_the_request() {
        let app = app!(state(DatasetHandle::from_set(dataset())));
        let request = json!({"data": {"x_adjust": 200, "y_adjust": 0.1, "cell_id": cell(27.84, -82.50)}});
        let req = test::TestRequest::post()
            .uri("/map")
            .set_json(&request)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["Error during map making"],
            "Error, X adjustments are too big in magnitude, convert to lat/lon degrees"
        );
        assert_eq!(body["data"], request);
    }

    #[actix_web::test]
    async fn unrecognized_and_malformed_bodies_are_rejected() {
        let app = app!(state(DatasetHandle::from_set(dataset())));

        let req = test::TestRequest::post()
            .uri("/map")
            .set_json(json!({"data": {"zoom": 3}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"], json!({"data": {"zoom": 3}}));

        let req = test::TestRequest::post()
            .uri("/map")
            .set_payload("not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"], "not json");
        assert!(
            body["Error during map making"]
                .as_str()
                .unwrap()
                .starts_with("Invalid JSON body"),
            "{body}"
        );
    }

    #[actix_web::test]
    async fn unsupported_resolution_is_a_map_error() {
        let app = app!(state(DatasetHandle::from_set(dataset())));
        let req = test::TestRequest::post()
            .uri("/map")
            .set_json(json!({"data": {"Distance": 100, "Resolution": 12}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(
            body["Error during map making"]
                .as_str()
                .unwrap()
                .contains("Unsupported resolution 12"),
            "{body}"
        );
    }

    #[actix_web::test]
    async fn observations_are_paged() {
        let app = app!(state(DatasetHandle::from_set(dataset())));
        let req = test::TestRequest::get()
            .uri("/api/observations?limit=2&offset=3")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["total"], 5);
        assert_eq!(body["offset"], 3);
        let rows = body["observations"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["category"], "B6");
        assert_eq!(rows[0]["H3_9_cell"], cell(27.97, -82.53));
    }

    #[actix_web::test]
    async fn in_memory_dataset_cannot_be_reloaded() {
        let app = app!(state(DatasetHandle::from_set(dataset())));
        let req = test::TestRequest::post()
            .uri("/api/dataset/reload")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn reload_picks_up_file_changes() {
        let path = std::env::temp_dir().join(format!(
            "adsb_hex_server_reload_{}.csv",
            std::process::id()
        ));
        let a = cell(27.84, -82.50);
        let header = header_for(&BTreeSet::from([RESOLUTION]), false).join(",");
        std::fs::write(&path, format!("{header}\n0.1,A1,{a}\n")).unwrap();

        let handle = DatasetHandle::load(DatasetSource::new(&path)).unwrap();
        let app = app!(state(handle));

        std::fs::write(
            &path,
            format!("{header}\n0.1,A1,{a}\n0.2,A2,{a}\n"),
        )
        .unwrap();

        let req = test::TestRequest::post()
            .uri("/api/dataset/reload")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({"observations": 2, "resolutions": [9]}));

        let req = test::TestRequest::get().uri("/api/observations").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 2);

        std::fs::remove_file(&path).ok();
    }
}
