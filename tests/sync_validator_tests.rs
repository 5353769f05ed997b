//! Tests for the synchronous validation service client against a mock
//! endpoint.
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::post,
};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use url::Url;

use metaharvest::domain::outcome::{ArtifactLocation, HarvestUnit};
use metaharvest::domain::services::{RecordValidator, ValidationError};
use metaharvest::infrastructure::config::HttpConfig;
use metaharvest::infrastructure::http_client::build_client;
use metaharvest::infrastructure::sync_validator::SyncValidator;

const UNIT_PAYLOAD: &[u8] =
    br#"{"response": "GetRecordsResponse", "searchResults": {"numberOfRecordsMatched": 2}}"#;
const RESULT_BODY: &str = r#"{"result": "passed", "resources": 2}"#;
const REPORT_URL: &str = "http://validator.example/reports/42";

#[derive(Clone)]
struct ValidateState {
    status: StatusCode,
    omit_location: bool,
    bodies: Arc<Mutex<Vec<Vec<u8>>>>,
}

async fn validate_endpoint(State(state): State<ValidateState>, body: Bytes) -> impl IntoResponse {
    state.bodies.lock().unwrap().push(body.to_vec());
    if state.status != StatusCode::CREATED {
        return (state.status, "refused").into_response();
    }
    if state.omit_location {
        (StatusCode::CREATED, RESULT_BODY).into_response()
    } else {
        (
            StatusCode::CREATED,
            [(header::LOCATION, REPORT_URL)],
            RESULT_BODY,
        )
            .into_response()
    }
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

struct Setup {
    validator: SyncValidator,
    bodies: Arc<Mutex<Vec<Vec<u8>>>>,
    unit: HarvestUnit,
    results: PathBuf,
    _work: TempDir,
}

async fn setup(status: StatusCode) -> Setup {
    setup_with(status, false).await
}

async fn setup_with(status: StatusCode, omit_location: bool) -> Setup {
    let work = TempDir::new().unwrap();
    let results = work.path().join("results");
    std::fs::create_dir_all(&results).unwrap();
    let unit_path = work.path().join("dataset-a.json");
    std::fs::write(&unit_path, UNIT_PAYLOAD).unwrap();
    let unit = HarvestUnit::from_path(unit_path).unwrap();

    let bodies = Arc::new(Mutex::new(Vec::new()));
    let state = ValidateState {
        status,
        omit_location,
        bodies: Arc::clone(&bodies),
    };
    let app = Router::new()
        .route("/validate", post(validate_endpoint))
        .with_state(state);
    let base = serve(app).await;

    let client = build_client(&HttpConfig::default()).unwrap();
    let endpoint = Url::parse(&format!("{base}/validate")).unwrap();
    Setup {
        validator: SyncValidator::new(client, endpoint, results.clone()),
        bodies,
        unit,
        results,
        _work: work,
    }
}

fn result_files(setup: &Setup) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(&setup.results)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn accepted_submission_stores_the_result_verbatim() {
    let setup = setup(StatusCode::CREATED).await;
    let cancel = CancellationToken::new();

    let artifacts = setup.validator.submit(&setup.unit, cancel).await.unwrap();

    let stored = setup.results.join("dataset-a.json");
    assert_eq!(
        artifacts,
        vec![
            ArtifactLocation::Url(REPORT_URL.to_string()),
            ArtifactLocation::File(stored.clone()),
        ]
    );
    assert_eq!(std::fs::read_to_string(stored).unwrap(), RESULT_BODY);
    // the record set travels to the service unmodified
    assert_eq!(setup.bodies.lock().unwrap()[0], UNIT_PAYLOAD);
}

#[tokio::test]
async fn created_without_a_location_is_a_protocol_error() {
    let setup = setup_with(StatusCode::CREATED, true).await;
    let cancel = CancellationToken::new();

    let error = setup
        .validator
        .submit(&setup.unit, cancel)
        .await
        .unwrap_err();
    assert!(matches!(error, ValidationError::Protocol(_)));
    assert!(result_files(&setup).is_empty());
}

#[tokio::test]
async fn rejected_submission_persists_nothing() {
    let setup = setup(StatusCode::BAD_REQUEST).await;
    let cancel = CancellationToken::new();

    let error = setup
        .validator
        .submit(&setup.unit, cancel)
        .await
        .unwrap_err();
    assert!(matches!(error, ValidationError::Rejected(_)));
    assert!(result_files(&setup).is_empty());
}

#[tokio::test]
async fn server_failure_is_not_a_rejection() {
    let setup = setup(StatusCode::INTERNAL_SERVER_ERROR).await;
    let cancel = CancellationToken::new();

    let error = setup
        .validator
        .submit(&setup.unit, cancel)
        .await
        .unwrap_err();
    assert!(matches!(error, ValidationError::ServerError(_)));
    assert!(result_files(&setup).is_empty());
}

#[tokio::test]
async fn unexpected_status_carries_the_code() {
    let setup = setup(StatusCode::IM_A_TEAPOT).await;
    let cancel = CancellationToken::new();

    let error = setup
        .validator
        .submit(&setup.unit, cancel)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        ValidationError::UnexpectedStatus { status: 418, .. }
    ));
}

#[tokio::test]
async fn cancelled_token_stops_the_submission_before_the_wire() {
    let setup = setup(StatusCode::CREATED).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let error = setup
        .validator
        .submit(&setup.unit, cancel)
        .await
        .unwrap_err();
    assert!(matches!(error, ValidationError::Cancelled));
    assert!(setup.bodies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn aggregate_report_is_not_supported() {
    let client = build_client(&HttpConfig::default()).unwrap();
    let endpoint = Url::parse("http://127.0.0.1:9/validate").unwrap();
    let validator = SyncValidator::new(client, endpoint, PathBuf::from("unused"));

    let error = validator.build_report().await.unwrap_err();
    assert!(matches!(error, ValidationError::NotSupported("sync")));
}
