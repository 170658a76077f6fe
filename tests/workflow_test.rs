use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use shopee_cloner::profile::ShopProfile;
use shopee_cloner::shopee::model::{
    ClonedItemPayload, Envelope, ImageUpload, ItemIdResponse, ItemList, TokenResponse,
};
use shopee_cloner::shopee::{Platform, ShopeeError};
use shopee_cloner::workflow::{
    clone_product, CloneOutcome, CloneRequest, CloneStep, COMPLETION_MARKER,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Details(i64),
    Upload(String),
    Create(Value),
    Publish(i64),
}

/// Replays canned JSON bodies in order and records every call made.
#[derive(Clone, Default)]
struct RecordingPlatform {
    responses: Arc<Mutex<VecDeque<Result<Value>>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingPlatform {
    fn with_responses(responses: Vec<Result<Value>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    async fn next<T: serde::de::DeserializeOwned>(&self) -> Result<T, ShopeeError> {
        let next = self
            .responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted response")));
        match next {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(err) => Err(ShopeeError::Api {
                error: "scripted".into(),
                message: err.to_string(),
            }),
        }
    }

    async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn get_product_details(&self, item_id: i64) -> Result<Envelope<ItemList>, ShopeeError> {
        self.calls.lock().await.push(Call::Details(item_id));
        self.next().await
    }

    async fn upload_image(&self, image_url: &str) -> Result<Envelope<ImageUpload>, ShopeeError> {
        self.calls.lock().await.push(Call::Upload(image_url.to_string()));
        self.next().await
    }

    async fn create_item(
        &self,
        payload: &ClonedItemPayload,
    ) -> Result<Envelope<ItemIdResponse>, ShopeeError> {
        let body = serde_json::to_value(payload)?;
        self.calls.lock().await.push(Call::Create(body));
        self.next().await
    }

    async fn publish_item(&self, item_id: i64) -> Result<Envelope<ItemIdResponse>, ShopeeError> {
        self.calls.lock().await.push(Call::Publish(item_id));
        self.next().await
    }

    async fn exchange_auth_code(
        &self,
        _code: &str,
        _shop_id: i64,
    ) -> Result<TokenResponse, ShopeeError> {
        self.next().await
    }
}

fn profile() -> ShopProfile {
    ShopProfile {
        shop_id: 55,
        partner_id: 1,
        partner_key: "key".into(),
        access_token: "tok".into(),
        refresh_token: "ref".into(),
        shop_name: "Unisia SG".into(),
        image_hosting_url: "https://img.example.com/".into(),
    }
}

fn request() -> CloneRequest {
    CloneRequest::new(42, "SGM").unwrap()
}

fn source_item() -> Value {
    json!({
        "response": {
            "item_list": [{
                "item_id": 42,
                "item_name": "Blue Mug",
                "description": "A mug",
                "item_sku": "ABC123",
                "category_id": 100,
                "price_info": [{ "original_price": 12.5, "current_price": 10.0 }],
                "image": { "image_id_list": ["i1", "i2"] },
                "logistic_info": [{ "logistic_id": 1, "enabled": true }]
            }]
        }
    })
}

fn uploaded() -> Value {
    json!({ "response": { "image_info": { "image_id": "new1" } } })
}

fn item_id(id: i64) -> Value {
    json!({ "response": { "item_id": id } })
}

#[tokio::test]
async fn clones_and_publishes_with_new_cover() {
    let platform = RecordingPlatform::with_responses(vec![
        Ok(source_item()),
        Ok(uploaded()),
        Ok(item_id(777)),
        Ok(item_id(777)),
    ]);

    let report = clone_product(&platform, &profile(), &request()).await;

    assert!(report.is_success(), "log: {:#?}", report.log);
    assert_eq!(
        report.outcome,
        CloneOutcome::Completed {
            new_item_id: 777,
            published_item_id: 777
        }
    );
    assert_eq!(
        report.log.last().map(String::as_str),
        Some(format!("{}!", COMPLETION_MARKER).as_str())
    );

    let calls = platform.calls().await;
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], Call::Details(42));
    assert_eq!(
        calls[1],
        Call::Upload("https://img.example.com/ABC123_C_SGM.jpg".into())
    );
    match &calls[2] {
        Call::Create(body) => {
            assert_eq!(body["image"]["image_id_list"], json!(["new1", "i2"]));
            assert_eq!(body["original_price"], json!(12.5));
            assert_eq!(body["item_sku"], json!("ABC123"));
            assert_eq!(body["item_name"], json!("Blue Mug"));
            assert_eq!(body["logistic_info"][0]["logistic_id"], json!(1));
            assert!(body.get("weight").is_none());
            assert!(body.get("dimension").is_none());
        }
        other => panic!("expected create call, got {other:?}"),
    }
    assert_eq!(calls[3], Call::Publish(777));
}

#[tokio::test]
async fn empty_item_list_aborts_at_fetch() {
    let platform = RecordingPlatform::with_responses(vec![Ok(json!({
        "response": { "item_list": [] }
    }))]);

    let report = clone_product(&platform, &profile(), &request()).await;

    assert!(!report.is_success());
    assert_eq!(report.failed_step(), Some(CloneStep::FetchSource));
    assert_eq!(platform.calls().await, vec![Call::Details(42)]);
    assert!(!report.log_text().contains(COMPLETION_MARKER));
}

#[tokio::test]
async fn fetch_error_aborts_at_fetch() {
    let platform = RecordingPlatform::with_responses(vec![Err(anyhow!("boom"))]);

    let report = clone_product(&platform, &profile(), &request()).await;

    assert_eq!(report.failed_step(), Some(CloneStep::FetchSource));
    assert!(report.log_text().contains("boom"));
}

#[tokio::test]
async fn missing_sku_aborts_before_upload() {
    let mut item = source_item();
    item["response"]["item_list"][0]
        .as_object_mut()
        .unwrap()
        .remove("item_sku");
    let platform = RecordingPlatform::with_responses(vec![Ok(item)]);

    let report = clone_product(&platform, &profile(), &request()).await;

    assert_eq!(report.failed_step(), Some(CloneStep::DeriveImageUrl));
    assert_eq!(platform.calls().await, vec![Call::Details(42)]);
}

#[tokio::test]
async fn blank_sku_aborts_before_upload() {
    for sku in ["", "  "] {
        let mut item = source_item();
        item["response"]["item_list"][0]["item_sku"] = json!(sku);
        let platform = RecordingPlatform::with_responses(vec![Ok(item)]);

        let report = clone_product(&platform, &profile(), &request()).await;

        assert_eq!(report.failed_step(), Some(CloneStep::DeriveImageUrl), "sku {sku:?}");
        assert_eq!(platform.calls().await, vec![Call::Details(42)], "sku {sku:?}");
    }
}

#[tokio::test]
async fn upload_without_image_info_aborts() {
    let platform = RecordingPlatform::with_responses(vec![
        Ok(source_item()),
        Ok(json!({ "response": {} })),
    ]);

    let report = clone_product(&platform, &profile(), &request()).await;

    assert_eq!(report.failed_step(), Some(CloneStep::UploadImage));
    assert_eq!(platform.calls().await.len(), 2);
    assert!(report.log_text().contains("publicly accessible"));
}

#[tokio::test]
async fn missing_price_aborts_before_create() {
    let mut item = source_item();
    item["response"]["item_list"][0]
        .as_object_mut()
        .unwrap()
        .remove("price_info");
    let platform = RecordingPlatform::with_responses(vec![Ok(item), Ok(uploaded())]);

    let report = clone_product(&platform, &profile(), &request()).await;

    assert_eq!(report.failed_step(), Some(CloneStep::BuildPayload));
    let calls = platform.calls().await;
    assert_eq!(calls.len(), 2);
    assert!(!calls.iter().any(|c| matches!(c, Call::Create(_))));
}

#[tokio::test]
async fn create_without_item_id_aborts() {
    let platform = RecordingPlatform::with_responses(vec![
        Ok(source_item()),
        Ok(uploaded()),
        Ok(json!({ "response": {} })),
    ]);

    let report = clone_product(&platform, &profile(), &request()).await;

    assert_eq!(report.failed_step(), Some(CloneStep::CreateItem));
    assert!(!platform
        .calls()
        .await
        .iter()
        .any(|c| matches!(c, Call::Publish(_))));
}

#[tokio::test]
async fn publish_failure_reports_created_item() {
    let platform = RecordingPlatform::with_responses(vec![
        Ok(source_item()),
        Ok(uploaded()),
        Ok(item_id(777)),
        Ok(json!({ "response": {} })),
    ]);

    let report = clone_product(&platform, &profile(), &request()).await;

    match &report.outcome {
        CloneOutcome::Aborted {
            step,
            created_item_id,
            ..
        } => {
            assert_eq!(*step, CloneStep::PublishItem);
            assert_eq!(*created_item_id, Some(777));
        }
        other => panic!("expected abort, got {other:?}"),
    }
    assert!(report.log_text().contains("777"));
    assert!(!report.log_text().contains(COMPLETION_MARKER));
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn abort_lines_carry_run_span() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let platform = RecordingPlatform::with_responses(vec![
        Ok(source_item()),
        Ok(uploaded()),
        Ok(item_id(777)),
        Ok(json!({ "response": {} })),
    ]);
    let report = clone_product(&platform, &profile(), &request()).await;
    assert_eq!(report.failed_step(), Some(CloneStep::PublishItem));

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let run_id = format!("run_id={}", report.run_id);
    for needle in ["Aborted at", "was created but not published"] {
        let line = output
            .lines()
            .find(|l| l.contains(needle))
            .unwrap_or_else(|| panic!("no log line with {needle:?} in:\n{output}"));
        assert!(line.contains(&run_id), "missing run_id: {line}");
        assert!(line.contains("item_id=42"), "missing item_id: {line}");
    }
}
