//! Firestore REST (v1) document store client
//!
//! Translates [`Query`] into a `structuredQuery` for `:runQuery`, reads single
//! documents with a plain GET and writes through `:commit`, using
//! `appendMissingElements` for set-union and `currentDocument` for
//! preconditions.

use super::traits::{Direction, Document, DocumentStore, Precondition, Query, StoreError};
use super::value::FieldValue;
use crate::config::BackendSettings;
use crate::network::HttpClient;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value as Json};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use url::Url;

/// Document store backed by the Firestore REST API
pub struct FirestoreStore {
    client: HttpClient,
    base_url: String,
    /// `projects/{project}/databases/{database}/documents`
    documents_path: String,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl FirestoreStore {
    /// Create a client for the project and database named in `settings`
    pub fn new(client: HttpClient, settings: &BackendSettings) -> anyhow::Result<Self> {
        if settings.project_id.is_empty() {
            anyhow::bail!("backend.project_id is required for the firebase backend");
        }
        // Validate early so request building cannot fail on a bad base
        Url::parse(&settings.firestore_url)?;

        Ok(Self {
            client,
            base_url: settings.firestore_url.trim_end_matches('/').to_string(),
            documents_path: format!(
                "projects/{}/databases/{}/documents",
                settings.project_id, settings.database
            ),
            api_key: settings.api_key.clone(),
            access_token: settings.access_token.clone(),
        })
    }

    /// Full resource name of a document
    fn resource_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_path, collection, id)
    }

    /// URL for a custom method on the documents root, e.g. `:runQuery`
    fn method_url(&self, method: &str) -> Result<Url, StoreError> {
        let raw = format!("{}/{}:{}", self.base_url, self.documents_path, method);
        Url::parse(&raw).map_err(|e| StoreError::Decode(format!("bad store url: {}", e)))
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<Url, StoreError> {
        let raw = format!("{}/{}", self.base_url, self.documents_path);
        let mut url =
            Url::parse(&raw).map_err(|e| StoreError::Decode(format!("bad store url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Decode("store url cannot be a base".to_string()))?
            .push(collection)
            .push(id);
        Ok(url)
    }

    fn request(&self, method: Method, mut url: Url) -> RequestBuilder {
        if let Some(ref key) = self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        let builder = self.client.request(method, url);
        match self.access_token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Build the `structuredQuery` body for a query
    pub fn structured_query(&self, query: &Query) -> Json {
        let mut structured = Map::new();
        structured.insert(
            "from".to_string(),
            json!([{ "collectionId": query.collection }]),
        );

        let field_filters: Vec<Json> = query
            .filters
            .iter()
            .map(|f| {
                json!({
                    "fieldFilter": {
                        "field": { "fieldPath": f.field },
                        "op": "EQUAL",
                        "value": encode_value(&f.value),
                    }
                })
            })
            .collect();
        match field_filters.len() {
            0 => {}
            1 => {
                structured.insert("where".to_string(), field_filters[0].clone());
            }
            _ => {
                structured.insert(
                    "where".to_string(),
                    json!({ "compositeFilter": { "op": "AND", "filters": field_filters } }),
                );
            }
        }

        let mut orders: Vec<Json> = query
            .order_by
            .iter()
            .map(|o| json!({ "field": { "fieldPath": o.field }, "direction": direction(o.direction) }))
            .collect();

        if let Some(ref cursor) = query.start_after {
            // cursor values must line up with the orderings, including the
            // document name tiebreak the SDKs add implicitly
            orders.push(json!({
                "field": { "fieldPath": "__name__" },
                "direction": direction(query.tiebreak_direction()),
            }));
            let mut values: Vec<Json> = cursor.values.iter().map(encode_value).collect();
            values.push(json!({
                "referenceValue": self.resource_name(&query.collection, &cursor.document_id)
            }));
            structured.insert(
                "startAt".to_string(),
                json!({ "values": values, "before": false }),
            );
        }

        if !orders.is_empty() {
            structured.insert("orderBy".to_string(), Json::Array(orders));
        }
        if let Some(limit) = query.limit {
            structured.insert("limit".to_string(), json!(limit));
        }

        Json::Object(structured)
    }

    async fn commit(&self, write: Json) -> Result<(), StoreError> {
        let url = self.method_url("commit")?;
        let response = self
            .request(Method::POST, url)
            .json(&json!({ "writes": [write] }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

fn direction(direction: Direction) -> &'static str {
    match direction {
        Direction::Ascending => "ASCENDING",
        Direction::Descending => "DESCENDING",
    }
}

/// Map an error response onto a store error
fn status_error(status: StatusCode, body: &str) -> StoreError {
    let parsed: Option<Json> = serde_json::from_str(body).ok();
    // :runQuery wraps errors in a one-element array
    let error = parsed.as_ref().and_then(|v| match v {
        Json::Array(items) => items.first().and_then(|i| i.get("error")).cloned(),
        other => other.get("error").cloned(),
    });

    let message = error
        .as_ref()
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .unwrap_or("no error message")
        .to_string();
    let code = error
        .as_ref()
        .and_then(|e| e.get("status"))
        .and_then(|s| s.as_str())
        .unwrap_or_default();

    match code {
        "FAILED_PRECONDITION" | "ABORTED" => StoreError::Conflict(message),
        "NOT_FOUND" => StoreError::NotFound(message),
        _ if status == StatusCode::NOT_FOUND => StoreError::NotFound(message),
        _ => StoreError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

/// Encode a field value in the REST wire format
pub fn encode_value(value: &FieldValue) -> Json {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Boolean(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::Timestamp(ts) => {
            json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::AutoSi, true) })
        }
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Bytes(bytes) => json!({ "bytesValue": STANDARD.encode(bytes) }),
        FieldValue::Reference(name) => json!({ "referenceValue": name }),
        FieldValue::GeoPoint {
            latitude,
            longitude,
        } => json!({ "geoPointValue": { "latitude": latitude, "longitude": longitude } }),
        FieldValue::Array(values) => {
            json!({ "arrayValue": { "values": values.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        FieldValue::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

fn encode_fields(fields: &BTreeMap<String, FieldValue>) -> Json {
    Json::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

/// Decode a REST wire value
pub fn decode_value(json: &Json) -> Result<FieldValue, StoreError> {
    let obj = json
        .as_object()
        .ok_or_else(|| StoreError::Decode(format!("expected value object, got {}", json)))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| StoreError::Decode("empty value object".to_string()))?;

    let value = match kind.as_str() {
        "nullValue" => FieldValue::Null,
        "booleanValue" => FieldValue::Boolean(inner.as_bool().unwrap_or(false)),
        "integerValue" => {
            let parsed = match inner {
                Json::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            FieldValue::Integer(
                parsed.ok_or_else(|| StoreError::Decode(format!("bad integer {}", inner)))?,
            )
        }
        "doubleValue" => FieldValue::Double(match inner {
            // NaN and infinities arrive as strings
            Json::String(s) => match s.as_str() {
                "Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                _ => f64::NAN,
            },
            other => other.as_f64().unwrap_or(f64::NAN),
        }),
        "timestampValue" => {
            let raw = inner.as_str().unwrap_or_default();
            FieldValue::Timestamp(parse_timestamp(raw)?)
        }
        "stringValue" => FieldValue::String(inner.as_str().unwrap_or_default().to_string()),
        "bytesValue" => FieldValue::Bytes(
            STANDARD
                .decode(inner.as_str().unwrap_or_default())
                .map_err(|e| StoreError::Decode(format!("bad bytes value: {}", e)))?,
        ),
        "referenceValue" => FieldValue::Reference(inner.as_str().unwrap_or_default().to_string()),
        "geoPointValue" => FieldValue::GeoPoint {
            latitude: inner.get("latitude").and_then(|v| v.as_f64()).unwrap_or(0.0),
            longitude: inner.get("longitude").and_then(|v| v.as_f64()).unwrap_or(0.0),
        },
        "arrayValue" => {
            let values = match inner.get("values").and_then(|v| v.as_array()) {
                Some(items) => items.iter().map(decode_value).collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            FieldValue::Array(values)
        }
        "mapValue" => FieldValue::Map(decode_fields(inner.get("fields"))?),
        other => return Err(StoreError::Decode(format!("unknown value kind {}", other))),
    };
    Ok(value)
}

fn decode_fields(fields: Option<&Json>) -> Result<BTreeMap<String, FieldValue>, StoreError> {
    let mut out = BTreeMap::new();
    if let Some(Json::Object(map)) = fields {
        for (name, value) in map {
            out.insert(name.clone(), decode_value(value)?);
        }
    }
    Ok(out)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("bad timestamp {}: {}", raw, e)))
}

/// Decode a REST document resource
pub fn decode_document(json: &Json) -> Result<Document, StoreError> {
    let name = json
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| StoreError::Decode("document without name".to_string()))?;
    let id = name.rsplit('/').next().unwrap_or(name).to_string();
    let update_time = match json.get("updateTime").and_then(|t| t.as_str()) {
        Some(raw) => Some(parse_timestamp(raw)?),
        None => None,
    };

    Ok(Document {
        id,
        fields: decode_fields(json.get("fields"))?,
        update_time,
    })
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn name(&self) -> &str {
        "firestore"
    }

    async fn run_query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let url = self.method_url("runQuery")?;
        let body = json!({ "structuredQuery": self.structured_query(query) });
        debug!("runQuery on {}: {}", query.collection, body);

        let response = self.request(Method::POST, url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let rows: Vec<Json> = serde_json::from_str(&text)
            .map_err(|e| StoreError::Decode(format!("runQuery response: {}", e)))?;

        // rows without a document carry only read metadata
        rows.iter()
            .filter_map(|row| row.get("document"))
            .map(decode_document)
            .collect()
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let url = self.document_url(collection, id)?;
        let response = self.request(Method::GET, url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let json: Json = serde_json::from_str(&text)
            .map_err(|e| StoreError::Decode(format!("document response: {}", e)))?;
        decode_document(&json).map(Some)
    }

    async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<FieldValue>,
    ) -> Result<(), StoreError> {
        let write = json!({
            "transform": {
                "document": self.resource_name(collection, id),
                "fieldTransforms": [{
                    "fieldPath": field,
                    "appendMissingElements": {
                        "values": values.iter().map(encode_value).collect::<Vec<_>>(),
                    },
                }],
            },
            "currentDocument": { "exists": true },
        });
        self.commit(write).await
    }

    async fn set_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: FieldValue,
        precondition: Precondition,
    ) -> Result<(), StoreError> {
        let current = match precondition {
            Precondition::Exists => json!({ "exists": true }),
            Precondition::UpdatedAt(ts) => {
                json!({ "updateTime": ts.to_rfc3339_opts(SecondsFormat::AutoSi, true) })
            }
        };
        let mut fields = Map::new();
        fields.insert(field.to_string(), encode_value(&value));

        let write = json!({
            "update": {
                "name": self.resource_name(collection, id),
                "fields": fields,
            },
            "updateMask": { "fieldPaths": [field] },
            "currentDocument": current,
        });

        self.commit(write).await.map_err(|e| {
            if let StoreError::Conflict(ref msg) = e {
                warn!("write to {}/{} lost a race: {}", collection, id, msg);
            }
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Cursor;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOCS: &str = "/v1/projects/shop/databases/(default)/documents";

    fn store_for(server: &MockServer) -> FirestoreStore {
        let settings = BackendSettings {
            project_id: "shop".to_string(),
            firestore_url: format!("{}/v1", server.uri()),
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        FirestoreStore::new(HttpClient::new().unwrap(), &settings).unwrap()
    }

    fn product_json(id: &str, price: f64) -> Json {
        json!({
            "name": format!("projects/shop/databases/(default)/documents/products/{}", id),
            "fields": {
                "title": { "stringValue": format!("Product {}", id) },
                "price": { "doubleValue": price },
                "stock": { "integerValue": "12" },
            },
            "updateTime": "2024-06-01T10:00:00.123456Z",
        })
    }

    #[test]
    fn test_value_wire_format() {
        let ts = parse_timestamp("2024-06-01T10:00:00.5Z").unwrap();
        let mut map = BTreeMap::new();
        map.insert("n".to_string(), FieldValue::Integer(5));
        map.insert("at".to_string(), FieldValue::Timestamp(ts));
        let value = FieldValue::Array(vec![FieldValue::Map(map), FieldValue::Bytes(vec![1, 2])]);

        let encoded = encode_value(&value);
        assert_eq!(
            encoded["arrayValue"]["values"][0]["mapValue"]["fields"]["n"],
            json!({ "integerValue": "5" })
        );
        assert_eq!(decode_value(&encoded).unwrap(), value);
    }

    #[test]
    fn test_decode_unknown_kind() {
        assert!(decode_value(&json!({ "mysteryValue": 1 })).is_err());
    }

    #[test]
    fn test_structured_query_with_cursor() {
        let settings = BackendSettings {
            project_id: "shop".to_string(),
            ..Default::default()
        };
        let store = FirestoreStore::new(HttpClient::new().unwrap(), &settings).unwrap();
        let query = Query::collection("products")
            .filter_eq("category", "beauty")
            .order_by("price", Direction::Descending)
            .start_after(Cursor {
                values: vec![FieldValue::Double(9.5)],
                document_id: "004".to_string(),
            })
            .limit(10);

        let sq = store.structured_query(&query);
        assert_eq!(sq["from"][0]["collectionId"], "products");
        assert_eq!(sq["where"]["fieldFilter"]["op"], "EQUAL");
        assert_eq!(sq["orderBy"][0]["direction"], "DESCENDING");
        assert_eq!(sq["orderBy"][1]["field"]["fieldPath"], "__name__");
        assert_eq!(sq["orderBy"][1]["direction"], "DESCENDING");
        assert_eq!(sq["startAt"]["before"], false);
        assert_eq!(
            sq["startAt"]["values"][1]["referenceValue"],
            "projects/shop/databases/(default)/documents/products/004"
        );
        assert_eq!(sq["limit"], 10);
    }

    #[tokio::test]
    async fn test_run_query_decodes_documents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:runQuery", DOCS)))
            .and(query_param("key", "k"))
            .and(body_partial_json(json!({ "structuredQuery": { "limit": 2 } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "document": product_json("001", 10.0), "readTime": "2024-06-01T10:00:01Z" },
                { "document": product_json("002", 20.0), "readTime": "2024-06-01T10:00:01Z" },
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        let docs = store
            .run_query(&Query::collection("products").limit(2))
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "001");
        assert_eq!(docs[1].get("stock"), Some(&FieldValue::Integer(12)));
        assert!(docs[0].update_time.is_some());
    }

    #[tokio::test]
    async fn test_run_query_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:runQuery", DOCS)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{ "readTime": "2024-06-01T10:00:01Z" }])),
            )
            .mount(&server)
            .await;

        let docs = store_for(&server)
            .run_query(&Query::collection("products"))
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/products/999", DOCS)))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": 404, "message": "not found", "status": "NOT_FOUND" }
            })))
            .mount(&server)
            .await;

        let doc = store_for(&server).get("products", "999").await.unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_get_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/products/001", DOCS)))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": { "code": 503, "message": "unavailable", "status": "UNAVAILABLE" }
            })))
            .mount(&server)
            .await;

        let result = store_for(&server).get("products", "001").await;
        assert!(matches!(result, Err(StoreError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_array_union_commit_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:commit", DOCS)))
            .and(body_partial_json(json!({
                "writes": [{
                    "transform": {
                        "document": "projects/shop/databases/(default)/documents/products/001",
                        "fieldTransforms": [{ "fieldPath": "reviews" }],
                    },
                    "currentDocument": { "exists": true },
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "writeResults": [{}] })))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server)
            .array_union("products", "001", "reviews", vec![FieldValue::from("x")])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_precondition_failure_is_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:commit", DOCS)))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "the stored version does not match the required base version",
                    "status": "FAILED_PRECONDITION",
                }
            })))
            .mount(&server)
            .await;

        let ts = parse_timestamp("2024-06-01T10:00:00Z").unwrap();
        let result = store_for(&server)
            .set_field(
                "products",
                "001",
                "reviews",
                FieldValue::Array(vec![]),
                Precondition::UpdatedAt(ts),
            )
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }
}
