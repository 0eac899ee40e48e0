use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::JTVError;
use crate::schema::Row;

/// What to load from the data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    AllClients,
    Client(String),
}

/// Response body of the clients endpoints.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Payload>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Many(Vec<Value>),
    One(Row),
}

impl Envelope {
    /// Extract the row sequence, or the server's error text if `success` is false.
    pub fn into_rows(self) -> Result<Vec<Row>, JTVError> {
        if !self.success {
            let reason = match (self.error, self.message) {
                (Some(error), Some(message)) => format!("{error}: {message}"),
                (Some(text), None) | (None, Some(text)) => text,
                (None, None) => "Failed to fetch clients".to_string(),
            };
            return Err(JTVError::Upstream(reason));
        }

        let rows = match self.data {
            None => Vec::new(),
            Some(Payload::One(row)) => vec![row],
            Some(Payload::Many(values)) => {
                let total = values.len();
                let rows: Vec<Row> = values
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Object(row) => Some(row),
                        _ => None,
                    })
                    .collect();
                if rows.len() != total {
                    warn!("Skipped {} non-object entries in data", total - rows.len());
                }
                rows
            }
        };

        if let Some(count) = self.count
            && count != rows.len() as u64
        {
            warn!("Envelope count {count} does not match {} rows", rows.len());
        }
        Ok(rows)
    }
}

pub fn parse_envelope(body: &str) -> Result<Vec<Row>, JTVError> {
    let envelope: Envelope = serde_json::from_str(body)?;
    envelope.into_rows()
}

#[derive(Debug, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Health {
    pub fn describe(&self) -> String {
        let mut text = format!("API {}", self.status);
        if let Some(database) = &self.database {
            text.push_str(&format!(", database {database}"));
        }
        if let Some(error) = &self.error {
            text.push_str(&format!(" ({error})"));
        }
        text
    }
}

/// Anything that can produce client rows.
pub trait DataSource: Send + Sync {
    fn fetch(&self, request: &Request) -> Result<Vec<Row>, JTVError>;

    fn health(&self) -> Result<Health, JTVError>;

    fn describe(&self) -> String;
}

pub struct HttpSource {
    client: Client,
    base_url: Url,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, JTVError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| JTVError::InvalidSource(format!("{base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(JTVError::InvalidSource(format!(
                "{base_url} can not be used as base url"
            )));
        }
        let client = Client::builder()
            .user_agent(concat!("jtv/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(HttpSource {
            client,
            base_url: parsed,
        })
    }

    /// Append path segments to the base url. Each segment is percent-encoded,
    /// so `/`, `?` and `#` inside a segment stay part of it.
    fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn endpoint(&self, request: &Request) -> Result<Url, JTVError> {
        match request {
            Request::AllClients => Ok(self.url_for(&["clients"])),
            Request::Client(id) => {
                // Dot segments would be resolved away and point at another endpoint.
                if id.is_empty() || id == "." || id == ".." {
                    return Err(JTVError::InvalidSource(format!(
                        "invalid client id \"{id}\""
                    )));
                }
                Ok(self.url_for(&["clients", id.as_str()]))
            }
        }
    }
}

impl DataSource for HttpSource {
    fn fetch(&self, request: &Request) -> Result<Vec<Row>, JTVError> {
        let url = self.endpoint(request)?;
        info!("GET {url}");
        // Error responses carry an envelope too, so the status code is not checked.
        let body = self.client.get(url).send()?.text()?;
        parse_envelope(&body)
    }

    fn health(&self) -> Result<Health, JTVError> {
        let health = self.client.get(self.url_for(&["health"])).send()?.json()?;
        Ok(health)
    }

    fn describe(&self) -> String {
        self.base_url.to_string()
    }
}

/// Reads a saved envelope from disk. Every request reloads the file.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Result<Self, JTVError> {
        let metadata = fs::metadata(&path).map_err(map_io_error)?;
        if !metadata.is_file() {
            return Err(JTVError::InvalidSource(format!(
                "{} is not a file",
                path.display()
            )));
        }
        Ok(FileSource { path })
    }

    fn load(&self) -> Result<Vec<Row>, JTVError> {
        let body = fs::read_to_string(&self.path).map_err(map_io_error)?;
        parse_envelope(&body)
    }
}

impl DataSource for FileSource {
    fn fetch(&self, request: &Request) -> Result<Vec<Row>, JTVError> {
        let rows = self.load()?;
        match request {
            Request::AllClients => Ok(rows),
            Request::Client(id) => Ok(rows
                .into_iter()
                .filter(|row| row.get("id").is_some_and(|v| id_matches(v, id)))
                .collect()),
        }
    }

    fn health(&self) -> Result<Health, JTVError> {
        Ok(Health {
            status: "OK".to_string(),
            database: Some(format!("file {}", self.path.display())),
            error: None,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn id_matches(value: &Value, id: &str) -> bool {
    match value {
        Value::String(s) => s == id,
        Value::Number(n) => n.to_string() == id,
        _ => false,
    }
}

fn map_io_error(e: std::io::Error) -> JTVError {
    match e.kind() {
        ErrorKind::NotFound => JTVError::FileNotFound,
        ErrorKind::PermissionDenied => JTVError::PermissionDenied,
        _ => JTVError::IoError(e),
    }
}

/// Pick a source for a command line argument: http(s) URLs go to the API,
/// everything else is treated as a path (with `~` and `$VAR` expansion).
pub fn open_source(location: &str, timeout: Duration) -> Result<Arc<dyn DataSource>, JTVError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Ok(Arc::new(HttpSource::new(location, timeout)?));
    }

    let expanded = shellexpand::full(location)
        .map_err(|e| JTVError::InvalidSource(e.to_string()))?;
    Ok(Arc::new(FileSource::new(
        Path::new(expanded.as_ref()).to_path_buf(),
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn envelope_with_rows() {
        let rows = parse_envelope(
            r#"{"success": true, "count": 2, "data": [{"id": 1, "firstName": "Ada"}, {"id": 2, "firstName": null}]}"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].keys().collect::<Vec<_>>(),
            vec!["id", "firstName"]
        );
    }

    #[test]
    fn envelope_with_single_row() {
        let rows = parse_envelope(r#"{"success": true, "data": {"id": 7, "city": "Austin"}}"#)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["city"], "Austin");
    }

    #[test]
    fn envelope_without_data_is_empty() {
        assert!(parse_envelope(r#"{"success": true}"#).unwrap().is_empty());
        assert!(parse_envelope(r#"{"success": true, "data": []}"#).unwrap().is_empty());
    }

    #[test]
    fn envelope_skips_non_objects() {
        let rows = parse_envelope(r#"{"success": true, "data": [1, {"id": 1}, null]}"#).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn failed_envelope_is_upstream_error() {
        let err = parse_envelope(
            r#"{"success": false, "error": "Failed to fetch clients", "message": "connection refused"}"#,
        )
        .unwrap_err();
        match err {
            JTVError::Upstream(msg) => {
                assert_eq!(msg, "Failed to fetch clients: connection refused")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn malformed_body_is_json_error() {
        assert!(matches!(
            parse_envelope("<html>502</html>"),
            Err(JTVError::JsonError(_))
        ));
    }

    fn http_source() -> HttpSource {
        HttpSource::new("http://localhost:5000/api/", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn endpoints() {
        let source = http_source();
        assert_eq!(
            source.endpoint(&Request::AllClients).unwrap().as_str(),
            "http://localhost:5000/api/clients"
        );
        assert_eq!(
            source.endpoint(&Request::Client("42".into())).unwrap().as_str(),
            "http://localhost:5000/api/clients/42"
        );
        assert_eq!(
            source.url_for(&["health"]).as_str(),
            "http://localhost:5000/api/health"
        );
    }

    #[test]
    fn client_id_is_one_path_segment() {
        let source = http_source();
        for id in ["1/../../health", "#", "7?x=1", "a b"] {
            let url = source.endpoint(&Request::Client(id.into())).unwrap();
            let segments: Vec<&str> = url.path_segments().unwrap().collect();
            assert_eq!(segments.len(), 3, "{id} -> {url}");
            assert_eq!(&segments[..2], ["api", "clients"]);
            assert!(url.query().is_none(), "{id} -> {url}");
            assert!(url.fragment().is_none(), "{id} -> {url}");
        }
        for id in ["", ".", ".."] {
            assert!(matches!(
                source.endpoint(&Request::Client(id.into())),
                Err(JTVError::InvalidSource(_))
            ));
        }
    }

    #[test]
    fn invalid_base_url() {
        assert!(matches!(
            HttpSource::new("mailto:admin@example.com", Duration::from_secs(1)),
            Err(JTVError::InvalidSource(_))
        ));
    }

    #[test]
    fn file_source_loads_fixture() {
        let source = FileSource::new(fixture("clients.json")).unwrap();
        let rows = source.fetch(&Request::AllClients).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0].keys().collect::<Vec<_>>(),
            vec![
                "id",
                "firstName",
                "lastName",
                "ssn",
                "addressLine1",
                "city",
                "state",
                "stateCode",
                "zip"
            ]
        );

        let one = source.fetch(&Request::Client("2".into())).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0]["firstName"], "Grace");
    }

    #[test]
    fn file_source_failure_envelope() {
        let source = FileSource::new(fixture("clients_error.json")).unwrap();
        assert!(matches!(
            source.fetch(&Request::AllClients),
            Err(JTVError::Upstream(_))
        ));
    }

    fn health_fixture(name: &str) -> Health {
        let body = fs::read_to_string(fixture(name)).unwrap();
        serde_json::from_str(&body).unwrap()
    }

    #[test]
    fn healthy_api() {
        let health = health_fixture("health_ok.json");
        assert_eq!(health.status, "OK");
        assert_eq!(health.database.as_deref(), Some("Connected"));
        assert!(health.error.is_none());
        assert_eq!(health.describe(), "API OK, database Connected");
    }

    #[test]
    fn unhealthy_api() {
        let health = health_fixture("health_error.json");
        assert_eq!(health.status, "Error");
        assert_eq!(
            health.describe(),
            "API Error, database Disconnected (connect ECONNREFUSED 127.0.0.1:5432)"
        );
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            FileSource::new(fixture("does_not_exist.json")),
            Err(JTVError::FileNotFound)
        ));
        assert!(matches!(
            FileSource::new(fixture("")),
            Err(JTVError::InvalidSource(_))
        ));
    }
}
