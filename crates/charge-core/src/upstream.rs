//! Vendor device-detail API.
//!
//! The vendor only exposes per-device detail keyed by an opaque `suid`; the port list
//! comes back as a JSON document embedded in a string field and needs a second parse.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    config::Config,
    domain::{Credential, PortStatus},
    errors::Error,
    Result,
};

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.powerliber.com/client/1/device/detail";

const USER_AGENT: &str = "Mozilla/5.0";
const SUCCESS_CODE: i64 = 0;

/// Port for anything that can report the ports of one device.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Ports for the device identified by `credential`.
    ///
    /// `Ok(vec![])` when the vendor answered but had nothing for the device; `Err`
    /// for transport failures, undecodable bodies and vendor error codes.
    async fn device_ports(&self, credential: &Credential) -> Result<Vec<PortStatus>>;
}

#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub url: String,
    pub token: String,
    pub client_id: String,
    pub app_id: String,
    pub timeout: Duration,
}

impl UpstreamConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            url: cfg.upstream_url.clone(),
            token: cfg.upstream_token.clone(),
            client_id: cfg.upstream_client_id.clone(),
            app_id: cfg.upstream_app_id.clone(),
            timeout: cfg.upstream_timeout,
        }
    }
}

#[derive(Clone, Debug)]
pub struct VendorClient {
    cfg: UpstreamConfig,
    http: reqwest::Client,
}

impl VendorClient {
    pub fn new(cfg: UpstreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { cfg, http })
    }
}

#[async_trait]
impl StatusSource for VendorClient {
    async fn device_ports(&self, credential: &Credential) -> Result<Vec<PortStatus>> {
        // `.form()` sets `application/x-www-form-urlencoded`.
        let resp = self
            .http
            .post(&self.cfg.url)
            .form(&[
                ("token", self.cfg.token.as_str()),
                ("client_id", self.cfg.client_id.as_str()),
                ("app_id", self.cfg.app_id.as_str()),
                ("suid", credential.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "vendor http {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: DetailResponse = resp.json().await?;
        decode_detail(body)
    }
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<DetailData>,
}

#[derive(Debug, Deserialize)]
struct DetailData {
    #[serde(default)]
    device: Option<DeviceDetail>,
}

#[derive(Debug, Deserialize)]
struct DeviceDetail {
    #[serde(default)]
    port_list: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPort {
    #[serde(default)]
    port_index: Option<serde_json::Value>,
    #[serde(default)]
    charge_status: Option<serde_json::Value>,
    #[serde(default)]
    energy_consumed: Option<serde_json::Value>,
    #[serde(default)]
    power: Option<serde_json::Value>,
    #[serde(default)]
    charge_time: Option<serde_json::Value>,
}

fn decode_detail(body: DetailResponse) -> Result<Vec<PortStatus>> {
    let code = body.code.unwrap_or(-1);
    if code != SUCCESS_CODE {
        return Err(Error::Upstream {
            code,
            message: body.msg.unwrap_or_default(),
        });
    }

    let Some(device) = body.data.and_then(|d| d.device) else {
        return Ok(Vec::new());
    };
    let raw = device.port_list.unwrap_or_default();
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let ports: Vec<RawPort> = serde_json::from_str(&raw)?;
    Ok(ports.into_iter().map(RawPort::into_status).collect())
}

impl RawPort {
    fn into_status(self) -> PortStatus {
        PortStatus {
            port_index: self.port_index.as_ref().and_then(as_i64).unwrap_or(0),
            charging: self.charge_status.as_ref().and_then(as_i64).unwrap_or(0) == 1,
            energy: self.energy_consumed.as_ref().and_then(as_f64).unwrap_or(0.0),
            power: self.power.as_ref().and_then(as_f64).unwrap_or(0.0),
            elapsed_hours: self.charge_time.as_ref().and_then(as_f64),
        }
    }
}

// The vendor is loose about numeric types: numbers sometimes arrive as strings.
fn as_f64(v: &serde_json::Value) -> Option<f64> {
    match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(v: &serde_json::Value) -> Option<i64> {
    match v {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, VendorClient) {
        let server = MockServer::start().await;
        let client = VendorClient::new(UpstreamConfig {
            url: format!("{}/client/1/device/detail", server.uri()),
            token: "tok".to_string(),
            client_id: "1".to_string(),
            app_id: "dd".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn decodes_nested_port_list() {
        let (server, client) = setup().await;

        let ports = json!([
            {"port_index": 0, "charge_status": 1, "energy_consumed": 50, "power": 500},
            {"port_index": 3, "charge_status": 0}
        ]);
        let body = json!({
            "code": 0,
            "data": {"device": {"port_list": ports.to_string()}}
        });

        Mock::given(method("POST"))
            .and(path("/client/1/device/detail"))
            .and(body_string_contains("suid=abc"))
            .and(body_string_contains("app_id=dd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .expect(1)
            .mount(&server)
            .await;

        let got = client.device_ports(&Credential::new("abc")).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(
            got[0],
            PortStatus {
                port_index: 0,
                charging: true,
                energy: 50.0,
                power: 500.0,
                elapsed_hours: None,
            }
        );
        assert_eq!(got[1].port_index, 3);
        assert!(!got[1].charging);
        assert_eq!(got[1].energy, 0.0);
        assert_eq!(got[1].power, 0.0);
    }

    #[tokio::test]
    async fn vendor_error_code_is_an_error() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": 40001, "msg": "bad suid"})),
            )
            .mount(&server)
            .await;

        let err = client
            .device_ports(&Credential::new("abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream { code: 40001, .. }));
    }

    #[tokio::test]
    async fn missing_device_payload_is_empty() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0, "data": {}})))
            .mount(&server)
            .await;

        let got = client.device_ports(&Credential::new("abc")).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn http_failure_is_an_error() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        assert!(client.device_ports(&Credential::new("abc")).await.is_err());
    }

    #[test]
    fn string_numbers_are_accepted() {
        let raw: RawPort = serde_json::from_value(json!({
            "port_index": "2", "charge_status": "1", "energy_consumed": "1.5", "power": "300", "charge_time": 0.5
        }))
        .unwrap();
        let p = raw.into_status();
        assert_eq!(p.port_index, 2);
        assert!(p.charging);
        assert_eq!(p.energy, 1.5);
        assert_eq!(p.elapsed_hours, Some(0.5));
    }
}
