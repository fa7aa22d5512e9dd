//! HTTP activation of PoET services.

use log::{debug, info};
use serde::Serialize;
use std::time::Duration;
use ureq::{Agent, AgentBuilder};

use super::PoetActivator;
use crate::error::BackendError;

/// Path of the PoET start endpoint
pub const START_PATH: &str = "/v1/start";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest<'a> {
    gateway_addresses: &'a [String],
}

/// Activates PoETs through their REST API
pub struct HttpPoetActivator {
    agent: Agent,
}

impl HttpPoetActivator {
    /// `timeout` bounds each activation request end to end
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Default for HttpPoetActivator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Build the start URL, accepting endpoints with or without a scheme
pub fn start_url(rest_endpoint: &str) -> String {
    let base = rest_endpoint.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{}{}", base, START_PATH)
    } else {
        format!("http://{}{}", base, START_PATH)
    }
}

impl PoetActivator for HttpPoetActivator {
    fn activate(&self, rest_endpoint: &str, gateways: &[String]) -> Result<(), BackendError> {
        let url = start_url(rest_endpoint);
        let body = serde_json::to_string(&StartRequest { gateway_addresses: gateways })?;
        debug!("POST {} {}", url, body);

        // ureq reports 4xx/5xx as errors; both paths end in Rejected
        match self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(response) if (200..300).contains(&response.status()) => {
                info!("Activated poet at {} with {} gateway(s)", rest_endpoint, gateways.len());
                Ok(())
            }
            Ok(response) => Err(BackendError::Rejected {
                status: response.status(),
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Status(status, response)) => Err(BackendError::Rejected {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => {
                Err(BackendError::Transport(transport.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_url() {
        assert_eq!(start_url("10.1.0.1:5000"), "http://10.1.0.1:5000/v1/start");
        assert_eq!(start_url("http://poet:5000/"), "http://poet:5000/v1/start");
    }

    #[test]
    fn test_request_body_shape() {
        let gateways = vec!["10.0.0.1:9092".to_string()];
        let body = serde_json::to_string(&StartRequest { gateway_addresses: &gateways }).unwrap();
        assert_eq!(body, r#"{"gatewayAddresses":["10.0.0.1:9092"]}"#);
    }
}
