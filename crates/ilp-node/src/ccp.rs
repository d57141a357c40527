//! HTTP transport for route broadcast between connectors.

use std::time::Duration;

use ilp_routing::{RouteControlRequest, RouteUpdateRequest, UpdateOutcome};

pub const CONTROL_PATH: &str = "/ccp/control";
pub const UPDATE_PATH: &str = "/ccp/update";

/// Posts CCP messages to a peer's endpoints.
#[derive(Debug, Clone)]
pub struct CcpClient {
    client: reqwest::Client,
}

impl CcpClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }

    pub async fn send_update(
        &self,
        base_url: &str,
        token: Option<&str>,
        update: &RouteUpdateRequest,
    ) -> anyhow::Result<UpdateOutcome> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), UPDATE_PATH);
        let mut request = self.client.post(url).json(update);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn send_control(
        &self,
        base_url: &str,
        token: Option<&str>,
        control: &RouteControlRequest,
    ) -> anyhow::Result<()> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), CONTROL_PATH);
        let mut request = self.client.post(url).json(control);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }
}
