use anyhow::Context;
use async_trait::async_trait;
use dataset::{SimulationRequest, TrainingRequest};

use crate::types_ml::{SimulationResult, SimulationStats, TrainingResult};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub base_url: String,
}

/// External model-training / simulation collaborator.
#[async_trait]
pub trait MlService: Send + Sync {
    async fn train(&self, req: &TrainingRequest) -> anyhow::Result<TrainingResult>;
    async fn simulate(&self, req: &SimulationRequest) -> anyhow::Result<Vec<SimulationResult>>;
    async fn stats(&self) -> anyhow::Result<SimulationStats>;
    async fn ping(&self) -> anyhow::Result<()>;
    fn info(&self) -> ServiceInfo;
}

pub struct HttpMlService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMlService {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl MlService for HttpMlService {
    async fn train(&self, req: &TrainingRequest) -> anyhow::Result<TrainingResult> {
        let resp = self
            .client
            .post(self.url("/train"))
            .json(req)
            .send()
            .await
            .context("model service /train request failed")?
            .error_for_status()?;
        Ok(resp.json().await.context("invalid /train response")?)
    }

    async fn simulate(&self, req: &SimulationRequest) -> anyhow::Result<Vec<SimulationResult>> {
        let resp = self
            .client
            .post(self.url("/simulate"))
            .json(req)
            .send()
            .await
            .context("model service /simulate request failed")?
            .error_for_status()?;
        Ok(resp.json().await.context("invalid /simulate response")?)
    }

    async fn stats(&self) -> anyhow::Result<SimulationStats> {
        let resp = self
            .client
            .get(self.url("/simulation/stats"))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.client.get(self.url("/health")).send().await?.error_for_status()?;
        Ok(())
    }

    fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: "ml-service".to_string(),
            base_url: self.base_url.clone(),
        }
    }
}
