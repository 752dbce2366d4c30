use std::time::Duration;
use anyhow::Error;
use tonic::transport::Channel;
use tonic::Request;
use triton::grpc_inference_service_client::GrpcInferenceServiceClient;
use triton::{ModelInferRequest, ModelInferResponse, ModelReadyRequest, ServerLiveRequest};

pub mod triton {
    tonic::include_proto!("inference");
}

/// Thin async client for a Triton / KServe-v2 inference server.
#[derive(Debug, Clone)]
pub struct TritonInferenceClient {
    client: GrpcInferenceServiceClient<Channel>,
}

impl TritonInferenceClient {

    /// new connects to the server at `url`, e.g. `http://127.0.0.1:8001`.
    pub async fn new(url: &str) -> Result<Self, Error> {
        let client = GrpcInferenceServiceClient::connect(url.to_string()).await?;
        Ok(TritonInferenceClient { client })
    }

    pub async fn server_live(&self) -> Result<bool, Error> {
        let response = self.client.clone().server_live(ServerLiveRequest {}).await?;
        Ok(response.into_inner().live)
    }

    pub async fn model_ready(&self, name: &str, version: &str) -> Result<bool, Error> {
        let request = ModelReadyRequest {
            name: name.to_string(),
            version: version.to_string(),
        };
        let response = self.client.clone().model_ready(request).await?;
        Ok(response.into_inner().ready)
    }

    /// model_infer runs one inference request, failing if it exceeds `timeout`.
    pub async fn model_infer(&self, request: ModelInferRequest, timeout: Duration) -> Result<ModelInferResponse, Error> {
        let mut request = Request::new(request);
        request.set_timeout(timeout);
        let response = self.client.clone().model_infer(request).await?;
        Ok(response.into_inner())
    }
}
