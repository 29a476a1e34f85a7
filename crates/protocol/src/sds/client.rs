//! Client stub for `envoy.service.secret.v3.SecretDiscoveryService`.

use bytes::Bytes;
use tonic::codec::ProstCodec;
use tonic::codegen::{Body, StdError};
use tonic::{GrpcMethod, IntoStreamingRequest, Response, Status, Streaming};

use super::types::{DiscoveryRequest, DiscoveryResponse};

const SERVICE_NAME: &str = "envoy.service.secret.v3.SecretDiscoveryService";

/// Path of the bidirectional `StreamSecrets` method.
pub const STREAM_SECRETS_PATH: &str =
    "/envoy.service.secret.v3.SecretDiscoveryService/StreamSecrets";

#[derive(Debug, Clone)]
pub struct SecretDiscoveryServiceClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl<T> SecretDiscoveryServiceClient<T>
where
    T: tonic::client::GrpcService<tonic::body::BoxBody>,
    T::Error: Into<StdError>,
    T::ResponseBody: Body<Data = Bytes> + Send + 'static,
    <T::ResponseBody as Body>::Error: Into<StdError> + Send,
{
    pub fn new(inner: T) -> Self {
        Self {
            inner: tonic::client::Grpc::new(inner),
        }
    }

    /// Open the secret stream. Requests flow from `request` until it ends.
    pub async fn stream_secrets(
        &mut self,
        request: impl IntoStreamingRequest<Message = DiscoveryRequest>,
    ) -> Result<Response<Streaming<DiscoveryResponse>>, Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unknown(format!("Service was not ready: {}", e.into())))?;
        let codec = ProstCodec::<DiscoveryRequest, DiscoveryResponse>::default();
        let path = http::uri::PathAndQuery::from_static(STREAM_SECRETS_PATH);
        let mut req = request.into_streaming_request();
        req.extensions_mut()
            .insert(GrpcMethod::new(SERVICE_NAME, "StreamSecrets"));
        self.inner.streaming(req, path, codec).await
    }
}
