//! Secret discovery (Envoy SDS v3) wire protocol.
//!
//! The client opens one `StreamSecrets` stream per server, names every
//! certificate it wants in a single initial request and acknowledges each
//! pushed secret with the version and nonce it arrived with.

mod client;
pub mod types;

use std::collections::BTreeMap;

use prost::Message;
use prost_types::value::Kind;
use prost_types::{ListValue, Struct, Value};

pub use client::{SecretDiscoveryServiceClient, STREAM_SECRETS_PATH};
pub use types::{DiscoveryRequest, DiscoveryResponse, Node, Secret};

use crate::errors::ProtocolError;
use types::{data_source::Specifier, secret, DataSource};

/// Type URL of `envoy.extensions.transport_sockets.tls.v3.Secret`.
pub const SECRET_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.Secret";

/// Node metadata key carrying the requested domains per certificate.
pub const DOMAINS_METADATA_KEY: &str = "domains";

/// Initial request naming every certificate and its domains.
///
/// `certs` yields `(name, domains)` pairs; their order becomes the order of
/// `resource_names`.
pub fn initial_request<'a, I, D>(certs: I) -> DiscoveryRequest
where
    I: IntoIterator<Item = (&'a str, D)>,
    D: IntoIterator<Item = &'a String>,
{
    let mut resource_names = Vec::new();
    let mut domains = BTreeMap::new();
    for (name, cert_domains) in certs {
        resource_names.push(name.to_string());
        let values = cert_domains
            .into_iter()
            .map(|d| Value {
                kind: Some(Kind::StringValue(d.clone())),
            })
            .collect();
        domains.insert(
            name.to_string(),
            Value {
                kind: Some(Kind::ListValue(ListValue { values })),
            },
        );
    }

    let mut fields = BTreeMap::new();
    fields.insert(
        DOMAINS_METADATA_KEY.to_string(),
        Value {
            kind: Some(Kind::StructValue(Struct { fields: domains })),
        },
    );

    DiscoveryRequest {
        node: Some(Node {
            metadata: Some(Struct { fields }),
            ..Default::default()
        }),
        resource_names,
        type_url: SECRET_TYPE_URL.to_string(),
        ..Default::default()
    }
}

/// Acknowledgement for one received secret.
pub fn ack_request(version_info: &str, nonce: &str, name: &str) -> DiscoveryRequest {
    DiscoveryRequest {
        version_info: version_info.to_string(),
        resource_names: vec![name.to_string()],
        type_url: SECRET_TYPE_URL.to_string(),
        response_nonce: nonce.to_string(),
        ..Default::default()
    }
}

/// Decode the single secret carried by a response.
pub fn decode_secret(response: &DiscoveryResponse) -> Result<Secret, ProtocolError> {
    let [resource] = response.resources.as_slice() else {
        return Err(ProtocolError::UnexpectedResourceCount(
            response.resources.len(),
        ));
    };
    if resource.type_url != SECRET_TYPE_URL {
        return Err(ProtocolError::UnexpectedTypeUrl(resource.type_url.clone()));
    }
    Ok(Secret::decode(resource.value.as_slice())?)
}

/// Extract inline `(chain, key)` bytes from a TLS certificate secret.
pub fn tls_material(secret: &Secret) -> Result<(Vec<u8>, Vec<u8>), ProtocolError> {
    let Some(secret::Type::TlsCertificate(tls)) = &secret.r#type else {
        return Err(ProtocolError::UnexpectedSecretType(secret.name.clone()));
    };
    let chain = inline_data(tls.certificate_chain.as_ref())
        .ok_or_else(|| missing(&secret.name, "certificate_chain"))?;
    let key = inline_data(tls.private_key.as_ref())
        .ok_or_else(|| missing(&secret.name, "private_key"))?;
    Ok((chain, key))
}

fn inline_data(source: Option<&DataSource>) -> Option<Vec<u8>> {
    match source?.specifier.as_ref()? {
        Specifier::InlineBytes(bytes) => Some(bytes.clone()),
        Specifier::InlineString(s) => Some(s.clone().into_bytes()),
        Specifier::Filename(_) | Specifier::EnvironmentVariable(_) => None,
    }
}

fn missing(name: &str, field: &'static str) -> ProtocolError {
    ProtocolError::MissingInlineData {
        name: name.to_string(),
        field,
    }
}

/// Wrap a secret into a response. Used by tests and fake servers.
pub fn secret_response(version_info: &str, nonce: &str, secret: &Secret) -> DiscoveryResponse {
    DiscoveryResponse {
        version_info: version_info.to_string(),
        resources: vec![prost_types::Any {
            type_url: SECRET_TYPE_URL.to_string(),
            value: secret.encode_to_vec(),
        }],
        type_url: SECRET_TYPE_URL.to_string(),
        nonce: nonce.to_string(),
        ..Default::default()
    }
}
