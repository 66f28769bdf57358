use std::collections::HashSet;

use anyhow::Result;
use bls::{PublicKeyBytes, SignatureBytes};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::{phase0::primitives::H256, preset::Preset};

use crate::types::{ForkInfo, SigningMessage};

/// One remote signer endpoint. Each endpoint owns its HTTP client so TLS
/// policy can differ per configured keystore.
#[derive(Clone, Debug)]
pub struct Web3SignerEndpoint {
    client: Client,
    url: Url,
}

#[derive(Debug, Error)]
pub enum Web3SignerError {
    #[error("Web3Signer at {url} returned status {status}")]
    UnexpectedStatus { url: Url, status: StatusCode },
}

#[derive(Serialize)]
#[serde(bound = "")]
struct SigningRequest<'message, 'block, P: Preset> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fork_info: Option<ForkInfo>,
    signing_root: H256,
    #[serde(flatten)]
    message: &'message SigningMessage<'block, P>,
}

#[derive(Deserialize)]
struct SigningResponse {
    signature: SignatureBytes,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct PublicKeysResponse(HashSet<PublicKeyBytes>);

impl Web3SignerEndpoint {
    #[must_use]
    pub const fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// `GET /api/v1/eth2/publicKeys`
    pub async fn fetch_public_keys(&self) -> Result<HashSet<PublicKeyBytes>> {
        let url = self.url.join("api/v1/eth2/publicKeys")?;
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();

        if !status.is_success() {
            return Err(Web3SignerError::UnexpectedStatus { url, status }.into());
        }

        let PublicKeysResponse(keys) = response.json().await?;

        Ok(keys)
    }

    /// `POST /api/v1/eth2/sign/{identifier}`
    pub async fn sign<P: Preset>(
        &self,
        message: &SigningMessage<'_, P>,
        signing_root: H256,
        fork_info: Option<ForkInfo>,
        public_key: PublicKeyBytes,
    ) -> Result<SignatureBytes> {
        let url = self
            .url
            .join(&format!("api/v1/eth2/sign/{public_key:?}"))?;

        let request = SigningRequest {
            kind: message.web3signer_type(),
            fork_info,
            signing_root,
            message,
        };

        let response = self.client.post(url.clone()).json(&request).send().await?;

        let status = response.status();

        if !status.is_success() {
            return Err(Web3SignerError::UnexpectedStatus { url, status }.into());
        }

        let SigningResponse { signature } = response.json().await?;

        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use types::{config::Config, phase0::containers::AttestationData, preset::Minimal};

    use super::*;

    #[test]
    fn signing_request_body_carries_type_and_flattened_message() -> anyhow::Result<()> {
        let config = Config::minimal();
        let message = SigningMessage::<Minimal>::Attestation(AttestationData::default());

        let request = SigningRequest {
            kind: message.web3signer_type(),
            fork_info: Some(ForkInfo {
                fork: config.fork_at_epoch(0),
                genesis_validators_root: H256::zero(),
            }),
            signing_root: H256::repeat_byte(0x21),
            message: &message,
        };

        let value = serde_json::to_value(&request)?;

        assert_eq!(value["type"], "ATTESTATION");
        assert_eq!(value["attestation"]["slot"], "0");
        assert_eq!(
            value["signing_root"],
            json!("0x2121212121212121212121212121212121212121212121212121212121212121"),
        );

        Ok(())
    }
}
