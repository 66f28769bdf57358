use std::{collections::HashMap, sync::Arc};

use bls::{PublicKeyBytes, SecretKey};
use log::{info, warn};
use once_cell::sync::OnceCell;
use reqwest::{Client, Url};
use signer::{KeyOrigin, Signer, Web3SignerEndpoint};
use types::phase0::primitives::ValidatorIndex;

/// Configuration-time description of one keystore.
pub enum KeystoreDescriptor {
    Local {
        secret_key: Arc<SecretKey>,
    },
    Remote {
        url: String,
        ignore_ssl_verification: bool,
    },
}

/// One validator attached to this node. The validator index is absent until
/// the deposit is observed on chain and is backfilled on first sighting.
pub struct AttachedValidator {
    public_key: PublicKeyBytes,
    origin: KeyOrigin,
    validator_index: OnceCell<ValidatorIndex>,
}

impl AttachedValidator {
    fn new(public_key: PublicKeyBytes, origin: KeyOrigin) -> Self {
        Self {
            public_key,
            origin,
            validator_index: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn public_key(&self) -> PublicKeyBytes {
        self.public_key
    }

    #[must_use]
    pub const fn origin(&self) -> KeyOrigin {
        self.origin
    }

    #[must_use]
    pub fn validator_index(&self) -> Option<ValidatorIndex> {
        self.validator_index.get().copied()
    }

    /// Sets the index on first sighting. The index of a validator never
    /// changes; a divergent reassignment indicates state corruption.
    pub fn set_validator_index(&self, validator_index: ValidatorIndex) {
        let stored = self.validator_index.get_or_init(|| validator_index);

        assert_eq!(
            *stored, validator_index,
            "validator index for {:?} changed from {} to {}",
            self.public_key, stored, validator_index,
        );
    }
}

/// Registry of validators this node signs for, local and remote. Signing
/// itself is dispatched through [`Signer`]; the registry owns identity and
/// index state.
pub struct AttachedValidators {
    signer: Arc<Signer>,
    validators: HashMap<PublicKeyBytes, Arc<AttachedValidator>>,
    remote_endpoints: Vec<Web3SignerEndpoint>,
}

impl AttachedValidators {
    #[must_use]
    pub fn new(signer: Arc<Signer>) -> Self {
        Self {
            signer,
            validators: HashMap::new(),
            remote_endpoints: vec![],
        }
    }

    #[must_use]
    pub const fn signer(&self) -> &Arc<Signer> {
        &self.signer
    }

    pub fn add_local(
        &mut self,
        secret_key: Arc<SecretKey>,
        resolve_index: impl FnOnce(PublicKeyBytes) -> Option<ValidatorIndex>,
    ) {
        let public_key = secret_key.to_public_key().to_bytes();

        self.signer.update(|snapshot| {
            let mut snapshot = snapshot.as_ref().clone();
            snapshot.append_keys(core::iter::once((public_key, secret_key.clone())));
            snapshot
        });

        let validator = Arc::new(AttachedValidator::new(
            public_key,
            KeyOrigin::LocalFileSystem,
        ));

        match resolve_index(public_key) {
            Some(validator_index) => validator.set_validator_index(validator_index),
            None => info!(
                "validator {public_key:?} is not in the registry yet; \
                 its deposit has not been processed",
            ),
        }

        self.validators.insert(public_key, validator);
    }

    /// Registers a remote signer endpoint. Its keys are discovered later by
    /// [`Self::discover_remote_keys`]. A malformed URL is reported and
    /// dropped; startup continues with the remaining keystores.
    pub fn add_remote(&mut self, url: &str, ignore_ssl_verification: bool) {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!("ignoring remote signer with unresolvable URL {url}: {error}");
                return;
            }
        };

        let client = match Client::builder()
            .danger_accept_invalid_certs(ignore_ssl_verification)
            .build()
        {
            Ok(client) => client,
            Err(error) => {
                warn!("ignoring remote signer at {url}: failed to build HTTP client: {error}");
                return;
            }
        };

        self.remote_endpoints
            .push(Web3SignerEndpoint::new(client, parsed));
    }

    pub fn add_keystores(
        &mut self,
        descriptors: impl IntoIterator<Item = KeystoreDescriptor>,
        mut resolve_index: impl FnMut(PublicKeyBytes) -> Option<ValidatorIndex>,
    ) {
        for descriptor in descriptors {
            match descriptor {
                KeystoreDescriptor::Local { secret_key } => {
                    self.add_local(secret_key, &mut resolve_index);
                }
                KeystoreDescriptor::Remote {
                    url,
                    ignore_ssl_verification,
                } => self.add_remote(&url, ignore_ssl_verification),
            }
        }
    }

    /// Fetches public keys from all registered remote endpoints and attaches
    /// handles for them.
    pub async fn discover_remote_keys(
        &mut self,
        mut resolve_index: impl FnMut(PublicKeyBytes) -> Option<ValidatorIndex>,
    ) {
        self.signer
            .load_keys_from_web3signer(self.remote_endpoints.iter().cloned())
            .await;

        let remote_keys = self
            .signer
            .load()
            .keys_with_origin()
            .filter(|(_, origin)| *origin == KeyOrigin::Web3Signer)
            .map(|(public_key, _)| public_key)
            .collect::<Vec<_>>();

        for public_key in remote_keys {
            if self.validators.contains_key(&public_key) {
                continue;
            }

            let validator = Arc::new(AttachedValidator::new(public_key, KeyOrigin::Web3Signer));

            if let Some(validator_index) = resolve_index(public_key) {
                validator.set_validator_index(validator_index);
            }

            self.validators.insert(public_key, validator);
        }
    }

    #[must_use]
    pub fn get(&self, public_key: PublicKeyBytes) -> Option<&Arc<AttachedValidator>> {
        self.validators.get(&public_key)
    }

    /// Iteration order is unspecified and may differ between runs.
    pub fn iter(&self) -> impl Iterator<Item = (&PublicKeyBytes, &Arc<AttachedValidator>)> {
        self.validators.iter()
    }

    pub fn public_keys(&self) -> impl Iterator<Item = PublicKeyBytes> + '_ {
        self.validators.keys().copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_key(seed: u8) -> Arc<SecretKey> {
        Arc::new(SecretKey::key_gen(&[seed; 32]).expect("key material is long enough"))
    }

    #[test]
    fn add_local_resolves_the_index_when_present() {
        let mut validators = AttachedValidators::new(Arc::new(Signer::new([])));
        let secret_key = secret_key(1);
        let public_key = secret_key.to_public_key().to_bytes();

        validators.add_local(secret_key, |_| Some(7));

        let validator = validators.get(public_key).expect("validator was attached");

        assert_eq!(validator.validator_index(), Some(7));
        assert!(validators.signer().load().has_key(public_key));
    }

    #[test]
    fn index_backfill_is_monotonic() {
        let mut validators = AttachedValidators::new(Arc::new(Signer::new([])));
        let secret_key = secret_key(2);
        let public_key = secret_key.to_public_key().to_bytes();

        validators.add_local(secret_key, |_| None);

        let validator = validators.get(public_key).expect("validator was attached");

        assert_eq!(validator.validator_index(), None);

        validator.set_validator_index(3);
        validator.set_validator_index(3);

        assert_eq!(validator.validator_index(), Some(3));
    }

    #[test]
    #[should_panic(expected = "validator index")]
    fn divergent_index_reassignment_panics() {
        let validator =
            AttachedValidator::new(PublicKeyBytes::repeat_byte(1), KeyOrigin::LocalFileSystem);

        validator.set_validator_index(3);
        validator.set_validator_index(4);
    }

    #[test]
    fn malformed_remote_urls_are_dropped_without_aborting() {
        let mut validators = AttachedValidators::new(Arc::new(Signer::new([])));

        validators.add_remote("not a url", false);
        validators.add_remote("https://signer.example:9000", true);

        assert_eq!(validators.remote_endpoints.len(), 1);
        assert!(validators.is_empty());
    }
}
