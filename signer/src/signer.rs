use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use anyhow::Result;
use arc_swap::{ArcSwap, Guard};
use bls::{PublicKeyBytes, SecretKey, Signature};
use futures::{
    stream::{FuturesUnordered, TryStreamExt as _},
    try_join, TryFutureExt as _,
};
use itertools::Itertools as _;
use log::{info, warn};
use rayon::iter::{IntoParallelIterator as _, ParallelIterator as _};
use thiserror::Error;
use types::{phase0::primitives::H256, preset::Preset};

use crate::{
    types::{ForkInfo, SigningMessage, SigningTriple},
    web3signer::Web3SignerEndpoint,
};

#[derive(Debug, Error)]
enum Error {
    #[error("cannot sign due to missing credentials for a public key: {public_key:?}")]
    MissingCredentials { public_key: PublicKeyBytes },
    #[error("remote signature for {public_key:?} failed to decompress")]
    UndecodableSignature { public_key: PublicKeyBytes },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeyOrigin {
    LocalFileSystem,
    Web3Signer,
}

#[derive(Clone)]
enum SignMethod {
    SecretKey(Arc<SecretKey>),
    Web3Signer(Web3SignerEndpoint),
}

pub struct Signer {
    snapshot: ArcSwap<Snapshot>,
}

impl Signer {
    pub fn new(
        validator_keys: impl IntoIterator<Item = (PublicKeyBytes, Arc<SecretKey>)>,
    ) -> Self {
        let sign_methods = validator_keys
            .into_iter()
            .map(|(public_key, secret_key)| (public_key, SignMethod::SecretKey(secret_key)))
            .collect();

        let snapshot = ArcSwap::from_pointee(Snapshot { sign_methods });

        Self { snapshot }
    }

    /// Fetches the keys each remote endpoint is willing to sign for and adds
    /// them to the snapshot. Endpoints that fail are retried on the next call.
    pub async fn load_keys_from_web3signer(
        &self,
        endpoints: impl IntoIterator<Item = Web3SignerEndpoint>,
    ) {
        for endpoint in endpoints {
            match endpoint.fetch_public_keys().await {
                Ok(keys) => {
                    info!(
                        "loaded {} validator key(s) from Web3Signer at {}",
                        keys.len(),
                        endpoint.url(),
                    );

                    self.update(|snapshot| {
                        let mut snapshot = snapshot.as_ref().clone();

                        for public_key in keys.iter().copied() {
                            snapshot.append_remote_key(public_key, endpoint.clone());
                        }

                        snapshot
                    });
                }
                Err(error) => warn!(
                    "failed to load Web3Signer keys from {}: {error:?}",
                    endpoint.url(),
                ),
            }
        }
    }

    #[must_use]
    pub fn load(&self) -> Guard<Arc<Snapshot>> {
        self.snapshot.load()
    }

    pub fn update<R, F>(&self, f: F) -> Arc<Snapshot>
    where
        F: FnMut(&Arc<Snapshot>) -> R,
        R: Into<Arc<Snapshot>>,
    {
        self.snapshot.rcu(f)
    }
}

#[derive(Clone, Default)]
pub struct Snapshot {
    sign_methods: HashMap<PublicKeyBytes, SignMethod>,
}

impl Snapshot {
    #[must_use]
    pub fn has_key(&self, public_key: PublicKeyBytes) -> bool {
        self.sign_methods.contains_key(&public_key)
    }

    #[must_use]
    pub fn no_keys(&self) -> bool {
        self.sign_methods.is_empty()
    }

    pub fn keys(&self) -> impl ExactSizeIterator<Item = &PublicKeyBytes> {
        self.sign_methods.keys()
    }

    pub fn keys_with_origin(&self) -> impl Iterator<Item = (PublicKeyBytes, KeyOrigin)> + '_ {
        self.sign_methods
            .iter()
            .map(|(pubkey, sign_method)| match sign_method {
                SignMethod::SecretKey(_) => (*pubkey, KeyOrigin::LocalFileSystem),
                SignMethod::Web3Signer(_) => (*pubkey, KeyOrigin::Web3Signer),
            })
    }

    pub fn append_keys(
        &mut self,
        keys: impl IntoIterator<Item = (PublicKeyBytes, Arc<SecretKey>)>,
    ) {
        for (public_key, secret_key) in keys {
            self.sign_methods
                .entry(public_key)
                .or_insert(SignMethod::SecretKey(secret_key));
        }
    }

    pub fn append_remote_key(
        &mut self,
        public_key: PublicKeyBytes,
        endpoint: Web3SignerEndpoint,
    ) -> bool {
        match self.sign_methods.entry(public_key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(SignMethod::Web3Signer(endpoint));
                true
            }
        }
    }

    pub fn delete_key(&mut self, public_key: PublicKeyBytes) {
        self.sign_methods.remove(&public_key);
    }

    pub async fn sign<'block, P: Preset>(
        &self,
        message: SigningMessage<'block, P>,
        signing_root: H256,
        fork_info: Option<ForkInfo>,
        public_key: PublicKeyBytes,
    ) -> Result<Signature> {
        let signature = match self.sign_method(public_key)? {
            SignMethod::SecretKey(secret_key) => secret_key.sign(signing_root),
            SignMethod::Web3Signer(endpoint) => endpoint
                .sign(&message, signing_root, fork_info, public_key)
                .await?
                .try_into()
                .map_err(|_| Error::UndecodableSignature { public_key })?,
        };

        Ok(signature)
    }

    /// Signs a batch. Local keys are signed in parallel on the blocking pool;
    /// remote keys are signed concurrently over HTTP. Output order matches
    /// input order.
    pub async fn sign_triples<P: Preset>(
        &self,
        triples: impl IntoIterator<Item = SigningTriple<'_, P>> + Send,
        fork_info: Option<ForkInfo>,
    ) -> Result<impl Iterator<Item = Signature>> {
        let mut sign_locally = vec![];
        let mut sign_remotely = vec![];

        for (index, triple) in triples.into_iter().enumerate() {
            let SigningTriple {
                message,
                signing_root,
                public_key,
            } = triple;

            match self.sign_method(public_key)? {
                SignMethod::SecretKey(secret_key) => {
                    sign_locally.push((index, signing_root, secret_key.clone()));
                }
                SignMethod::Web3Signer(_) => {
                    sign_remotely.push((index, message, signing_root, public_key));
                }
            }
        }

        let sign_locally_future = tokio::task::spawn_blocking(|| {
            sign_locally
                .into_par_iter()
                .map(|(index, signing_root, secret_key)| {
                    let signature = secret_key.sign(signing_root);
                    (index, signature)
                })
                .collect::<Vec<_>>()
        })
        .map_err(Into::into);

        let sign_remotely_future = async {
            sign_remotely
                .into_iter()
                .map(|(index, message, signing_root, public_key)| async move {
                    self.sign(message, signing_root, fork_info, public_key)
                        .await
                        .map(|signature| (index, signature))
                })
                .collect::<FuturesUnordered<_>>()
                .try_collect::<Vec<_>>()
                .await
        };

        let (local, remote) = try_join!(sign_locally_future, sign_remotely_future)?;

        Ok(local
            .into_iter()
            .chain(remote)
            .sorted_by_key(|(index, _)| *index)
            .map(|(_, signature)| signature))
    }

    fn sign_method(&self, public_key: PublicKeyBytes) -> Result<&SignMethod> {
        self.sign_methods
            .get(&public_key)
            .ok_or(Error::MissingCredentials { public_key })
            .map_err(Into::into)
    }
}
