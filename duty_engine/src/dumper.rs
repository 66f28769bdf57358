use std::path::PathBuf;

use anyhow::Result;
use log::warn;
use serde::Serialize;
use types::{
    combined::SignedBeaconBlock,
    phase0::{containers::Attestation, primitives::H256},
    preset::Preset,
};

/// Writes self-produced messages as JSON files for offline inspection.
pub struct DataDumper {
    directory: PathBuf,
}

impl DataDumper {
    pub fn new(directory: PathBuf) -> Result<Self> {
        fs_err::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn dump_signed_beacon_block<P: Preset>(
        &self,
        block: &SignedBeaconBlock<P>,
        block_root: H256,
    ) {
        let file_name = format!("block_{}_{block_root:x}.json", block.slot());
        self.write(&file_name, block);
    }

    pub fn dump_own_attestation<P: Preset>(&self, attestation: &Attestation<P>) {
        let file_name = format!(
            "attestation_{}_{}.json",
            attestation.data.slot, attestation.data.index,
        );
        self.write(&file_name, attestation);
    }

    fn write(&self, file_name: &str, message: &impl Serialize) {
        let path = self.directory.join(file_name);

        let result = serde_json::to_vec_pretty(message)
            .map_err(anyhow::Error::from)
            .and_then(|json| fs_err::write(&path, json).map_err(Into::into));

        if let Err(error) = result {
            warn!("failed to dump message to {path:?}: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use types::preset::Minimal;

    use super::*;

    #[test]
    fn dumps_are_written_as_json_files() -> Result<()> {
        let directory = tempfile::tempdir()?;
        let dumper = DataDumper::new(directory.path().to_owned())?;

        dumper.dump_own_attestation(&Attestation::<Minimal>::default());

        let path = directory.path().join("attestation_0_0.json");
        let contents = fs_err::read_to_string(path)?;

        assert!(contents.contains("aggregation_bits"));

        Ok(())
    }
}
