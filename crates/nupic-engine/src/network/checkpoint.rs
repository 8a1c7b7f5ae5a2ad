// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Structure file of a saved network (`network.json` inside the bundle).

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use nupic_types::Dimensions;
use serde::{Deserialize, Serialize};

use crate::{EngineError, EngineResult};

pub const STRUCTURE_FILE: &str = "network.json";
pub const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDescription {
    pub name: String,
    pub node_type: String,
    pub dimensions: Dimensions,
    pub phases: BTreeSet<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDescription {
    pub policy_type: String,
    #[serde(default)]
    pub params: String,
    pub src_region: String,
    pub src_output: String,
    pub dest_region: String,
    pub dest_input: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDescription {
    pub version: u32,
    pub label: String,
    pub regions: Vec<RegionDescription>,
    pub links: Vec<LinkDescription>,
}

impl NetworkDescription {
    pub fn write(&self, bundle_path: &Path) -> EngineResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(bundle_path.join(STRUCTURE_FILE), json)?;
        Ok(())
    }

    pub fn read(bundle_path: &Path) -> EngineResult<Self> {
        let path = bundle_path.join(STRUCTURE_FILE);
        if !path.is_file() {
            return Err(EngineError::BadCheckpoint(format!(
                "{} has no {}",
                bundle_path.display(),
                STRUCTURE_FILE
            )));
        }
        let description: NetworkDescription = serde_json::from_str(&fs::read_to_string(&path)?)?;
        if description.version != FORMAT_VERSION {
            return Err(EngineError::BadCheckpoint(format!(
                "{} is version {}, expected {}",
                path.display(),
                description.version,
                FORMAT_VERSION
            )));
        }
        Ok(description)
    }

    /// Whether `path` already holds a saved network
    pub fn is_bundle(path: &Path) -> bool {
        path.is_dir() && path.join(STRUCTURE_FILE).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_version_is_checked() {
        let dir = tempdir().unwrap();
        let mut description = NetworkDescription {
            version: FORMAT_VERSION,
            label: "network".into(),
            regions: vec![RegionDescription {
                name: "A".into(),
                node_type: "TestNode".into(),
                dimensions: Dimensions::new(vec![2]),
                phases: BTreeSet::from([0]),
            }],
            links: Vec::new(),
        };
        assert!(!NetworkDescription::is_bundle(dir.path()));
        description.write(dir.path()).unwrap();
        assert!(NetworkDescription::is_bundle(dir.path()));
        assert_eq!(NetworkDescription::read(dir.path()).unwrap(), description);

        description.version = 1;
        description.write(dir.path()).unwrap();
        assert!(matches!(
            NetworkDescription::read(dir.path()),
            Err(EngineError::BadCheckpoint(_))
        ));
    }
}
