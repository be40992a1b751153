// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::config::{Error, ExecutionConfig};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::Path};

pub trait PersistableConfig: Serialize + DeserializeOwned {
    /// Load the config from disk at the given path
    fn load_config<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_path_string = path.as_ref().display().to_string();
        let file_contents = fs::read_to_string(&path).map_err(|error| {
            Error::Unexpected(format!(
                "Failed to read the config file: {:?}. Error: {:?}",
                config_path_string, error
            ))
        })?;

        Self::parse_serialized_config(&file_contents)
    }

    /// Save the config to disk at the given output path
    fn save_config<P: AsRef<Path>>(&self, output_file: P) -> Result<(), Error> {
        let output_path_string = output_file.as_ref().display().to_string();
        let serialized_config = serde_yaml::to_string(&self)
            .map_err(|e| Error::Yaml(output_path_string.clone(), e))?;

        fs::write(output_file.as_ref(), serialized_config)
            .map_err(|e| Error::IO(output_path_string, e))
    }

    /// Parse the config from the serialized string
    fn parse_serialized_config(serialized_config: &str) -> Result<Self, Error> {
        serde_yaml::from_str(serialized_config).map_err(|e| Error::Yaml("config".to_string(), e))
    }
}

impl PersistableConfig for ExecutionConfig {}
