// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::config::Error;

/// A trait for validating a config before it is handed to the component that consumes it.
pub trait ConfigSanitizer {
    /// Returns the name of the sanitizer (for logging and error purposes)
    fn get_sanitizer_name() -> String {
        let type_name = std::any::type_name::<Self>();
        type_name.rsplit("::").next().unwrap_or(type_name).to_string()
    }

    /// Validate and process the config
    fn sanitize(&self) -> Result<(), Error>;
}
