// Crosscut
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Weaver configuration.

/// Knobs for one weaver instance.
#[derive(Debug, Clone)]
pub struct WeaverConfig {
    /// Run the coarse class-level filter before per-join-point matching.
    /// Disabling it only costs time; the precise phase decides anyway.
    pub class_filter: bool,
    /// Weave independent class units in parallel in `weave_all`.
    pub parallel: bool,
    /// Treat per-binding weave failures as fatal for the whole class
    /// instead of recording them on the woven unit.
    pub strict: bool,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            class_filter: true,
            parallel: true,
            strict: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WeaverConfig::default();
        assert!(config.class_filter);
        assert!(config.parallel);
        assert!(!config.strict);
    }
}
