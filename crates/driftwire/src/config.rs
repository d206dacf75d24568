// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine configuration.
//!
//! Both peers must run with the same wire-affecting settings
//! (`compress_ints`, `compress_longs`, `track_refs_for_basic_types`); the
//! remaining flags are local policy.

use crate::error::{Error, Result};
use crate::grouper::GroupOpts;

/// How the engine treats field-set drift between peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatibleMode {
    /// Any unreconcilable field mapping is fatal.
    Strict,
    /// Added and removed fields are tolerated in both directions.
    ForwardBackward,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub compatible_mode: CompatibleMode,
    pub meta_share_enabled: bool,
    pub check_class_version: bool,
    pub compress_ints: bool,
    pub compress_longs: bool,
    pub track_refs_for_basic_types: bool,
    pub code_gen_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compatible_mode: CompatibleMode::ForwardBackward,
            meta_share_enabled: true,
            check_class_version: false,
            compress_ints: false,
            compress_longs: false,
            track_refs_for_basic_types: false,
            code_gen_enabled: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compatible_mode(mut self, mode: CompatibleMode) -> Self {
        self.compatible_mode = mode;
        self
    }

    pub fn meta_share(mut self, enabled: bool) -> Self {
        self.meta_share_enabled = enabled;
        self
    }

    pub fn check_class_version(mut self, enabled: bool) -> Self {
        self.check_class_version = enabled;
        self
    }

    pub fn compress_ints(mut self, enabled: bool) -> Self {
        self.compress_ints = enabled;
        self
    }

    pub fn compress_longs(mut self, enabled: bool) -> Self {
        self.compress_longs = enabled;
        self
    }

    pub fn track_refs_for_basic_types(mut self, enabled: bool) -> Self {
        self.track_refs_for_basic_types = enabled;
        self
    }

    pub fn code_gen(mut self, enabled: bool) -> Self {
        self.code_gen_enabled = enabled;
        self
    }

    /// Reject contradictory combinations.
    ///
    /// Class-version stamps and shared definitions are redundant and disagree
    /// under drift: the stamp would fail exactly the evolutions compatible
    /// mode exists to allow.
    pub fn validate(&self) -> Result<()> {
        if self.check_class_version
            && self.meta_share_enabled
            && self.compatible_mode == CompatibleMode::ForwardBackward
        {
            return Err(Error::InvalidConfig(
                "check_class_version must be off when meta sharing and forward-backward \
                 compatibility are both enabled"
                    .into(),
            ));
        }
        Ok(())
    }

    /// The subset that drives descriptor grouping.
    pub fn group_opts(&self) -> GroupOpts {
        GroupOpts {
            track_refs_for_basics: self.track_refs_for_basic_types,
            compress_ints: self.compress_ints,
            compress_longs: self.compress_longs,
        }
    }
}
