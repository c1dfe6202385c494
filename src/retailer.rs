use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Retailer {
    Soriana,
    Walmart,
    Chedraui,
    Fresko,
}

impl Retailer {
    pub const ALL: [Retailer; 4] = [
        Retailer::Soriana,
        Retailer::Walmart,
        Retailer::Chedraui,
        Retailer::Fresko,
    ];

    /// Name used for cache keys, report titles and configuration lookups.
    pub fn as_str(&self) -> &'static str {
        match self {
            Retailer::Soriana => "SORIANA",
            Retailer::Walmart => "WALMART",
            Retailer::Chedraui => "CHEDRAUI",
            Retailer::Fresko => "FRESKO",
        }
    }

    /// Fresko exports never come from a remote source.
    pub fn manual_only(&self) -> bool {
        matches!(self, Retailer::Fresko)
    }
}

impl fmt::Display for Retailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Retailer {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        Retailer::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| anyhow!("Unknown retailer '{trimmed}'"))
    }
}
