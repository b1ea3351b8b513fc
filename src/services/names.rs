// ABOUTME: Validator name registry built from a static index-range inventory
// ABOUTME: Resolves a validator index to the name of the range that contains it

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use super::error::NamesError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamesConfig {
    /// `"<start>-<end>"` (inclusive) or `"<index>"` mapped to a name.
    #[serde(default)]
    pub inventory: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
struct NameRange {
    start: u64,
    end: u64,
    name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidatorNames {
    ranges: Vec<NameRange>,
}

impl ValidatorNames {
    pub fn new(config: &NamesConfig) -> Result<Self, NamesError> {
        let mut ranges = config
            .inventory
            .iter()
            .map(|(key, name)| {
                let (start, end) = parse_range(key)?;
                Ok(NameRange {
                    start,
                    end,
                    name: name.clone(),
                })
            })
            .collect::<Result<Vec<_>, NamesError>>()?;
        ranges.sort_by_key(|r| (r.start, r.end));

        debug!("Loaded {} validator name ranges", ranges.len());
        Ok(Self { ranges })
    }

    pub fn name_by_index(&self, index: u64) -> Option<&str> {
        self.ranges
            .iter()
            .find(|r| r.start <= index && index <= r.end)
            .map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

fn parse_range(key: &str) -> Result<(u64, u64), NamesError> {
    let invalid = |reason: &str| NamesError::InvalidInventory {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    let parse = |s: &str| {
        s.trim()
            .parse::<u64>()
            .map_err(|_| invalid("bounds must be unsigned integers"))
    };

    let (start, end) = match key.split_once('-') {
        Some((start, end)) => (parse(start)?, parse(end)?),
        None => {
            let index = parse(key)?;
            (index, index)
        }
    };
    if start > end {
        return Err(invalid("range start is after range end"));
    }
    Ok((start, end))
}
