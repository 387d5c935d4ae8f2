use bimap::BiMap;
use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// The fixed set of cluster nodes, `prefix` + every integer in `[start, end]`.
///
/// Each node owns one column in the schedule grid. Columns follow the numeric
/// node id, so "lowest column" and "lowest node id" mean the same thing.
#[derive(Debug, Clone)]
pub struct NodeRange {
    prefix: String,
    start: u32,
    end: u32,
    columns: BiMap<String, usize>,
}

impl NodeRange {
    pub fn new(prefix: impl Into<String>, start: u32, end: u32) -> Result<Self> {
        let prefix = prefix.into();

        if start > end {
            return Err(Error::ConfigError(format!("node range start {} is greater than end {}", start, end)));
        }

        let mut columns = BiMap::new();
        for (column, number) in (start..=end).enumerate() {
            columns.insert(format!("{}{}", prefix, number), column);
        }

        Ok(NodeRange { prefix, start, end, columns })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All node names in column order.
    pub fn names(&self) -> Vec<String> {
        (self.start..=self.end).map(|n| format!("{}{}", self.prefix, n)).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.get_by_left(name).copied()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.columns.get_by_right(&index).map(|name| name.as_str())
    }

    /// Maps node names to grid columns, failing on the first unknown name.
    pub fn indices_of(&self, names: &[String]) -> Result<Vec<usize>> {
        names.iter().map(|name| self.index_of(name).ok_or_else(|| Error::MalformedNodeList(name.clone()))).collect()
    }

    pub fn names_of(&self, indices: &[usize]) -> Vec<String> {
        indices.iter().filter_map(|index| self.name_of(*index)).map(|name| name.to_string()).collect()
    }

    /// Expands a compact node list into explicit, sorted, de-duplicated names.
    ///
    /// Accepted forms: `host[1-4,7]`, `host1,host3`, `host2` and mixtures
    /// such as `host[1-2],host5`. Every node must lie inside the range.
    pub fn split_range(&self, spec: &str) -> Result<Vec<String>> {
        let malformed = || Error::MalformedNodeList(spec.to_string());
        let spec = spec.trim();

        if spec.is_empty() {
            return Err(malformed());
        }

        let mut numbers: BTreeSet<u32> = BTreeSet::new();

        for part in split_top_level(spec) {
            let part = part.trim();

            if let Some(open) = part.find('[') {
                if !part.ends_with(']') || &part[..open] != self.prefix {
                    return Err(malformed());
                }

                let inner = &part[open + 1..part.len() - 1];
                for item in inner.split(',') {
                    let (low, high) = parse_span(item.trim()).ok_or_else(malformed)?;
                    for number in low..=high {
                        numbers.insert(number);
                    }
                }
            } else {
                let number = part.strip_prefix(self.prefix.as_str()).and_then(|rest| rest.parse::<u32>().ok()).ok_or_else(malformed)?;
                numbers.insert(number);
            }
        }

        if numbers.is_empty() || numbers.iter().any(|n| *n < self.start || *n > self.end) {
            return Err(malformed());
        }

        Ok(numbers.into_iter().map(|n| format!("{}{}", self.prefix, n)).collect())
    }

    /// Compresses explicit names back into the `prefix[1-3,7]` form.
    pub fn unsplit_range(&self, names: &[String]) -> Result<String> {
        let mut numbers: BTreeSet<u32> = BTreeSet::new();

        for name in names {
            let number = name
                .strip_prefix(self.prefix.as_str())
                .and_then(|rest| rest.parse::<u32>().ok())
                .filter(|n| *n >= self.start && *n <= self.end)
                .ok_or_else(|| Error::MalformedNodeList(name.clone()))?;
            numbers.insert(number);
        }

        let mut runs: Vec<(u32, u32)> = Vec::new();
        for number in numbers {
            match runs.last_mut() {
                Some((_, high)) if *high + 1 == number => *high = number,
                _ => runs.push((number, number)),
            }
        }

        if runs.len() == 1 && runs[0].0 == runs[0].1 {
            return Ok(format!("{}{}", self.prefix, runs[0].0));
        }

        let body: Vec<String> =
            runs.iter().map(|(low, high)| if low == high { low.to_string() } else { format!("{}-{}", low, high) }).collect();

        Ok(format!("{}[{}]", self.prefix, body.join(",")))
    }
}

/// Splits on commas that are not inside brackets.
fn split_top_level(spec: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut last = 0;

    for (i, c) in spec.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&spec[last..i]);
                last = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&spec[last..]);

    parts
}

fn parse_span(item: &str) -> Option<(u32, u32)> {
    match item.split_once('-') {
        Some((low, high)) => {
            let low = low.trim().parse::<u32>().ok()?;
            let high = high.trim().parse::<u32>().ok()?;
            if low > high {
                return None;
            }
            Some((low, high))
        }
        None => {
            let single = item.parse::<u32>().ok()?;
            Some((single, single))
        }
    }
}
