use failure::Fail;
use serde_json::Value;

use log::info;

use super::record_paths::{deep_merge, pick_at_path, set_value_at_path, value_at_path};

pub const DEFAULT_MAX_OUTPUTS: usize = 10_000;

#[derive(Debug, Fail)]
pub enum PermuteError {
    #[fail(display = "value at field path '{}' is not an array", _0)]
    InvalidField(String),
    #[fail(display = "field paths must be a string or an array of strings")]
    InvalidFieldPaths,
    #[fail(display = "permutation count {} exceeds the maximum of {}", _0, _1)]
    TooManyPermutations(usize, usize),
}

/**
 * Cartesian product of candidate-value lists, first list varying slowest.
 * The empty input yields the identity `[[]]`; any empty sub-list collapses
 * the whole product to `[]`.
 */
pub fn cartesian_product<T: Clone>(lists: &[Vec<T>]) -> Vec<Vec<T>> {
    lists.iter().fold(vec![vec![]], |acc, list| {
        acc.iter()
            .flat_map(|combination| {
                list.iter().map(move |item| {
                    let mut extended = combination.clone();
                    extended.push(item.clone());
                    extended
                })
            })
            .collect()
    })
}

/**
 * Designated field paths for permutation. A bare string is treated as a
 * singleton list.
 */
#[derive(Debug, Clone)]
pub enum FieldPaths {
    Single(String),
    Many(Vec<String>),
}

impl FieldPaths {
    /**
     * Accepts a JSON string or array of strings; anything else is rejected.
     */
    pub fn from_value(value: &Value) -> Result<FieldPaths, PermuteError> {
        match value {
            Value::String(path) => Ok(FieldPaths::Single(path.clone())),
            Value::Array(items) => {
                let mut paths = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(path) => paths.push(path.clone()),
                        _ => return Err(PermuteError::InvalidFieldPaths),
                    }
                }
                Ok(FieldPaths::Many(paths))
            }
            _ => Err(PermuteError::InvalidFieldPaths),
        }
    }

    pub fn paths(&self) -> Vec<&str> {
        match self {
            FieldPaths::Single(path) => vec![path.as_str()],
            FieldPaths::Many(paths) => paths.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for FieldPaths {
    fn from(path: &str) -> FieldPaths {
        FieldPaths::Single(path.to_string())
    }
}

impl From<Vec<String>> for FieldPaths {
    fn from(paths: Vec<String>) -> FieldPaths {
        FieldPaths::Many(paths)
    }
}

pub struct Permuter {
    max_outputs: usize,
}

impl Default for Permuter {
    fn default() -> Permuter {
        Permuter {
            max_outputs: DEFAULT_MAX_OUTPUTS,
        }
    }
}

impl Permuter {
    pub fn new(max_outputs: usize) -> Permuter {
        Permuter { max_outputs }
    }

    /**
     * One deep clone of `record` per candidate value at `field_path`, with
     * the path pinned to that single value. The value at the path must be
     * an array.
     */
    pub fn permutations_of_field_by_values(
        &self,
        record: &Value,
        field_path: &str,
    ) -> Result<Vec<Value>, PermuteError> {
        let variations = match value_at_path(record, field_path) {
            Some(Value::Array(items)) => items.clone(),
            _ => return Err(PermuteError::InvalidField(field_path.to_string())),
        };

        let mut perms = Vec::with_capacity(variations.len());
        for variation in variations {
            let mut perm = record.clone();
            set_value_at_path(&mut perm, field_path, variation);
            perms.push(perm);
        }

        Ok(perms)
    }

    /**
     * Expand `record` over every combination of the designated fields'
     * candidate values. Each field's permutations are computed over a
     * single-path fragment; the Cartesian product of those fragments is
     * merged back into fresh clones of the record.
     */
    pub fn permutations_of_fields_by_values(
        &self,
        record: &Value,
        field_paths: &FieldPaths,
    ) -> Result<Vec<Value>, PermuteError> {
        let mut per_field = Vec::new();
        let mut total: usize = 1;

        for path in field_paths.paths() {
            let fragment = pick_at_path(record, path);
            let perms = self.permutations_of_field_by_values(&fragment, path)?;

            total = total.saturating_mul(perms.len());
            per_field.push(perms);
        }

        if total > self.max_outputs {
            return Err(PermuteError::TooManyPermutations(total, self.max_outputs));
        }

        let combinations = cartesian_product(&per_field);

        let mut merged = Vec::with_capacity(combinations.len());
        for combination in combinations {
            let mut perm = record.clone();
            for fragment in &combination {
                deep_merge(&mut perm, fragment);
            }
            merged.push(perm);
        }

        info!("Found {} permutations", merged.len());
        Ok(merged)
    }
}
