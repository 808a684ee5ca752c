//! Cross-product expansion of parameter blocks.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use relay_domain::ParameterBlock;

use crate::template::to_display_string;

/// One expanded iteration: its variable bindings and a display label.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamRow {
    /// Variable bindings for this iteration.
    pub values: IndexMap<String, JsonValue>,
    /// Label used as the iteration key in reports (e.g. `dev-json`).
    pub id: String,
}

/// Expands one block into its rows.
fn block_rows(block: &ParameterBlock) -> Vec<ParamRow> {
    match block {
        ParameterBlock::Individual(block) => {
            let Some((key, values)) = block.individual.iter().next() else {
                return Vec::new();
            };
            values
                .iter()
                .enumerate()
                .map(|(i, value)| ParamRow {
                    values: IndexMap::from([(key.clone(), value.clone())]),
                    id: block
                        .ids
                        .as_ref()
                        .map_or_else(|| to_display_string(value), |ids| ids[i].clone()),
                })
                .collect()
        }
        ParameterBlock::Combinations(block) => block
            .combinations
            .iter()
            .enumerate()
            .map(|(i, row)| ParamRow {
                values: row.clone(),
                id: block.ids.as_ref().map_or_else(
                    || {
                        row.values()
                            .map(to_display_string)
                            .collect::<Vec<_>>()
                            .join("-")
                    },
                    |ids| ids[i].clone(),
                ),
            })
            .collect(),
    }
}

/// Materializes the Cartesian product of the given blocks, in lexicographic
/// order (the last block varies fastest). Returns an empty list when no
/// block is given.
pub fn expand(blocks: &[ParameterBlock]) -> Vec<ParamRow> {
    let mut rows: Vec<ParamRow> = Vec::new();
    for block in blocks {
        let next = block_rows(block);
        if rows.is_empty() {
            rows = next;
            continue;
        }
        let mut combined = Vec::with_capacity(rows.len() * next.len());
        for left in &rows {
            for right in &next {
                let mut values = left.values.clone();
                for (k, v) in &right.values {
                    values.insert(k.clone(), v.clone());
                }
                combined.push(ParamRow {
                    values,
                    id: format!("{}-{}", left.id, right.id),
                });
            }
        }
        rows = combined;
    }
    rows
}
