// src/aggregate/mod.rs
//! Summaries computed from the cleaned permits table.

use std::collections::HashMap;

use crate::process::Table;

pub mod counts;
pub mod mean_price;
pub mod top_n;

pub use counts::{count_by_type, TypeCount};
pub use mean_price::{mean_price_by_type, TypeMean};
pub use top_n::{top_by_amount, RankedRow, TopN};

pub const PERMIT_TYPE: &str = "PERMIT_TYPE";
pub const ESTIMATED_COST: &str = "ESTIMATED_COST";
pub const AMOUNT_PAID: &str = "AMOUNT_PAID";

/// Row indices grouped by the value in column `key`, groups in order of first appearance.
pub(crate) fn group_rows<'a>(table: &'a Table, key: usize) -> Vec<(&'a str, Vec<usize>)> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();

    for row in 0..table.len() {
        let value = table.cell(row, key);
        let slot = *slots.entry(value).or_insert_with(|| {
            groups.push((value, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(row);
    }
    groups
}

#[cfg(test)]
pub(crate) fn sample_table() -> Table {
    Table::new(
        vec![PERMIT_TYPE.into(), AMOUNT_PAID.into(), ESTIMATED_COST.into()],
        vec![
            vec!["PERMIT - EASY".into(), " 100".into(), " 90".into()],
            vec!["PERMIT - EASY".into(), " 50".into(), " 40".into()],
            vec!["PERMIT - RENOV".into(), " 500".into(), " 480".into()],
        ],
    )
}
