// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Snapshot of a pipeline's strategy chain for inspection and reports.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::core::policies::LogPolicy;
use crate::core::traits::StrategyHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEntry {
    pub index: usize,
    pub name: String,
    pub log_policy: LogPolicy,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineLayout {
    entries: Vec<LayoutEntry>,
    name_to_indices: HashMap<String, Vec<usize>>,
}

impl PipelineLayout {
    pub(crate) fn from_chain(chain: &[StrategyHandle]) -> Self {
        let mut entries = Vec::with_capacity(chain.len());
        let mut name_to_indices: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, strategy) in chain.iter().enumerate() {
            name_to_indices
                .entry(strategy.name().to_string())
                .or_default()
                .push(index);
            entries.push(LayoutEntry {
                index,
                name: strategy.name().to_string(),
                log_policy: strategy.log_policy(),
            });
        }
        Self {
            entries,
            name_to_indices,
        }
    }

    pub fn index_to_name(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.name.as_str())
    }

    /// Every position a strategy name occupies. Names are not unique.
    pub fn name_to_indices(&self, name: &str) -> &[usize] {
        self.name_to_indices
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `(index, name)` pairs in chain order.
    pub fn ordered_items(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries.iter().map(|e| (e.index, e.name.as_str()))
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tree view, one line per strategy.
    pub fn render(&self, pipeline_name: &str) -> String {
        let mut out = String::new();
        let rule = "=".repeat(40);
        let _ = writeln!(out);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, " Pipeline Layout: {pipeline_name}");
        let _ = writeln!(out, "{rule}");
        if self.entries.is_empty() {
            let _ = writeln!(out, "   (Empty Pipeline)");
        } else {
            let last = self.entries.len() - 1;
            for (i, entry) in self.entries.iter().enumerate() {
                let prefix = if i == last { "   └──" } else { "   ├──" };
                let _ = writeln!(out, "{prefix} [{}] {}", entry.index, entry.name);
            }
        }
        out.push_str(&"-".repeat(40));
        out
    }
}
