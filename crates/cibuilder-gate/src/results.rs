//! Project-wide aggregation of diagnostics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diagnostic::{FileMessages, MessageCategory, MessageInfo, MessageReference};

/// Diagnostics of a whole project, per file and per code.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResults {
    pub num_messages: usize,
    pub num_errors: usize,
    pub num_warnings: usize,
    /// Keyed by file name.
    pub results: BTreeMap<String, FileMessages>,
    /// Keyed by diagnostic code.
    pub by_message: BTreeMap<String, MessageInfo>,
}

impl ProjectResults {
    /// Count and index the diagnostics of `files`.
    pub fn aggregate(files: impl IntoIterator<Item = FileMessages>) -> Self {
        let mut output = Self::default();
        for file in files {
            output.num_messages += file.messages.len();
            for msg in &file.messages {
                let item = output.by_message.entry(msg.code.clone()).or_default();
                item.count += 1;
                item.references.push(MessageReference {
                    message: msg.clone(),
                    file_info: file.info.clone(),
                });
                match msg.category {
                    MessageCategory::Error => output.num_errors += 1,
                    MessageCategory::Warning => output.num_warnings += 1,
                    _ => {}
                }
            }
            output.results.insert(file.info.file_name.clone(), file);
        }
        output
    }

    /// Number of files with at least one diagnostic.
    pub fn files_with_messages(&self) -> usize {
        self.results
            .values()
            .filter(|f| !f.messages.is_empty())
            .count()
    }
}
