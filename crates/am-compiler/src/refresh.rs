//! Idempotent filter-set installation
//!
//! Fetching is left to the host; this module decides whether freshly fetched
//! text needs compiling and swaps the result in.

use std::time::Duration;

use am_core::filter::SharedFilterSet;

use crate::{compile_with_stats, CompileStats};

pub const DEFAULT_SUBSCRIPTION_URL: &str = "https://easylist.to/easylist/easylist.txt";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Where and how often to fetch the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// `http(s)://` URL or local file path
    pub source: String,
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SUBSCRIPTION_URL.to_string(),
            interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Text is byte-identical to the current set's source; nothing compiled.
    Unchanged,
    /// A new set was compiled and swapped in.
    Updated(CompileStats),
}

/// Install subscription text into the shared holder, compiling only when it
/// differs from the text the current set was built from.
pub fn install(shared: &SharedFilterSet, text: &str) -> RefreshOutcome {
    if shared.is_source(text) {
        log::debug!("filter subscription unchanged ({} bytes)", text.len());
        return RefreshOutcome::Unchanged;
    }

    let (set, stats) = compile_with_stats(text);
    shared.swap(set);
    log::info!(
        "filter set loaded: {} rules from {} lines ({} skipped, {} dropped, {} duplicates)",
        stats.rules,
        stats.parse.lines,
        stats.parse.skipped(),
        stats.dropped,
        stats.deduped,
    );
    RefreshOutcome::Updated(stats)
}
