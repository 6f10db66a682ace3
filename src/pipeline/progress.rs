// file: src/pipeline/progress.rs
// description: progress tracking and statistics reporting while building an index
// reference: uses indicatif for progress bars and tracks embedding throughput

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub documents_loaded: usize,
    pub nodes_indexed: usize,
    pub total_bytes_processed: u64,
    pub duration_secs: f64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes_per_second(&self) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        self.nodes_indexed as f64 / self.duration_secs
    }

    pub fn bytes_per_second(&self) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        self.total_bytes_processed as f64 / self.duration_secs
    }
}

/// How an indexing run reports progress on the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressDisplay {
    #[default]
    Hidden,
    Plain,
    Colored,
}

impl ProgressDisplay {
    pub fn from_flags(visible: bool, colored: bool) -> Self {
        match (visible, colored) {
            (false, _) => ProgressDisplay::Hidden,
            (true, false) => ProgressDisplay::Plain,
            (true, true) => ProgressDisplay::Colored,
        }
    }
}

pub struct ProgressTracker {
    bar: ProgressBar,
    documents_loaded: AtomicUsize,
    nodes_indexed: AtomicUsize,
    bytes_processed: AtomicU64,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(label: &str, total_nodes: usize, colored: bool) -> Self {
        let bar = ProgressBar::new(total_nodes as u64);
        bar.set_style(bar_style(colored));
        bar.set_prefix(label.to_string());

        Self::with_bar(bar)
    }

    pub fn with_display(label: &str, total_nodes: usize, display: ProgressDisplay) -> Self {
        match display {
            ProgressDisplay::Hidden => Self::hidden(total_nodes),
            ProgressDisplay::Plain => Self::new(label, total_nodes, false),
            ProgressDisplay::Colored => Self::new(label, total_nodes, true),
        }
    }

    /// Tracker that counts without drawing anything.
    pub fn hidden(total_nodes: usize) -> Self {
        Self::with_bar(ProgressBar::with_draw_target(
            Some(total_nodes as u64),
            ProgressDrawTarget::hidden(),
        ))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            documents_loaded: AtomicUsize::new(0),
            nodes_indexed: AtomicUsize::new(0),
            bytes_processed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn add_documents(&self, count: usize) {
        self.documents_loaded.fetch_add(count, Ordering::SeqCst);
    }

    pub fn inc_nodes(&self, count: usize) {
        let total = self.nodes_indexed.fetch_add(count, Ordering::SeqCst) + count;
        self.bar.inc(count as u64);
        self.bar.set_message(format!("{} nodes embedded", total));
    }

    pub fn add_bytes_processed(&self, bytes: u64) {
        self.bytes_processed.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_with_message("indexed");
        }
    }

    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            documents_loaded: self.documents_loaded.load(Ordering::SeqCst),
            nodes_indexed: self.nodes_indexed.load(Ordering::SeqCst),
            total_bytes_processed: self.bytes_processed.load(Ordering::SeqCst),
            duration_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn bar_style(colored: bool) -> ProgressStyle {
    let (template, chars) = if colored {
        (
            "{spinner:.green} {prefix:.bold} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            "█▓▒░",
        )
    } else {
        (
            "{spinner} {prefix} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}",
            "=>-",
        )
    };

    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(chars)
}
