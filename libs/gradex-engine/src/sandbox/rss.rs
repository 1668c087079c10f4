//! Peak-RSS sampler.
//!
//! Resident set size is not queryable after a process exits, so a sampler
//! polls `/proc` while the child runs and records the maximum observed
//! value. One sampler is paired with each spawned process and is stopped
//! and awaited before the result is finalized; the peak lives in a single
//! `AtomicU64` written by the sampler and read once after join.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};

pub struct RssSampler {
    peak: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl RssSampler {
    /// Start polling the process tree rooted at `pid`.
    pub fn spawn(pid: u32, interval: Duration) -> Self {
        let peak = Arc::new(AtomicU64::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let peak_cell = Arc::clone(&peak);
        let stop_flag = Arc::clone(&stop);
        let handle = tokio::spawn(async move {
            while !stop_flag.load(Ordering::Relaxed) {
                let rss = process_tree_rss(pid);
                if rss == 0 {
                    // Process gone; nothing further to observe.
                    break;
                }
                peak_cell.fetch_max(rss, Ordering::Relaxed);
                tokio::time::sleep(interval).await;
            }
        });

        RssSampler { peak, stop, handle }
    }

    /// Stop the sampler, wait for it, and return the peak RSS in bytes.
    /// A sampler task that panicked or was cancelled surfaces as the
    /// `JoinError` rather than a silently zeroed peak.
    pub async fn stop(self) -> Result<u64, JoinError> {
        self.stop.store(true, Ordering::Relaxed);
        self.handle.await?;
        Ok(self.peak.load(Ordering::Relaxed))
    }
}

/// Sum the RSS of `pid` and all of its descendants, in bytes. Any process
/// that disappears mid-walk contributes zero; the sampler tolerates races
/// with process exit by design.
#[cfg(target_os = "linux")]
fn process_tree_rss(pid: u32) -> u64 {
    let mut total = 0u64;
    let mut stack = vec![pid];
    // Guard against pathological fork chains blowing up the walk.
    let mut visited = 0usize;

    while let Some(pid) = stack.pop() {
        visited += 1;
        if visited > 256 {
            break;
        }
        total += resident_bytes(pid);
        collect_children(pid, &mut stack);
    }
    total
}

#[cfg(not(target_os = "linux"))]
fn process_tree_rss(_pid: u32) -> u64 {
    // No procfs: peak memory reports as zero rather than a wrong number.
    0
}

#[cfg(target_os = "linux")]
fn resident_bytes(pid: u32) -> u64 {
    // /proc/<pid>/statm field 2 is resident pages.
    let statm = match std::fs::read_to_string(format!("/proc/{pid}/statm")) {
        Ok(s) => s,
        Err(_) => return 0,
    };
    let pages: u64 = statm
        .split_whitespace()
        .nth(1)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    pages * page_size()
}

#[cfg(target_os = "linux")]
fn collect_children(pid: u32, stack: &mut Vec<u32>) {
    let task_dir = format!("/proc/{pid}/task");
    let entries = match std::fs::read_dir(&task_dir) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let children_path = entry.path().join("children");
        if let Ok(children) = std::fs::read_to_string(children_path) {
            for child in children.split_whitespace() {
                if let Ok(child_pid) = child.parse() {
                    stack.push(child_pid);
                }
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn page_size() -> u64 {
    // SAFETY: sysconf is async-signal-safe and has no preconditions.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as u64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sampler_observes_own_process() {
        let sampler = RssSampler::spawn(std::process::id(), Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let peak = sampler.stop().await.unwrap();
        // Our own process is certainly resident.
        #[cfg(target_os = "linux")]
        assert!(peak > 0);
        #[cfg(not(target_os = "linux"))]
        assert_eq!(peak, 0);
    }

    #[tokio::test]
    async fn sampler_for_dead_pid_reports_zero() {
        // PID near the default pid_max is almost certainly unused.
        let sampler = RssSampler::spawn(4_194_000, Duration::from_millis(1));
        let peak = sampler.stop().await.unwrap();
        assert_eq!(peak, 0);
    }
}
