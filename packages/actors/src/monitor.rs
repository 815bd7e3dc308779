//! Process resource sampling for the scaling check.

use std::sync::Mutex;
use std::time::Instant;

use futures_util::future::BoxFuture;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("CPU sample unavailable: {0}")]
    Unavailable(String),
}

/// Source of the utilization figure the pool scales on.
pub trait ResourceMonitor: Send + Sync + 'static {
    /// CPU utilization of this process as a fraction of one core, in `[0, 1]`.
    fn sample(&self) -> BoxFuture<'_, Result<f64, MonitorError>>;

    /// Start a fresh measurement interval. Called when the pool starts.
    fn reset(&self) {}
}

/// [`ResourceMonitor`] reading this process's accumulated CPU time through sysinfo.
///
/// A sample is the CPU time consumed since the previous sample (or the last
/// [`ResourceMonitor::reset`]) divided by the wall-clock time in between.
pub struct ProcessMonitor {
    pid: Pid,
    inner: Mutex<Sampler>,
}

struct Sampler {
    system: System,
    cpu_ms: u64,
    at: Instant,
}

impl Sampler {
    fn cpu_time_ms(&mut self, pid: Pid) -> Result<u64, MonitorError> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
        self.system
            .process(pid)
            .map(|p| p.accumulated_cpu_time())
            .ok_or_else(|| MonitorError::Unavailable(format!("process {} not found", pid)))
    }

    fn rebase(&mut self, pid: Pid) -> Result<(), MonitorError> {
        self.cpu_ms = self.cpu_time_ms(pid)?;
        self.at = Instant::now();
        Ok(())
    }
}

impl ProcessMonitor {
    pub fn new() -> Result<Self, MonitorError> {
        let pid = sysinfo::get_current_pid().map_err(|e| MonitorError::Unavailable(e.to_string()))?;
        let mut sampler = Sampler {
            system: System::new_with_specifics(
                RefreshKind::nothing().with_processes(ProcessRefreshKind::nothing().with_cpu()),
            ),
            cpu_ms: 0,
            at: Instant::now(),
        };
        sampler.rebase(pid)?;

        Ok(Self {
            pid,
            inner: Mutex::new(sampler),
        })
    }

    fn sample_now(&self) -> Result<f64, MonitorError> {
        let mut sampler = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let cpu_ms = sampler.cpu_time_ms(self.pid)?;
        let now = Instant::now();

        let wall_ms = now.duration_since(sampler.at).as_secs_f64() * 1000.0;
        let used_ms = cpu_ms.saturating_sub(sampler.cpu_ms) as f64;
        sampler.cpu_ms = cpu_ms;
        sampler.at = now;

        if wall_ms <= 0.0 {
            return Ok(0.0);
        }
        let usage = used_ms / wall_ms;
        if !usage.is_finite() {
            return Err(MonitorError::Unavailable(format!("invalid reading {}", usage)));
        }
        Ok(usage.clamp(0.0, 1.0))
    }
}

impl ResourceMonitor for ProcessMonitor {
    fn sample(&self) -> BoxFuture<'_, Result<f64, MonitorError>> {
        let result = self.sample_now();
        Box::pin(async move { result })
    }

    fn reset(&self) {
        let mut sampler = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = sampler.rebase(self.pid) {
            tracing::warn!("Failed to reset CPU baseline: {}", e);
        }
    }
}

/// Name of this host, used in task processor ids.
pub(crate) fn host_name() -> String {
    System::host_name()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    // Process CPU time is shared by every test thread.
    static SERIAL: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

    fn spin(duration: Duration) {
        let started = Instant::now();
        let mut acc: u64 = 0;
        while started.elapsed() < duration {
            acc = std::hint::black_box(acc.wrapping_mul(31).wrapping_add(7));
        }
    }

    #[tokio::test]
    async fn busy_process_reads_high() {
        let _serial = SERIAL.lock().await;
        let monitor = ProcessMonitor::new().unwrap();
        spin(Duration::from_millis(300));
        let value = monitor.sample().await.unwrap();
        assert!(value > 0.5, "sample after spinning was {}", value);
        assert!(value <= 1.0);
    }

    #[tokio::test]
    async fn idle_process_reads_low() {
        let _serial = SERIAL.lock().await;
        let monitor = ProcessMonitor::new().unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let value = monitor.sample().await.unwrap();
        assert!(value < 0.5, "sample after sleeping was {}", value);
    }

    #[tokio::test]
    async fn reset_discards_earlier_load() {
        let _serial = SERIAL.lock().await;
        let monitor = ProcessMonitor::new().unwrap();
        spin(Duration::from_millis(300));
        monitor.reset();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(monitor.sample().await.unwrap() < 0.5);
    }

    #[test]
    fn host_name_is_never_empty() {
        assert!(!host_name().is_empty());
    }
}
