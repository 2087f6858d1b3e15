use std::collections::HashMap;

use sysinfo::{MemoryRefreshKind, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

/// Instantaneous resource usage of one kernel worker.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessStat {
    pub kernel_id: String,
    pub cpu_percent: f32,
    pub mem_percent: f32,
    pub mem_bytes: u64,
    /// Seconds since the unix epoch.
    pub started_at: u64,
}

pub type ProcessStats = HashMap<String, ProcessStat>;

pub trait ProcessSampler {
    /// Samples every kernel worker visible to this host, keyed by kernel id.
    fn sample(&mut self) -> ProcessStats;
}

/// `ProcessSampler` backed by the OS process table.
pub struct SystemSampler {
    system: System,
}

impl SystemSampler {
    pub fn new() -> Self {
        let mut sampler = Self {
            system: System::new(),
        };
        // First cpu reading is always zero; prime it so the first tick has data.
        sampler.refresh();
        sampler
    }

    fn refresh(&mut self) {
        self.system
            .refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_cpu()
                .with_memory()
                .with_cmd(UpdateKind::OnlyIfNotSet)
                .without_tasks(),
        );
    }
}

impl ProcessSampler for SystemSampler {
    fn sample(&mut self) -> ProcessStats {
        self.refresh();
        let total_mem = self.system.total_memory().max(1) as f64;
        let mut stats = ProcessStats::new();
        for process in self.system.processes().values() {
            let args = process.cmd().iter().map(|arg| arg.to_string_lossy());
            let Some(kernel_id) = kernel_id_from_args(args) else {
                continue;
            };
            let stat = ProcessStat {
                kernel_id,
                cpu_percent: process.cpu_usage(),
                mem_percent: (process.memory() as f64 / total_mem * 100.0) as f32,
                mem_bytes: process.memory(),
                started_at: process.start_time(),
            };
            insert_newest(&mut stats, stat);
        }
        tracing::trace!(kernels = stats.len(), "sampled kernel processes");
        stats
    }
}

/// Keeps the most recently started process when two claim one kernel id
/// (e.g. a launcher wrapper and the kernel it spawned).
fn insert_newest(stats: &mut ProcessStats, stat: ProcessStat) {
    match stats.get(&stat.kernel_id) {
        Some(existing) if existing.started_at > stat.started_at => {}
        _ => {
            stats.insert(stat.kernel_id.clone(), stat);
        }
    }
}

/// Extracts the kernel id from a worker's command line.
///
/// Kernel workers are launched with their connection file, e.g.
/// `-f /run/user/1000/jupyter/kernel-<id>.json`.
pub fn kernel_id_from_args<I, S>(args: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().find_map(|arg| {
        let arg = arg.as_ref();
        if !(arg.ends_with(".json") && arg.contains("/kernel-")) {
            return None;
        }
        let file = arg.rsplit('/').next()?;
        let id = file.strip_prefix("kernel-")?.strip_suffix(".json")?;
        (!id.is_empty()).then(|| id.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(id: &str, started_at: u64, cpu: f32) -> ProcessStat {
        ProcessStat {
            kernel_id: id.to_string(),
            cpu_percent: cpu,
            mem_percent: 1.0,
            mem_bytes: 1024,
            started_at,
        }
    }

    #[test]
    fn extracts_id_from_connection_file() {
        let args = [
            "/usr/bin/python3",
            "-m",
            "ipykernel_launcher",
            "-f",
            "/home/me/.local/share/jupyter/runtime/kernel-5f2c9a1e-77aa-4bb1-9a0e-0c1d2e3f4a5b.json",
        ];
        assert_eq!(
            kernel_id_from_args(args).as_deref(),
            Some("5f2c9a1e-77aa-4bb1-9a0e-0c1d2e3f4a5b")
        );
    }

    #[test]
    fn extracts_id_from_inline_flag() {
        let args = ["python", "--f=/tmp/jupyter/kernel-abc.json"];
        assert_eq!(kernel_id_from_args(args).as_deref(), Some("abc"));
    }

    #[test]
    fn ignores_unrelated_processes() {
        assert_eq!(kernel_id_from_args(["bash", "-l"]), None);
        assert_eq!(kernel_id_from_args(["node", "/srv/package.json"]), None);
        assert_eq!(kernel_id_from_args(["python", "kernel-abc.json"]), None);
        assert_eq!(kernel_id_from_args(["python", "/tmp/kernel-.json"]), None);
        assert_eq!(kernel_id_from_args(Vec::<String>::new()), None);
    }

    #[test]
    fn newest_process_wins_a_shared_id() {
        let mut stats = ProcessStats::new();
        insert_newest(&mut stats, stat("k", 200, 5.0));
        insert_newest(&mut stats, stat("k", 100, 50.0));
        assert_eq!(stats["k"].cpu_percent, 5.0);

        insert_newest(&mut stats, stat("k", 300, 7.0));
        assert_eq!(stats["k"].cpu_percent, 7.0);
        assert_eq!(stats.len(), 1);
    }
}
