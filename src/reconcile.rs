use crate::{
    config::MemoryMode,
    process::{ProcessStat, ProcessStats},
    session::SessionRecord,
};

/// Placeholder shown for a session with no matching local process.
pub const SENTINEL: f32 = -99.0;

/// One session joined with whatever the process table knows about it.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub kernel_id: String,
    pub display_name: String,
    pub stat: Option<ProcessStat>,
}

impl Row {
    /// CPU column text; multi-core kernels are capped at 100.
    pub fn cpu_cell(&self) -> String {
        match &self.stat {
            None => format_sentinel(),
            Some(s) => {
                let rounded = (s.cpu_percent * 10.0).round() / 10.0;
                if rounded >= 100.0 {
                    "100".to_string()
                } else {
                    format!("{rounded:.1}")
                }
            }
        }
    }

    pub fn memory_cell(&self, mode: MemoryMode) -> String {
        match (&self.stat, mode) {
            (None, _) => format_sentinel(),
            (Some(s), MemoryMode::Percent) => format!("{:.1}", s.mem_percent),
            (Some(s), MemoryMode::Absolute) => human_bytes(s.mem_bytes),
        }
    }
}

fn format_sentinel() -> String {
    format!("{SENTINEL:.0}")
}

/// Left-joins sessions against sampled processes.
///
/// The server decides membership: one row per session, in the order the
/// server listed them, whether or not a local process was found.
pub fn reconcile(stats: &ProcessStats, sessions: Vec<SessionRecord>) -> Vec<Row> {
    sessions
        .into_iter()
        .map(|session| Row {
            stat: stats.get(&session.kernel_id).cloned(),
            kernel_id: session.kernel_id,
            display_name: session.display_name,
        })
        .collect()
}

pub fn human_bytes(b: u64) -> String {
    let kib = 1024.0;
    let mib = kib * 1024.0;
    let gib = mib * 1024.0;
    let bf = b as f64;
    if bf >= gib {
        format!("{:.1}G", bf / gib)
    } else if bf >= mib {
        format!("{:.0}M", bf / mib)
    } else if bf >= kib {
        format!("{:.0}K", bf / kib)
    } else {
        format!("{}B", b)
    }
}
