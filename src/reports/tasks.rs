//! Tasks report - lists every task and thread, and saves per-task artifacts
use crate::error::AnalysisError;
use crate::kernel::tasks::{TaskRecord, TaskWalker};
use crate::reports::report_trait::{hex, AnalysisContext, KernelReport, ReportTable};
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Directory (under the output dir) holding raw kernel stacks.
pub const KSTACK_DIR: &str = "kstacks_per_task";
/// Directory (under the output dir) holding saved register sets.
pub const CPU_CONTEXT_DIR: &str = "cpu_context_per_task";

const COLUMNS: [&str; 20] = [
    "COMM",
    "TASK_STRUCT",
    "PID",
    "TID",
    "STATE",
    "FLAGS",
    "PRIO",
    "STATIC_PRIO",
    "NORMAL_PRIO",
    "MM_RSS[0]",
    "MM_RSS[1]",
    "MM_RSS[2]",
    "MM_RSS[3]",
    "MIN_FLT",
    "MAJ_FLT",
    "OOM_ADJ",
    "KSTACK_START",
    "KSTACK_END",
    "PREEMPT_COUNT",
    "GROUP_LEADER",
];

pub struct TasksReport;

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "NA".to_string())
}

fn task_row(task: &TaskRecord, leader: Option<u32>) -> Vec<String> {
    let mut row = vec![
        task.comm.clone(),
        hex(task.task_struct),
        task.pid.to_string(),
        task.tid.to_string(),
        task.state.to_string(),
        format!("0x{:x}", task.flags),
        task.prio.to_string(),
        task.static_prio.to_string(),
        task.normal_prio.to_string(),
    ];
    for i in 0..4 {
        row.push(optional(task.rss.map(|rss| rss[i])));
    }
    row.extend([
        task.min_flt.to_string(),
        task.maj_flt.to_string(),
        optional(task.oom_adj),
        hex(task.kstack_start),
        hex(task.kstack_end),
        optional(task.preempt_count),
        leader.map(|pid| pid.to_string()).unwrap_or_else(|| "-".to_string()),
    ]);
    row
}

/// Write the kernel stack and register dump of one task.
fn save_artifacts(dir: &Path, task: &TaskRecord) -> Result<(), AnalysisError> {
    if let Some(stack) = &task.kernel_stack {
        fs::write(dir.join(KSTACK_DIR).join(task.kstack_file_name()), stack)?;
    }
    if let Some(ctx) = &task.cpu_context {
        fs::write(
            dir.join(CPU_CONTEXT_DIR).join(task.cpu_context_file_name()),
            ctx.to_text(),
        )?;
    }
    Ok(())
}

impl KernelReport for TasksReport {
    fn name(&self) -> &str {
        "tasks"
    }

    fn description(&self) -> &str {
        "List tasks and threads from init_task"
    }

    fn run(&self, context: &AnalysisContext) -> Result<ReportTable, AnalysisError> {
        let init_task = context.symbol("init_task")?;

        if let Some(dir) = context.output_dir {
            fs::create_dir_all(dir.join(KSTACK_DIR))?;
            fs::create_dir_all(dir.join(CPU_CONTEXT_DIR))?;
        }

        let tasks = TaskWalker::new(context.walker)
            .capture_stacks(context.output_dir.is_some())
            .walk_tasks(init_task)?;
        info!("found {} tasks", tasks.len());

        let mut table = ReportTable::new("Tasks", &COLUMNS);
        let mut threads = 0usize;
        for task in &tasks {
            table.push_row(task_row(task, None));
            for thread in &task.threads {
                table.push_row(task_row(thread, Some(task.pid)));
                threads += 1;
            }

            if let Some(dir) = context.output_dir {
                for record in std::iter::once(task).chain(task.threads.iter()) {
                    if let Err(e) = save_artifacts(dir, record) {
                        warn!("failed to save artifacts of {} ({}): {}", record.comm, record.pid, e);
                    }
                }
            }
        }

        table.note(format!("{} tasks, {} additional threads", tasks.len(), threads));
        Ok(table)
    }
}
