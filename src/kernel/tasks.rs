//! Process enumeration from `init_task`
use crate::error::WalkError;
use crate::kernel::walker::{AddressSpace, StructWalker, Visit};
use crate::kernel::{sanitize_comm, task_state_name, TASK_COMM_LEN};
use log::{debug, warn};
use serde::Serialize;

/// Size of a kernel stack (and of the `thread_info` at its base).
pub const KSTACK_SIZE: u32 = 8192;

const CPU_CONTEXT_REGS: [&str; 10] = ["r4", "r5", "r6", "r7", "r8", "r9", "sl", "fp", "sp", "pc"];
const SP_INDEX: usize = 8;

/// Registers saved in `thread_info.cpu_context` at the last switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpuContext {
    pub regs: [u32; 10],
    /// Word at the saved stack pointer, when readable.
    pub sp_deref: Option<u32>,
}

impl CpuContext {
    /// Name/value pairs in dump order, with `*sp` following `sp`.
    pub fn lines(&self) -> Vec<(&'static str, Option<u32>)> {
        let mut lines = Vec::with_capacity(11);
        for (i, name) in CPU_CONTEXT_REGS.iter().enumerate() {
            lines.push((*name, Some(self.regs[i])));
            if i == SP_INDEX {
                lines.push(("*sp", self.sp_deref));
            }
        }
        lines
    }

    pub fn to_text(&self) -> String {
        self.lines()
            .into_iter()
            .map(|(name, value)| match value {
                Some(v) => format!("{}\t\t0x{:x}\n", name, v),
                None => format!("{}\t\tN/A\n", name),
            })
            .collect()
    }
}

/// One decoded `task_struct`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task_struct: u32,
    pub comm: String,
    pub pid: u32,
    pub tid: u32,
    pub state: &'static str,
    pub flags: u32,
    pub prio: u32,
    pub static_prio: u32,
    pub normal_prio: u32,
    /// `mm->rss_stat` counters; kernel threads have no `mm`.
    pub rss: Option<[u32; 4]>,
    pub min_flt: u32,
    pub maj_flt: u32,
    pub oom_adj: Option<i32>,
    pub kstack_start: u32,
    pub kstack_end: u32,
    pub preempt_count: Option<u32>,
    pub cpu_context: Option<CpuContext>,
    #[serde(skip)]
    pub kernel_stack: Option<Vec<u8>>,
    /// Other members of this task's thread group.
    pub threads: Vec<TaskRecord>,
}

impl TaskRecord {
    fn file_stem(&self) -> String {
        format!("{}_{}_{}", self.pid, self.tid, sanitize_comm(&self.comm))
    }

    pub fn kstack_file_name(&self) -> String {
        format!("kstack_{}.bin", self.file_stem())
    }

    pub fn cpu_context_file_name(&self) -> String {
        format!("cpu_context_{}.txt", self.file_stem())
    }
}

/// Walks the task list and thread groups.
pub struct TaskWalker<'a> {
    walker: &'a StructWalker<'a>,
    capture_stacks: bool,
}

impl<'a> TaskWalker<'a> {
    pub fn new(walker: &'a StructWalker<'a>) -> Self {
        TaskWalker {
            walker,
            capture_stacks: false,
        }
    }

    /// Keep a copy of every 8 KiB kernel stack.
    pub fn capture_stacks(mut self, capture: bool) -> Self {
        self.capture_stacks = capture;
        self
    }

    /// Decode a single task at virtual address `task`.
    pub fn extract_task(&self, task: u32) -> Result<TaskRecord, WalkError> {
        let w = self.walker;
        let schema = w.schema("task_struct")?;
        let field = |name: &str| w.read_field(task, schema, name);

        let comm_addr = task.wrapping_add(schema.offset("comm")?);
        let comm = w.read_cstring(comm_addr, TASK_COMM_LEN, AddressSpace::Linear)?;
        let pid = field("pid")?;
        let tid = field("tid")?;
        let state = task_state_name(field("state")?);
        debug!("task 0x{:08x}: {} pid {} tid {}", task, comm, pid, tid);

        let mm = field("mm")?;
        let rss = if mm != 0 {
            match self.read_rss(mm) {
                Ok(rss) => Some(rss),
                Err(e) => {
                    warn!("failed to read rss_stat of {} ({}): {}", comm, pid, e);
                    None
                }
            }
        } else {
            None
        };

        let signal = field("signal")?;
        let oom_adj = if signal != 0 {
            let addr = signal.wrapping_add(w.offsets().offset("signal_struct", "oom_adj")?);
            w.read_i32(addr, AddressSpace::Linear).ok()
        } else {
            None
        };

        let kstack_start = field("stack")?;
        let preempt_count = w.field(kstack_start, "thread_info", "preempt_count").ok();
        let cpu_context = match self.read_cpu_context(kstack_start) {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                warn!("failed to read cpu_context of {} ({}): {}", comm, pid, e);
                None
            }
        };
        let kernel_stack = if self.capture_stacks {
            match w.read_bytes(kstack_start, KSTACK_SIZE as usize, AddressSpace::Linear) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("failed to read kernel stack of {} ({}): {}", comm, pid, e);
                    None
                }
            }
        } else {
            None
        };

        Ok(TaskRecord {
            task_struct: task,
            comm,
            pid,
            tid,
            state,
            flags: field("flags")?,
            prio: field("prio")?,
            static_prio: field("static_prio")?,
            normal_prio: field("normal_prio")?,
            rss,
            min_flt: field("min_flt")?,
            maj_flt: field("maj_flt")?,
            oom_adj,
            kstack_start,
            kstack_end: kstack_start.wrapping_add(KSTACK_SIZE),
            preempt_count,
            cpu_context,
            kernel_stack,
            threads: Vec::new(),
        })
    }

    fn read_rss(&self, mm: u32) -> Result<[u32; 4], WalkError> {
        let base = self.walker.field_addr(mm, "mm_struct", "rss_stat")?;
        let mut rss = [0u32; 4];
        for (i, slot) in rss.iter_mut().enumerate() {
            *slot = self
                .walker
                .read_u32(base.wrapping_add(4 * i as u32), AddressSpace::Linear)?;
        }
        Ok(rss)
    }

    fn read_cpu_context(&self, kstack_start: u32) -> Result<CpuContext, WalkError> {
        let base = self.walker.field_addr(kstack_start, "thread_info", "cpu_context")?;
        let mut regs = [0u32; 10];
        for (i, slot) in regs.iter_mut().enumerate() {
            *slot = self
                .walker
                .read_u32(base.wrapping_add(4 * i as u32), AddressSpace::Linear)?;
        }
        let sp_deref = self.walker.read_u32(regs[SP_INDEX], AddressSpace::Linear).ok();
        Ok(CpuContext { regs, sp_deref })
    }

    /// Members of `leader`'s thread group other than the leader itself.
    pub fn thread_group(&self, leader: u32) -> Result<Vec<TaskRecord>, WalkError> {
        let link = self.walker.offsets().offset("task_struct", "thread_group")?;
        let next = self.walker.field(leader, "task_struct", "thread_group")?;
        let first = next.wrapping_sub(link);
        if first == leader {
            return Ok(Vec::new());
        }

        let mut threads = Vec::new();
        self.walker
            .walk_circular_list(first, link, AddressSpace::Linear, |thread| {
                if thread != leader {
                    match self.extract_task(thread) {
                        Ok(record) => threads.push(record),
                        Err(e) => warn!("failed to decode thread 0x{:08x}: {}", thread, e),
                    }
                }
                Ok(Visit::Continue)
            })?;
        Ok(threads)
    }

    /// Every task on the list headed by `init_task`, with its threads.
    pub fn walk_tasks(&self, init_task: u32) -> Result<Vec<TaskRecord>, WalkError> {
        let link = self.walker.offsets().offset("task_struct", "tasks")?;
        let mut records = Vec::new();

        self.walker
            .walk_circular_list(init_task, link, AddressSpace::Linear, |task| {
                let mut record = match self.extract_task(task) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!("failed to decode task 0x{:08x}, but continuing: {}", task, e);
                        return Ok(Visit::Continue);
                    }
                };
                match self.thread_group(task) {
                    Ok(threads) => record.threads = threads,
                    Err(e) => warn!("failed to walk thread group of {}: {}", record.pid, e),
                }
                records.push(record);
                Ok(Visit::Continue)
            })?;

        Ok(records)
    }
}
