//! IRQ report - walks the static irq_desc array
use crate::error::{AnalysisError, WalkError};
use crate::kernel::walker::{AddressSpace, StructWalker};
use crate::reports::report_trait::{hex, AnalysisContext, KernelReport, ReportTable};
use log::{debug, warn};

/// Bytes read for chip and action names.
const IRQ_NAME_LEN: usize = 14;

/// `irq_data` state bits, printed under the table.
const STATE_BITS: [(&str, &str); 11] = [
    ("IRQD_TRIGGER_MASK", "0xf"),
    ("IRQD_SETAFFINITY_PENDING", "(1 <<  8)"),
    ("IRQD_NO_BALANCING", "(1 << 10)"),
    ("IRQD_PER_CPU", "(1 << 11)"),
    ("IRQD_AFFINITY_SET", "(1 << 12)"),
    ("IRQD_LEVEL", "(1 << 13)"),
    ("IRQD_WAKEUP_STATE", "(1 << 14)"),
    ("IRQD_MOVE_PCNTXT", "(1 << 15)"),
    ("IRQD_IRQ_DISABLED", "(1 << 16)"),
    ("IRQD_IRQ_MASKED", "(1 << 17)"),
    ("IRQD_IRQ_INPROGRESS", "(1 << 18)"),
];

pub struct IrqReport;

/// Name of the first `irqaction`. Actions are usually allocated, so fall back
/// to a table walk when `__pa()` lands outside the dump.
fn action_name(walker: &StructWalker, name_ptr: u32) -> Result<String, WalkError> {
    let linear = walker.to_physical(name_ptr, AddressSpace::Linear)?;
    let space = if walker.dump().contains(linear) {
        AddressSpace::Linear
    } else {
        debug!("irq action name 0x{:08x} is not identity mapped", name_ptr);
        AddressSpace::Paged
    };
    walker.read_cstring(name_ptr, IRQ_NAME_LEN, space)
}

fn irq_row(walker: &StructWalker, desc: u32) -> Result<Vec<String>, WalkError> {
    let schema = walker.schema("irq_desc")?;
    let irq = walker.read_field(desc, schema, "irq")?;
    let kstat = walker.read_field(desc, schema, "kstat_irqs")?;
    let count = walker.read_u32(kstat, AddressSpace::Linear)?;
    let state = walker.read_field(desc, schema, "state_use_accessors")?;

    let chip = walker.read_field(desc, schema, "chip")?;
    let chip_name_ptr = walker.field(chip, "irq_chip", "name")?;
    let chip_name = walker.read_cstring(chip_name_ptr, IRQ_NAME_LEN, AddressSpace::Linear)?;

    let action = walker.read_field(desc, schema, "action")?;
    let (handler, name) = if action == 0 {
        ("NA".to_string(), "NA".to_string())
    } else {
        let handler = walker.field(action, "irqaction", "handler")?;
        let name_ptr = walker.field(action, "irqaction", "name")?;
        (hex(handler), action_name(walker, name_ptr)?)
    };

    Ok(vec![
        irq.to_string(),
        count.to_string(),
        format!("0x{:x}", state),
        chip_name,
        handler,
        name,
    ])
}

impl KernelReport for IrqReport {
    fn name(&self) -> &str {
        "irq"
    }

    fn description(&self) -> &str {
        "Decode irq_desc entries: counts, state, chip and handler"
    }

    fn run(&self, context: &AnalysisContext) -> Result<ReportTable, AnalysisError> {
        let base = context.symbol("irq_desc")?;
        let stride = context.profile.offsets.size("irq_desc")?;

        let mut table = ReportTable::new(
            "IRQ descriptors",
            &["IRQ_NUMBER", "KSTAT_IRQS", "STATE_USE_ACCESSORS", "CHIP_NAME", "HANDLER", "DEV_NAME"],
        );
        for index in 0..context.profile.nr_irqs {
            let desc = match context.walker.element_addr(base, index, stride) {
                Ok(desc) => desc,
                Err(e) => {
                    // Every later index overflows as well.
                    warn!("irq_desc[{}]: {}", index, e);
                    break;
                }
            };
            match irq_row(context.walker, desc) {
                Ok(row) => table.push_row(row),
                Err(e) => warn!("failed to decode irq_desc[{}] at 0x{:08x}: {}", index, desc, e),
            }
        }

        table.note("Bit masks for state_use_accessors");
        for (name, mask) in STATE_BITS {
            table.note(format!("{:<32}= {}", name, mask));
        }
        Ok(table)
    }
}
