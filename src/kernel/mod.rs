//! Kernel data structure decoding
pub mod layout;
pub mod tasks;
pub mod walker;

/// Length of `task_struct.comm`.
pub const TASK_COMM_LEN: usize = 16;

/// Decode a fixed-size C string buffer, stopping at the first NUL.
pub fn decode_cstr(bytes: &[u8]) -> String {
    let nul_pos = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..nul_pos]).to_string()
}

/// Make a task name safe for use in a file name. Anything outside
/// `[0-9A-Za-z]` becomes `_`.
pub fn sanitize_comm(comm: &str) -> String {
    comm.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Name of a `task_struct.state` value. Only exact single-state values are
/// recognised.
pub fn task_state_name(state: u32) -> &'static str {
    match state {
        0 => "TASK_RUNNING",
        1 => "TASK_INTERRUPTIBLE",
        2 => "TASK_UNINTERRUPTIBLE",
        4 => "TASK_STOPPED",
        8 => "TASK_TRACED",
        64 => "TASK_DEAD",
        128 => "TASK_WAKEKILL",
        256 => "TASK_WAKING",
        _ => "??",
    }
}

/// 4 KiB pages to MiB.
pub fn pages_to_mib(pages: u64) -> f64 {
    (pages * 4) as f64 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_cstr() {
        assert_eq!(decode_cstr(b"init\0garbage"), "init");
        assert_eq!(decode_cstr(b"nonul"), "nonul");
        assert_eq!(decode_cstr(b"\0"), "");
    }

    #[test]
    fn test_sanitize_comm() {
        assert_eq!(sanitize_comm("kworker/0:1"), "kworker_0_1");
        assert_eq!(sanitize_comm("swapper"), "swapper");
        assert_eq!(sanitize_comm("a.b-c d"), "a_b_c_d");
    }

    #[test]
    fn test_task_state_names() {
        assert_eq!(task_state_name(0), "TASK_RUNNING");
        assert_eq!(task_state_name(1), "TASK_INTERRUPTIBLE");
        assert_eq!(task_state_name(256), "TASK_WAKING");
        assert_eq!(task_state_name(3), "??");
    }

    #[test]
    fn test_pages_to_mib() {
        assert_eq!(pages_to_mib(256), 1.0);
        assert_eq!(pages_to_mib(128), 0.5);
        assert_eq!(pages_to_mib(0x4_0000), 1024.0);
    }
}
