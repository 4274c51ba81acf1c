//! Address-space arithmetic shared by every symbolization path

/// Default start of kernel space for 32-bit guests with a 2G/2G split
pub const DEFAULT_KERNEL_START: u64 = 0x8000_0000;

/// Translate a runtime address into the binary's link-time address space
///
/// `pc - load_base + image_base`, wrapping. No bounds check is made: a pc
/// below `load_base` yields a meaningless address that the debug-info lookup
/// then fails to resolve.
#[must_use]
pub fn relative_address(pc: u64, load_base: u64, image_base: u64) -> u64 {
    pc.wrapping_sub(load_base).wrapping_add(image_base)
}

/// Collapse every kernel-space pc onto the shared kernel owner (pid 0)
///
/// User-space addresses keep their process id.
#[must_use]
pub fn classify_pid(pid: u64, pc: u64, kernel_start: u64) -> u64 {
    if pc >= kernel_start {
        0
    } else {
        pid
    }
}
