//! Parsing of `/proc/<pid>/stat` and `/proc/stat`.
//!
//! Only the fields needed for group metrics are extracted. Tick and page
//! conversions use the platform values detected at startup.

use once_cell::sync::Lazy;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        let tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if tck > 0 {
            return tck as u64;
        }
    }
    DEFAULT_CLK_TCK
}

/// Get memory page size in bytes (used to convert the rss page count).
fn get_page_size() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_PAGESIZE
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            return size as u64;
        }
    }
    4096
}

/// Conventional USER_HZ on Linux.
pub const DEFAULT_CLK_TCK: u64 = 100;

/// System clock ticks per second (for CPU and start time calculation).
pub static CLK_TCK: Lazy<u64> = Lazy::new(get_clk_tck);

/// Memory page size in bytes.
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

/// Fields of `/proc/<pid>/stat` used for aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcStat {
    /// Command name (field 2, without parentheses).
    pub comm: String,
    /// User mode time in clock ticks (field 14).
    pub utime: u64,
    /// Kernel mode time in clock ticks (field 15).
    pub stime: u64,
    /// Number of threads (field 20).
    pub num_threads: u64,
    /// Start time after boot in clock ticks (field 22).
    pub starttime: u64,
    /// Virtual memory size in bytes (field 23).
    pub vsize: u64,
    /// Resident set size in pages (field 24).
    pub rss_pages: u64,
}

impl ProcStat {
    pub fn resident_bytes(&self) -> u64 {
        self.rss_pages.saturating_mul(*PAGE_SIZE)
    }

    pub fn virtual_bytes(&self) -> u64 {
        self.vsize
    }
}

/// Parses the content of `/proc/<pid>/stat`.
///
/// The command name may contain spaces and parentheses, so it spans from the
/// first `(` to the last `)`.
pub fn parse_stat(content: &str) -> Result<ProcStat, String> {
    let open = content.find('(').ok_or("missing '(' before comm")?;
    let close = content.rfind(')').ok_or("missing ')' after comm")?;
    if close < open {
        return Err("malformed comm field".into());
    }
    let comm = content[open + 1..close].to_string();

    // Index 0 is field 3 (state).
    let rest: Vec<&str> = content[close + 1..].split_whitespace().collect();
    if rest.len() < 22 {
        return Err(format!(
            "expected at least 24 fields, got {}",
            rest.len() + 2
        ));
    }

    let field = |idx: usize, name: &str| -> Result<u64, String> {
        rest[idx]
            .parse::<u64>()
            .map_err(|e| format!("invalid {} {:?}: {}", name, rest[idx], e))
    };

    Ok(ProcStat {
        comm,
        utime: field(11, "utime")?,
        stime: field(12, "stime")?,
        // num_threads is signed in the kernel but never negative
        num_threads: rest[17].parse::<i64>().map(|n| n.max(0) as u64).map_err(|e| {
            format!("invalid num_threads {:?}: {}", rest[17], e)
        })?,
        starttime: field(19, "starttime")?,
        vsize: field(20, "vsize")?,
        rss_pages: rest[21].parse::<i64>().map(|n| n.max(0) as u64).map_err(|e| {
            format!("invalid rss {:?}: {}", rest[21], e)
        })?,
    })
}

/// Reads the `btime` line (boot time, seconds since epoch) from `/proc/stat`.
pub fn parse_boot_time(content: &str) -> Result<u64, String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("btime "))
        .ok_or_else(|| "no btime line".to_string())?
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid btime: {}", e))
}
