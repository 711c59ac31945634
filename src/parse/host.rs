//! nPar capacity reports: `vparstatus -A` and `vgdisplay`.

use serde::Serialize;

use crate::{AppError, Result};

/// Free CPU and memory reported by `vparstatus -A`.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CpuMemoryFree {
    /// `[Available CPUs]`.
    pub cpus_free: u32,
    /// `[Available Memory]` in MB.
    pub mem_free: u64,
}

/// Volume group capacity in GB derived from `vgdisplay`.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct DiskUsage {
    /// `PE Size * Total PE / 1024`.
    pub total_gb: u64,
    /// `PE Size * Alloc PE / 1024`.
    pub used_gb: u64,
    /// `total_gb - used_gb`.
    pub free_gb: u64,
}

/// Parse `[Available CPUs]: N` and `[Available Memory]: N Mbytes`.
///
/// Absent labels leave the field at zero, so a node that reports nothing
/// free never attracts placements.
///
/// # Errors
///
/// Returns `AppError::RemoteCommand` if a label is present but its value
/// is not an integer.
pub fn parse_cpu_memory_free(text: &str) -> Result<CpuMemoryFree> {
    let mut info = CpuMemoryFree::default();
    for line in text.lines() {
        if line.contains("Available CPUs") {
            // '[Available CPUs]:  5\r'
            let value = label_value(line).unwrap_or_default();
            info.cpus_free = parse_number(value, "Available CPUs")?;
        } else if line.contains("Available Memory") {
            // '[Available Memory]:  55936 Mbytes\r'
            let value = label_value(line)
                .and_then(|v| v.split_whitespace().next())
                .unwrap_or_default();
            info.mem_free = parse_number(value, "Available Memory")?;
        }
    }
    Ok(info)
}

/// Parse the `PE Size (Mbytes)`, `Total PE` and `Alloc PE` lines of a
/// volume group report.
///
/// # Errors
///
/// Returns `AppError::RemoteCommand` if any of the three lines is missing
/// or its value column is not an integer.
pub fn parse_volume_group(text: &str) -> Result<DiskUsage> {
    let mut pe_size: Option<u64> = None;
    let mut total_pe: Option<u64> = None;
    let mut alloc_pe: Option<u64> = None;

    for line in text.lines() {
        if line.contains("PE Size (Mbytes)") {
            // 'PE Size (Mbytes)            64'
            pe_size = Some(column(line, 3, "PE Size (Mbytes)")?);
        } else if line.contains("Total PE") {
            total_pe = Some(column(line, 2, "Total PE")?);
        } else if line.contains("Alloc PE") {
            alloc_pe = Some(column(line, 2, "Alloc PE")?);
        }
    }

    let missing = |label: &str| AppError::RemoteCommand(format!("volume group report has no '{label}'"));
    let pe_size = pe_size.ok_or_else(|| missing("PE Size (Mbytes)"))?;
    let total_pe = total_pe.ok_or_else(|| missing("Total PE"))?;
    let alloc_pe = alloc_pe.ok_or_else(|| missing("Alloc PE"))?;

    let total_gb = pe_size * total_pe / 1024;
    let used_gb = pe_size * alloc_pe / 1024;
    Ok(DiskUsage {
        total_gb,
        used_gb,
        free_gb: total_gb.saturating_sub(used_gb),
    })
}

/// Field between the first and second `:` of a `label: value` line,
/// trimmed.
pub(crate) fn label_value(line: &str) -> Option<&str> {
    line.split(':').nth(1).map(str::trim)
}

pub(crate) fn parse_number<T: std::str::FromStr>(value: &str, label: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        AppError::RemoteCommand(format!("'{label}' has non-numeric value '{}'", value.trim()))
    })
}

fn column(line: &str, index: usize, label: &str) -> Result<u64> {
    let value = line.split_whitespace().nth(index).ok_or_else(|| {
        AppError::RemoteCommand(format!("'{label}' line has no value column"))
    })?;
    parse_number(value, label)
}
