use anyhow::{Context, Result};
use humansize::{format_size, BINARY};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct DiskInfo {
    pub name: String,
    pub path: String,
    pub device_type: &'static str,
    pub size_bytes: u64,
}

impl DiskInfo {
    pub fn human_size(&self) -> String {
        format_size(self.size_bytes, BINARY)
    }

    pub fn display(&self) -> String {
        format!(
            "{} ({}) - {}",
            self.path,
            self.device_type,
            self.human_size()
        )
    }
}

/// Lists whole disks from `/sys/block`, skipping virtual and empty devices.
pub fn discover_disks() -> Result<Vec<DiskInfo>> {
    discover_disks_in(Path::new("/sys/block"))
}

fn discover_disks_in(sys_block: &Path) -> Result<Vec<DiskInfo>> {
    if !sys_block.exists() {
        anyhow::bail!("{} not found - are you running on Linux?", sys_block.display());
    }

    let mut disks = Vec::new();

    let entries = fs::read_dir(sys_block)
        .with_context(|| format!("Failed to read {}", sys_block.display()))?;

    for entry in entries {
        let entry = entry.context("Failed to read directory entry")?;
        let name = entry.file_name().to_string_lossy().to_string();

        if is_virtual_device(&name) {
            continue;
        }

        let sys_device_path = entry.path();
        let size_bytes = read_device_size(&sys_device_path).unwrap_or(0);
        if size_bytes == 0 {
            continue;
        }

        let device_type = detect_device_type(&name, &sys_device_path);

        disks.push(DiskInfo {
            path: format!("/dev/{}", name),
            name,
            device_type,
            size_bytes,
        });
    }

    disks.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(disks)
}

fn is_virtual_device(name: &str) -> bool {
    name.starts_with("loop")
        || name.starts_with("ram")
        || name.starts_with("dm-")
        || name.starts_with("zram")
        || name.starts_with("nbd")
}

/// `/sys/block/*/size` counts 512-byte sectors regardless of the device's
/// logical block size.
fn read_device_size(sys_path: &Path) -> Result<u64> {
    let size_path = sys_path.join("size");
    let size_str = fs::read_to_string(&size_path)
        .with_context(|| format!("Failed to read {}", size_path.display()))?;

    let sectors: u64 = size_str
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse size from {}", size_path.display()))?;

    Ok(sectors * 512)
}

fn detect_device_type(name: &str, sys_path: &Path) -> &'static str {
    if name.starts_with("nvme") {
        return "NVMe";
    }
    if name.starts_with("mmcblk") {
        return "SD/MMC";
    }

    let removable = fs::read_to_string(sys_path.join("removable")).unwrap_or_default();
    if removable.trim() == "1" {
        return "USB/Removable";
    }

    match fs::read_to_string(sys_path.join("queue/rotational"))
        .unwrap_or_default()
        .trim()
    {
        "0" => "SSD",
        "1" => "HDD",
        _ => "Unknown",
    }
}

/// Rewrites a Windows drive letter into its raw volume path.
///
/// `C:`, `C:\` and `c:/` all become `\\.\C:`. Paths already in the
/// `\\.\` namespace (`\\.\PhysicalDrive0`) and anything else are returned
/// unchanged.
pub fn raw_device_path(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with(r"\\.\") {
        return trimmed.to_string();
    }

    let drive = trimmed.trim_end_matches(['\\', '/']);
    match drive.as_bytes() {
        [letter, b':'] if letter.is_ascii_alphabetic() => {
            format!(r"\\.\{}:", letter.to_ascii_uppercase() as char)
        }
        _ => trimmed.to_string(),
    }
}
