//! Vendor CLI command lines.
//!
//! Every string sent to an nPar or to the provisioning server is built
//! here, so callers never format shell text themselves.

use crate::config::{IgniteConfig, NparConfig};

/// `vparstatus` binary.
const VPARSTATUS: &str = "/opt/hpvm/bin/vparstatus";

/// Free CPU and memory report.
#[must_use]
pub fn available_resources() -> String {
    format!("{VPARSTATUS} -A")
}

/// Volume group report.
#[must_use]
pub fn volume_group_report(vg_name: &str) -> String {
    format!("vgdisplay {vg_name}")
}

/// Provisioning-service client inventory.
#[must_use]
pub fn client_inventory() -> String {
    "/opt/ignite/bin/ignite client list -m xml -l details".into()
}

/// Summary status of every partition on a node.
#[must_use]
pub fn partition_summary() -> String {
    VPARSTATUS.into()
}

/// Detailed status of one partition.
#[must_use]
pub fn partition_detail(name: &str) -> String {
    format!("{VPARSTATUS} -p {name} -v")
}

/// Name of the logical volume backing `workload_id`.
#[must_use]
pub fn volume_name(workload_id: &str) -> String {
    format!("lv-{workload_id}")
}

/// Block device path of the logical volume.
#[must_use]
pub fn volume_path(vg_name: &str, workload_id: &str) -> String {
    format!("{vg_name}/{}", volume_name(workload_id))
}

/// Raw (character) device path reported by `lvcreate` and attached to the
/// partition.
#[must_use]
pub fn raw_volume_path(vg_name: &str, workload_id: &str) -> String {
    format!("{vg_name}/r{}", volume_name(workload_id))
}

/// Create the boot volume; `lvcreate -L` takes megabytes.
#[must_use]
pub fn create_volume(vg_name: &str, workload_id: &str, disk_gb: u64) -> String {
    format!(
        "lvcreate -L {} -n {} {vg_name}",
        disk_gb.saturating_mul(1024),
        volume_name(workload_id)
    )
}

/// Remove the boot volume.
#[must_use]
pub fn remove_volume(vg_name: &str, workload_id: &str) -> String {
    format!("lvremove -f {}", volume_path(vg_name, workload_id))
}

/// Define a partition with one disk and two NICs.
#[must_use]
pub fn create_partition(
    npar: &NparConfig,
    name: &str,
    memory_mb: u64,
    cpus: u32,
    raw_volume: &str,
) -> String {
    format!(
        "/opt/hpvm/bin/vparcreate -p {name} -a mem::{memory_mb} -a cpu::{cpus} \
         -a disk:avio_stor::lv:{raw_volume} \
         -a network:avio_lan::vswitch:{} -a network:avio_lan::vswitch:{}",
        npar.management_network, npar.production_network
    )
}

/// Start a partition to its firmware shell.
#[must_use]
pub fn boot_partition(name: &str) -> String {
    format!("/opt/hpvm/bin/vparboot -p {name}")
}

/// Acknowledgement printed by a successful `vparboot`.
pub const BOOT_ACKNOWLEDGEMENT: &str = "Successful start initiation";

/// Forced power off.
#[must_use]
pub fn reset_partition(name: &str) -> String {
    format!("/opt/hpvm/bin/vparreset -f -p {name} -d")
}

/// Remove the partition definition.
#[must_use]
pub fn remove_partition(name: &str) -> String {
    format!("/opt/hpvm/bin/vparremove -p {name} -f")
}

/// Attach an NPIV virtual HBA.
#[must_use]
pub fn attach_vhba(name: &str, wwpn: &str, wwnn: &str) -> String {
    format!("/opt/hpvm/bin/vparmodify -p {name} -a hba:avio_stor:,,{wwpn},{wwnn}:npiv:/dev/fcd0")
}

/// Addresses written into the boot table entry of one partition.
#[derive(Debug, Clone, Copy)]
pub struct BootEntry<'a> {
    /// Partition name.
    pub name: &'a str,
    /// Management MAC.
    pub mac: &'a str,
    /// Management IP.
    pub ip: &'a str,
    /// Management gateway.
    pub gateway: &'a str,
    /// Management netmask.
    pub netmask: &'a str,
}

/// Append the partition's entry to the boot table.
#[must_use]
pub fn append_boot_entry(ignite: &IgniteConfig, entry: &BootEntry<'_>) -> String {
    let lines = [
        format!("{}:\\", entry.name),
        "\ttc=ignite-defaults:\\".to_owned(),
        format!("\tha={}:\\", entry.mac),
        format!("\tbf={}:\\", ignite.boot_file),
        format!("\tgw={}:\\", entry.gateway),
        format!("\tip={}:\\", entry.ip),
        format!("\tsm={}", entry.netmask),
    ];
    append_lines(&lines, &ignite.bootptab)
}

/// Directory holding the client config for `mac`.
#[must_use]
pub fn client_dir(ignite: &IgniteConfig, mac: &str) -> String {
    format!("{}/{mac}", ignite.clients_dir)
}

/// Create the client directory and an empty config file.
#[must_use]
pub fn create_client_config(ignite: &IgniteConfig, mac: &str) -> String {
    let dir = client_dir(ignite, mac);
    format!("mkdir {dir} && touch {dir}/config")
}

/// Append the templated install directives to the client config.
#[must_use]
pub fn write_client_config(ignite: &IgniteConfig, mac: &str, name: &str, image: &str) -> String {
    let lines = [
        format!("cfg \"{image}\"=TRUE"),
        "_hp_cfg_detail_level=\"v\"".to_owned(),
        format!("final system_name=\"{name}\""),
        format!("_hp_keyboard=\"{}\"", ignite.keyboard),
        format!("root_password=\"{}\"", ignite.root_password_hash),
        format!("_hp_root_disk=\"{}\"", ignite.root_disk),
        "_my_second_disk_path=\"\"".to_owned(),
    ];
    append_lines(&lines, &format!("{}/config", client_dir(ignite, mac)))
}

/// `echo '<line>' >> <file>` for each line, chained with `&&`. Tabs are
/// sent literally.
fn append_lines(lines: &[String], file: &str) -> String {
    lines
        .iter()
        .map(|line| format!("echo {} >> {file}", single_quote(line)))
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Wrap `text` in single quotes; embedded quotes become `'\''`.
fn single_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}
