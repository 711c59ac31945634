//! First-fit placement.

use tracing::debug;

use crate::models::node::NodeResource;
use crate::models::request::ResourceRequest;

/// First node in `nodes` whose free memory, CPUs and disk all strictly
/// exceed the request. An exact fit on any dimension does not qualify.
#[must_use]
pub fn select<'a>(request: &ResourceRequest, nodes: &'a [NodeResource]) -> Option<&'a NodeResource> {
    let chosen = nodes.iter().find(|node| fits(request, node));
    debug!(
        workload = %request.workload_id,
        candidates = nodes.len(),
        chosen = chosen.map(|node| node.address.as_str()),
        "placement"
    );
    chosen
}

fn fits(request: &ResourceRequest, node: &NodeResource) -> bool {
    request.memory_mb < node.free_memory_mb()
        && request.cpus < node.free_vcpus()
        && request.disk_gb < node.free_disk_gb()
}
