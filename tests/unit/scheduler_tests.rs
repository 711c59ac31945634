//! Unit tests for first-fit placement.

use proptest::prelude::*;
use vpar_control::models::node::NodeResource;
use vpar_control::models::request::ResourceRequest;
use vpar_control::scheduler::select;

fn node(address: &str, free_mem: u64, free_cpu: u32, free_disk: u64) -> NodeResource {
    NodeResource {
        address: address.into(),
        hostname: None,
        model: "nPar".into(),
        vcpus: free_cpu + 2,
        vcpus_used: 2,
        memory_mb: free_mem + 4096,
        memory_mb_used: 4096,
        disk_gb: free_disk + 50,
        disk_gb_used: 50,
    }
}

fn request(memory_mb: u64, cpus: u32, disk_gb: u64) -> ResourceRequest {
    ResourceRequest {
        workload_id: "w1".into(),
        memory_mb,
        cpus,
        disk_gb,
    }
}

#[test]
fn single_node_with_room_is_selected() {
    let nodes = vec![node("A", 2048, 2, 100)];
    let chosen = select(&request(1024, 1, 20), &nodes).expect("a node");
    assert_eq!(chosen.address, "A");
}

#[test]
fn first_fit_not_best_fit() {
    let nodes = vec![
        node("A", 512, 8, 500),
        node("B", 65536, 32, 2000),
        node("C", 2048, 2, 100),
    ];
    let chosen = select(&request(1024, 1, 20), &nodes).expect("a node");
    assert_eq!(chosen.address, "B");
}

#[test]
fn exact_fit_is_rejected_on_every_dimension() {
    let nodes = vec![node("A", 2048, 2, 100)];
    assert!(select(&request(2048, 1, 20), &nodes).is_none());
    assert!(select(&request(1024, 2, 20), &nodes).is_none());
    assert!(select(&request(1024, 1, 100), &nodes).is_none());
}

#[test]
fn empty_registry_yields_none() {
    assert!(select(&request(1, 1, 1), &[]).is_none());
}

fn fits(req: &ResourceRequest, node: &NodeResource) -> bool {
    req.memory_mb < node.free_memory_mb()
        && req.cpus < node.free_vcpus()
        && req.disk_gb < node.free_disk_gb()
}

fn arb_node() -> impl Strategy<Value = NodeResource> {
    (0..4096u64, 0..8u32, 0..200u64).prop_map(|(mem, cpu, disk)| node("n", mem, cpu, disk))
}

fn arb_pool() -> impl Strategy<Value = Vec<NodeResource>> {
    prop::collection::vec(arb_node(), 0..8).prop_map(|mut nodes| {
        for (i, node) in nodes.iter_mut().enumerate() {
            node.address = format!("n{i}");
        }
        nodes
    })
}

fn arb_request() -> impl Strategy<Value = ResourceRequest> {
    (0..4096u64, 0..8u32, 0..200u64).prop_map(|(mem, cpu, disk)| request(mem, cpu, disk))
}

proptest! {
    /// The chosen node has strictly more free memory, CPUs and disk than
    /// requested, and every node before it falls short somewhere.
    #[test]
    fn chosen_node_is_the_first_with_strict_headroom(
        nodes in arb_pool(),
        req in arb_request(),
    ) {
        if let Some(chosen) = select(&req, &nodes) {
            prop_assert!(req.memory_mb < chosen.free_memory_mb());
            prop_assert!(req.cpus < chosen.free_vcpus());
            prop_assert!(req.disk_gb < chosen.free_disk_gb());

            let position = nodes
                .iter()
                .position(|n| n.address == chosen.address)
                .expect("chosen node comes from the pool");
            for earlier in &nodes[..position] {
                prop_assert!(
                    !fits(&req, earlier),
                    "{} fits before {}",
                    earlier.address,
                    chosen.address
                );
            }
        }
    }

    /// No selection means no node in the pool has room.
    #[test]
    fn none_only_when_nothing_fits(nodes in arb_pool(), req in arb_request()) {
        if select(&req, &nodes).is_none() {
            for node in &nodes {
                prop_assert!(!fits(&req, node), "{} has room", node.address);
            }
        }
    }

    /// Asking for exactly the free amount of any one dimension is refused,
    /// even when the other two have room.
    #[test]
    fn exact_fit_on_one_dimension_is_refused(
        mem in 1..4096u64,
        cpu in 1..8u32,
        disk in 1..200u64,
    ) {
        let nodes = vec![node("A", mem, cpu, disk)];
        prop_assert!(select(&request(mem - 1, cpu - 1, disk - 1), &nodes).is_some());
        prop_assert!(select(&request(mem, cpu - 1, disk - 1), &nodes).is_none());
        prop_assert!(select(&request(mem - 1, cpu, disk - 1), &nodes).is_none());
        prop_assert!(select(&request(mem - 1, cpu - 1, disk), &nodes).is_none());
    }
}
