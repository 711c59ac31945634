//! Provisioning engine and registration against scripted hosts.

use std::sync::Arc;

use vpar_control::models::lifecycle::DestroyOutcome;
use vpar_control::models::partition::PowerState;
use vpar_control::provisioning::ignite::REGISTRATION_STEPS;
use vpar_control::provisioning::{ProvisioningEngine, ProvisioningService, Registration};
use vpar_control::AppError;

use super::test_helpers::{
    detail, spawn_request, spawn_script, test_config, ScriptedExecutor, LVCREATE_OK, VPARBOOT_OK,
};

const NODE: &str = "10.0.0.11";

fn engine(executor: &ScriptedExecutor) -> ProvisioningEngine {
    let config = test_config();
    ProvisioningEngine::new(
        Arc::new(executor.clone()),
        &config.remote,
        config.npar,
        config.ignite,
    )
    .expect("engine")
}

#[tokio::test]
async fn allocate_storage_returns_raw_device() {
    let executor = ScriptedExecutor::new();
    executor.on("lvcreate", LVCREATE_OK);

    let raw = engine(&executor)
        .allocate_storage(NODE, "w1", 20)
        .await
        .expect("allocate");

    assert_eq!(raw, "/dev/vg00/rlv-w1");
    assert_eq!(executor.command_lines(), ["lvcreate -L 20480 -n lv-w1 /dev/vg00"]);
}

#[tokio::test]
async fn allocate_storage_without_confirmation_fails() {
    let executor = ScriptedExecutor::new();
    executor.on("lvcreate", "lvcreate: Not enough free physical extents available.\r\n");

    let err = engine(&executor)
        .allocate_storage(NODE, "w1", 20)
        .await
        .expect_err("no device reported");

    assert!(matches!(err, AppError::RemoteCommand(ref msg) if msg.contains("/dev/vg00/rlv-w1")));
}

#[tokio::test]
async fn boot_acknowledgement_is_reported() {
    let executor = ScriptedExecutor::new();
    executor.on_target(NODE, "vparboot -p vpar1", VPARBOOT_OK);
    executor.on_target(NODE, "vparboot -p vpar2", "vparboot: vPar or VM 'vpar2' is already running\r\n");
    let engine = engine(&executor);

    assert!(engine.boot_to_firmware(NODE, "vpar1").await.unwrap());
    assert!(!engine.boot_to_firmware(NODE, "vpar2").await.unwrap());
}

#[tokio::test]
async fn power_on_ignores_missing_acknowledgement() {
    let executor = ScriptedExecutor::new();
    executor.on_target(NODE, "vparboot -p vpar1", "vparboot: vPar or VM 'vpar1' is already running\r\n");

    engine(&executor)
        .power_on(NODE, "vpar1")
        .await
        .expect("power on");

    assert_eq!(executor.command_lines(), ["/opt/hpvm/bin/vparboot -p vpar1"]);
}

#[tokio::test]
async fn power_on_surfaces_transport_failure() {
    let executor = ScriptedExecutor::new();
    executor.fail_on("vparboot", "connection reset");

    let err = engine(&executor)
        .power_on(NODE, "vpar1")
        .await
        .expect_err("transport down");

    assert!(matches!(err, AppError::Connectivity(ref msg) if msg == "connection reset"));
}

#[tokio::test]
async fn management_mac_comes_from_management_vswitch() {
    let executor = ScriptedExecutor::new();
    executor.on("vparstatus -p vpar1 -v", &detail("UP"));

    let mac = engine(&executor)
        .read_management_mac(NODE, "vpar1")
        .await
        .unwrap();

    assert_eq!(mac.as_deref(), Some("0x7E6B5A43E9E4"));
}

#[tokio::test]
async fn resource_info_decodes_detail() {
    let executor = ScriptedExecutor::new();
    executor.on("vparstatus -p vpar1 -v", &detail("DOWN"));

    let info = engine(&executor).resource_info(NODE, "vpar1").await.unwrap();

    assert_eq!(info.run_state.as_deref(), Some("DOWN"));
    assert_eq!(info.cpus, Some(2));
    assert_eq!(info.total_memory_mb, Some(2048));
}

#[tokio::test]
async fn attach_vhba_powers_off_first() {
    let executor = ScriptedExecutor::new();
    executor.on("vparreset", "");
    executor.on("vparmodify", "");

    engine(&executor)
        .attach_vhba(NODE, "vpar1", "0x5001438001321a2c", "0x5001438001321a2d")
        .await
        .unwrap();

    let lines = executor.command_lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("/opt/hpvm/bin/vparreset -f -p vpar1"));
    assert!(lines[1].contains("hba:avio_stor:,,0x5001438001321a2c,0x5001438001321a2d:npiv:/dev/fcd0"));
}

#[tokio::test]
async fn registration_stops_at_first_failure() {
    let executor = ScriptedExecutor::new();
    executor.fail_on("mkdir", "Permission denied");
    executor.on("echo", "");
    let service = ProvisioningService::new(Arc::new(executor.clone()), test_config().ignite);

    let err = service
        .register(&Registration {
            name: "vpar1".into(),
            mac: "0x7E6B5A43E9E4".into(),
            ip: "10.0.0.20".into(),
            gateway: "10.0.0.1".into(),
            netmask: "255.255.255.0".into(),
            image: "HP-UX B.11.31.1403 Default".into(),
        })
        .await
        .expect_err("client directory fails");

    assert!(
        matches!(err, AppError::Connectivity(ref msg) if msg.starts_with(REGISTRATION_STEPS[1]))
    );
    let lines = executor.command_lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(">> /etc/bootptab"));
    assert!(executor.commands().iter().all(|c| c.target == "ignite"));
    assert_eq!(executor.count("system_name"), 0);
}

#[tokio::test]
async fn provision_runs_every_step_in_order() {
    let executor = spawn_script();

    let partition = engine(&executor)
        .provision(NODE, &spawn_request(), "10.0.0.20")
        .await
        .expect("provision");

    assert_eq!(partition.power_state, PowerState::Running);
    assert_eq!(partition.network.mac.as_deref(), Some("0x7E6B5A43E9E4"));
    assert_eq!(partition.volume_path.as_deref(), Some("/dev/vg00/rlv-w1"));

    let lines = executor.command_lines();
    let position = |needle: &str| {
        lines
            .iter()
            .position(|l| l.contains(needle))
            .unwrap_or_else(|| panic!("{needle} not run"))
    };
    let order = [
        position("lvcreate"),
        position("vparcreate"),
        position("vparboot"),
        position("vparstatus -p vpar1 -v"),
        position(">> /etc/bootptab"),
        position("mkdir"),
        position("system_name"),
    ];
    assert!(order.windows(2).all(|pair| pair[0] < pair[1]), "{lines:#?}");
    assert!(lines[position("vparcreate")].contains("-a disk:avio_stor::lv:/dev/vg00/rlv-w1"));
    assert!(lines[position(">> /etc/bootptab")].contains("ha=0x7E6B5A43E9E4"));
    assert!(executor.console_log().closed);
}

#[tokio::test]
async fn unacknowledged_boot_stops_provisioning() {
    let silent = ScriptedExecutor::new();
    silent.on("lvcreate", LVCREATE_OK);
    silent.on("vparcreate", "");
    silent.on("vparboot", "vparboot: Unable to start vPar\r\n");

    let err = engine(&silent)
        .provision(NODE, &spawn_request(), "10.0.0.20")
        .await
        .expect_err("boot not acknowledged");

    assert!(
        matches!(err, AppError::RemoteCommand(ref msg) if msg.starts_with("boot to firmware: "))
    );
    assert_eq!(silent.count("vparstatus"), 0);
    assert_eq!(silent.console_log().opened, 0);
}

#[tokio::test]
async fn missing_management_nic_stops_before_registration() {
    let executor = ScriptedExecutor::new();
    executor.on("lvcreate", LVCREATE_OK);
    executor.on("vparcreate", "");
    executor.on("vparboot", VPARBOOT_OK);
    executor.on(
        "vparstatus -p vpar1 -v",
        "RunState: UP\r\nnetwork:avio_lan:0,2,0x56a1b2c3d4e5:vswitch:localnet:portid:4\r\n",
    );

    let err = engine(&executor)
        .provision(NODE, &spawn_request(), "10.0.0.20")
        .await
        .expect_err("no management NIC");

    assert!(matches!(err, AppError::RemoteCommand(ref msg) if msg.contains("sitelan")));
    assert_eq!(executor.count("bootptab"), 0);
}

#[tokio::test]
async fn destroy_removes_partition_once_down() {
    let executor = ScriptedExecutor::new();
    executor.on("vparreset", "");
    executor.on("vparstatus -p vpar1 -v", &detail("DOWN"));
    executor.on("vparremove", "");
    executor.on("lvremove", "");

    let outcome = engine(&executor).destroy(NODE, "vpar1", "w1").await.unwrap();

    assert_eq!(outcome, DestroyOutcome::Removed);
    let lines = executor.command_lines();
    assert_eq!(
        lines[2..],
        [
            "/opt/hpvm/bin/vparremove -p vpar1 -f".to_owned(),
            "lvremove -f /dev/vg00/lv-w1".to_owned(),
        ]
    );
}

#[tokio::test]
async fn destroy_skips_removal_when_still_up() {
    let executor = ScriptedExecutor::new();
    executor.on("vparreset", "");
    executor.on("vparstatus -p vpar1 -v", &detail("UP"));

    let outcome = engine(&executor).destroy(NODE, "vpar1", "w1").await.unwrap();

    assert_eq!(outcome, DestroyOutcome::SkippedNotDown);
    assert_eq!(executor.count("vparremove"), 0);
    assert_eq!(executor.count("lvremove"), 0);
}

#[tokio::test]
async fn destroy_tags_failed_step() {
    let executor = ScriptedExecutor::new();
    executor.on("vparreset", "");
    executor.on("vparstatus -p vpar1 -v", &detail("DOWN"));
    executor.fail_on("vparremove", "channel closed");

    let err = engine(&executor)
        .destroy(NODE, "vpar1", "w1")
        .await
        .expect_err("remove fails");

    assert!(
        matches!(err, AppError::Connectivity(ref msg) if msg.starts_with("remove definition: "))
    );
    assert_eq!(executor.count("lvremove"), 0);
}
