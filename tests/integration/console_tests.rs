//! Firmware console conversation against a scripted console.

use std::time::Duration;

use regex::Regex;
use vpar_control::remote::console::{
    network_boot, ConsoleState, ConsoleTimeouts, NetworkBootPlan, WRITE_ACCESS_ESCAPE,
};
use vpar_control::AppError;

use super::test_helpers::{happy_console, ConsoleScript, ScriptedExecutor};

fn plan() -> NetworkBootPlan {
    NetworkBootPlan {
        partition: "vpar1".into(),
        server_address: "10.0.0.5".into(),
        client_address: "10.0.0.20".into(),
        gateway: "10.0.0.1".into(),
        netmask: "255.255.255.0".into(),
        boot_file: "/opt/ignite/boot/Rel_B.11.31/nbp.efi".into(),
        profile: "profile-test".into(),
    }
}

fn prompt() -> Regex {
    Regex::new(r"[$#>]\s*$").unwrap()
}

fn timeouts() -> ConsoleTimeouts {
    ConsoleTimeouts {
        step: Duration::from_millis(300),
        boot: Duration::from_millis(600),
    }
}

#[tokio::test]
async fn writable_console_reaches_booting() {
    let executor = ScriptedExecutor::new();
    executor.console(happy_console(false));

    let state = network_boot(&executor, "10.0.0.11", &plan(), prompt(), timeouts())
        .await
        .expect("boot");

    assert_eq!(state, ConsoleState::Booting);
    let log = executor.console_log();
    assert!(log.closed);
    assert_eq!(
        log.sent,
        [
            "/opt/hpvm/bin/vparconsole -P vpar1\n",
            "CO\r",
            "dbprofile -dn profile-test -sip 10.0.0.5 -cip 10.0.0.20 -gip 10.0.0.1 -m 255.255.255.0\r",
            "dbprofile -dn profile-test -b \"/opt/ignite/boot/Rel_B.11.31/nbp.efi\"\r",
            "lanboot select -index 01 -dn profile-test\r",
        ]
    );
}

#[tokio::test]
async fn read_only_console_requests_write_access() {
    let executor = ScriptedExecutor::new();
    executor.console(happy_console(true));

    let state = network_boot(&executor, "10.0.0.11", &plan(), prompt(), timeouts())
        .await
        .expect("boot");

    assert_eq!(state, ConsoleState::Booting);
    let sent = executor.console_log().sent;
    let escape = String::from_utf8_lossy(WRITE_ACCESS_ESCAPE).into_owned();
    let at = sent.iter().position(|s| *s == escape).expect("escape sent");
    assert_eq!(sent[at - 1], "CO\r");
    assert_eq!(sent[at + 1], "\r");
    assert!(sent[at + 2].starts_with("dbprofile"));
}

#[tokio::test]
async fn writable_console_never_sends_escape() {
    let executor = ScriptedExecutor::new();
    executor.console(happy_console(false));

    network_boot(&executor, "10.0.0.11", &plan(), prompt(), timeouts())
        .await
        .expect("boot");

    let escape = String::from_utf8_lossy(WRITE_ACCESS_ESCAPE).into_owned();
    assert!(!executor.console_log().sent.contains(&escape));
}

#[tokio::test]
async fn silent_console_times_out_and_closes() {
    let executor = ScriptedExecutor::new();
    executor.console(ConsoleScript {
        greeting: "Last login: today\r\n# ".into(),
        replies: vec![("vparconsole".into(), "vPar console\r\n[vpar1] vMP> ".into())],
    });

    let err = network_boot(&executor, "10.0.0.11", &plan(), prompt(), timeouts())
        .await
        .expect_err("CO never answered");

    match err {
        AppError::Timeout(msg) => assert!(msg.starts_with("console at logged_in: "), "{msg}"),
        other => panic!("expected timeout, got {other:?}"),
    }
    let log = executor.console_log();
    assert!(log.closed);
    assert_eq!(log.opened, 1);
}

#[tokio::test]
async fn hung_lanboot_times_out_after_configuring() {
    let executor = ScriptedExecutor::new();
    let mut script = happy_console(false);
    script
        .replies
        .insert(0, ("lanboot".into(), "Booting...\r\n".into()));
    executor.console(script);

    let err = network_boot(&executor, "10.0.0.11", &plan(), prompt(), timeouts())
        .await
        .expect_err("no prompt after lanboot");

    assert!(matches!(err, AppError::Timeout(ref msg) if msg.contains("console at configured")));
    assert!(executor.console_log().closed);
}

#[tokio::test]
async fn console_open_failure_is_reported() {
    let executor = ScriptedExecutor::new();

    let err = network_boot(&executor, "10.0.0.11", &plan(), prompt(), timeouts())
        .await
        .expect_err("no console");

    assert!(matches!(err, AppError::Connectivity(_)));
    assert_eq!(executor.console_log().opened, 0);
}
