//! Telemetry installation. Kept in its own test binary because the
//! subscriber is process-global.

use palisade_client::init_telemetry;

#[test]
fn test_init_telemetry_installs_once() {
    let guard = init_telemetry("palisade-test", "debug").unwrap();
    assert_eq!(guard.service_name(), "palisade-test");

    {
        let span = tracing::info_span!("lookup", key = "k");
        let _entered = span.enter();
        tracing::debug!("inside span");
    }

    assert!(init_telemetry("palisade-test", "debug").is_err());
    drop(guard);
}
