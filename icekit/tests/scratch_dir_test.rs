//! Setup with an unusable temp directory. Kept in its own binary because it
//! rewrites `TMPDIR` for the whole process.

use config::FixtureConfig;
use errors::FixtureError;
use icekit::{IcebergRunner, SetupStep};
use serial_test::serial;
use std::sync::Arc;
use testing::{FakeRuntime, FakeSqlConnector, RuntimeCall, init_tracing};
use tokio_util::sync::CancellationToken;

#[tokio::test]
#[serial]
async fn test_scratch_dir_failure_aborts_before_first_container() {
    init_tracing();
    let missing = std::env::temp_dir().join(testing::unique_id("icekit-missing-tmp"));
    let previous = std::env::var_os("TMPDIR");
    unsafe {
        std::env::set_var("TMPDIR", &missing);
    }

    let runtime = Arc::new(FakeRuntime::new());
    let runner = IcebergRunner::with_collaborators(
        runtime.clone(),
        Arc::new(FakeSqlConnector::new()),
        FixtureConfig::default(),
    )
    .unwrap();
    let result = runner.setup(&CancellationToken::new()).await;

    unsafe {
        match previous {
            Some(value) => std::env::set_var("TMPDIR", value),
            None => std::env::remove_var("TMPDIR")
        }
    }

    let err = result.unwrap_err();
    assert_eq!(err.step, SetupStep::StartMetadataStore);
    assert!(matches!(
        &err.source,
        FixtureError::DescriptorBuildFailed { service, .. } if service == "metadata-store"
    ));
    assert!(err.partial.network.is_some());
    assert!(err.partial.services.is_empty());
    assert!(
        !runtime
            .calls()
            .iter()
            .any(|call| matches!(call, RuntimeCall::Create { .. }))
    );
}
