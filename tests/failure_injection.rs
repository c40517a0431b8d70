//! Failure injection: endpoint outages, failover, cooldown and submit retries.

use std::time::Duration;

use ledger_wallet_core::ledger::{Amount, SubmissionState, TxTemplate};
use ledger_wallet_core::rpc::HealthState;
use ledger_wallet_core::WalletError;

mod common;
use common::{
    app_with, funded_app, test_config, MockLedger, DESTINATION, ENDPOINT_A, ENDPOINT_B, PASSWORD,
};

#[tokio::test(start_paused = true)]
async fn test_failover_to_secondary() {
    let ledger = MockLedger::new();
    ledger.set_down(ENDPOINT_A, true);
    let app = app_with(test_config(), &ledger);

    let info = app.client.server_info().await.unwrap();
    assert_eq!(info.server_state.as_deref(), Some("full"));

    let endpoints = app.manager.endpoints();
    assert_eq!(endpoints[0].health(), HealthState::Unhealthy);
    assert_eq!(endpoints[1].health(), HealthState::Healthy);
    assert_eq!(app.manager.current_index(), 1);

    // The next call goes straight to B.
    let before = ledger.calls_on(ENDPOINT_A);
    app.client.fee().await.unwrap();
    assert_eq!(ledger.calls_on(ENDPOINT_A), before);

    let status = app.manager.get_status();
    assert!(status.connected);
    assert_eq!(status.current_endpoint.as_deref(), Some(ENDPOINT_B));
    assert_eq!(status.failed_endpoints, vec![ENDPOINT_A.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_ledger_error_is_not_an_endpoint_failure() {
    let ledger = MockLedger::new();
    let app = app_with(test_config(), &ledger);

    let err = app.client.account_info(DESTINATION).await.unwrap_err();
    assert!(matches!(err, WalletError::Ledger { ref code, .. } if code == "actNotFound"));
    assert_eq!(app.manager.endpoints()[0].health(), HealthState::Healthy);
    assert_eq!(ledger.calls_on(ENDPOINT_B), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_pool_fails_fast_until_cooldown() {
    let ledger = MockLedger::new();
    ledger.set_down(ENDPOINT_A, true);
    ledger.set_down(ENDPOINT_B, true);
    let app = app_with(test_config(), &ledger);

    let err = app.client.validated_ledger_index().await.unwrap_err();
    assert!(matches!(err, WalletError::Network(_)));
    assert!(err.is_retryable());
    let attempts = ledger.calls("ledger");
    assert_eq!(attempts, 2);

    // Cooling down: no endpoint is contacted.
    assert!(app.client.validated_ledger_index().await.is_err());
    assert_eq!(ledger.calls("ledger"), attempts);
    assert!(!app.manager.get_status().connected);

    ledger.set_down(ENDPOINT_A, false);
    tokio::time::advance(Duration::from_secs(301)).await;
    assert_eq!(app.client.validated_ledger_index().await.unwrap(), 100);
    assert_eq!(app.manager.endpoints()[0].health(), HealthState::Healthy);
}

#[tokio::test(start_paused = true)]
async fn test_force_reconnect_clears_health() {
    let ledger = MockLedger::new();
    ledger.set_down(ENDPOINT_A, true);
    ledger.set_down(ENDPOINT_B, true);
    let app = app_with(test_config(), &ledger);
    assert!(app.client.fee().await.is_err());
    assert_eq!(app.manager.get_status().failed_endpoints.len(), 2);

    ledger.set_down(ENDPOINT_A, false);
    ledger.set_down(ENDPOINT_B, false);
    assert!(app.manager.force_reconnect().await);

    let status = app.manager.get_status();
    assert!(status.failed_endpoints.is_empty());
    assert_eq!(status.available_endpoints.len(), 2);
    assert_eq!(app.manager.current_index(), 0);
    for endpoint in app.manager.endpoints() {
        assert_eq!(endpoint.consecutive_failures(), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_force_reconnect_reports_total_outage() {
    let ledger = MockLedger::new();
    ledger.set_down(ENDPOINT_A, true);
    ledger.set_down(ENDPOINT_B, true);
    let app = app_with(test_config(), &ledger);

    assert!(!app.manager.force_reconnect().await);
    assert!(!app.manager.get_status().connected);
}

#[tokio::test(start_paused = true)]
async fn test_submit_retries_through_transient_failure() {
    let ledger = MockLedger::new();
    let mut config = test_config();
    config.network.cooldown_secs = 0;
    let (app, _) = funded_app(config, &ledger).await;

    // First attempt fails on both endpoints, the second fails on A and lands on B.
    ledger.fail_submits(3);
    let report = app
        .send_xrp(DESTINATION, "1", None, PASSWORD)
        .await
        .unwrap()
        .join()
        .await
        .unwrap();
    assert!(report.result.unwrap().is_success());
    assert_eq!(ledger.calls("submit"), 4);
    assert_eq!(ledger.submitted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_submit_retries_through_overloaded_servers() {
    let ledger = MockLedger::new();
    let mut config = test_config();
    config.network.cooldown_secs = 0;
    let (app, _) = funded_app(config, &ledger).await;

    // Both endpoints shed the first attempt, A sheds the second and B accepts it.
    ledger.overload("submit", 3);
    let report = app
        .send_xrp(DESTINATION, "1", None, PASSWORD)
        .await
        .unwrap()
        .join()
        .await
        .unwrap();
    assert!(report.result.unwrap().is_success());
    assert_eq!(ledger.calls("submit"), 4);
    assert_eq!(ledger.submitted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_polling_tolerates_overloaded_servers() {
    let ledger = MockLedger::new();
    let mut config = test_config();
    config.network.cooldown_secs = 0;
    let (app, _) = funded_app(config, &ledger).await;

    let template = TxTemplate::payment(DESTINATION, Amount::Xrp(1_000), None);
    let (mut envelope, blob) = app.prepare(template, PASSWORD).await.unwrap();

    // Two whole polls are shed by both endpoints before one goes through.
    ledger.overload("ledger", 2);
    ledger.overload("tx", 2);
    let outcome = app.submitter.submit_and_wait(&blob, &mut envelope).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(envelope.state, SubmissionState::ValidatedSuccess);
    assert_eq!(ledger.submitted().len(), 1);
    assert!(ledger.calls("tx") >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_submit_gives_up_after_max_attempts() {
    let ledger = MockLedger::new();
    let mut config = test_config();
    config.network.cooldown_secs = 0;
    config.submitter.max_submit_attempts = 3;
    let (app, _) = funded_app(config, &ledger).await;

    ledger.fail_submits(100);
    let report = app
        .send_xrp(DESTINATION, "1", None, PASSWORD)
        .await
        .unwrap()
        .join()
        .await
        .unwrap();
    assert!(matches!(report.result, Err(WalletError::Network(_))));
    assert_eq!(ledger.calls("submit"), 6);
    assert_eq!(ledger.calls("tx"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_polling_only() {
    let ledger = MockLedger::new();
    ledger.never_validate();
    let mut config = test_config();
    config.signer.expiry_window = 1000;
    let (app, _) = funded_app(config, &ledger).await;

    let mut handle = app.send_xrp(DESTINATION, "1", None, PASSWORD).await.unwrap();
    // Wait until the blob is on the ledger, then cancel.
    while let Some(event) = handle.progress.recv().await {
        if matches!(event, ledger_wallet_core::ledger::SubmissionEvent::Polling { .. }) {
            handle.cancel();
            break;
        }
    }
    let report = handle.join().await.unwrap();
    assert!(matches!(report.result, Err(WalletError::Cancelled { .. })));
    assert_eq!(ledger.submitted().len(), 1);
}
