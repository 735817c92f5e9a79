//! Submission lifecycle: fee estimation, retries, reverts and receipt timeouts.

mod common;

use alloy::primitives::U256;
use alloy::signers::local::PrivateKeySigner;
use common::*;
use permit_relay::engine::{ErrorCategory, RelayError};
use permit_relay::submitter::AttemptStatus;

#[tokio::test]
async fn test_estimation_failure_uses_default_gas_limit() {
    let (chain, engine) = setup();
    chain.fail_gas_estimation(true);
    let request = funded_request(&chain, &payer());

    engine.execute_payment("req-1", &request).await.unwrap();

    let attempts = engine.ledger().for_request("req-1");
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].gas_limit, Some(300_000));
    assert_eq!(attempts[0].status, AttemptStatus::Confirmed);
    assert_eq!(chain.estimate_calls(), 1);
}

#[tokio::test]
async fn test_estimate_is_buffered() {
    let (chain, engine) = setup();
    let request = funded_request(&chain, &payer());

    engine.execute_payment("req-1", &request).await.unwrap();

    let attempts = engine.ledger().for_request("req-1");
    assert_eq!(attempts[0].gas_limit, Some(GAS_ESTIMATE * 12 / 10));
    assert_eq!(attempts[0].gas_used, Some(GAS_USED));
}

#[tokio::test]
async fn test_gas_price_above_cap_is_not_broadcast() {
    let (chain, engine) = setup();
    chain.set_gas_price(600_000_000_000);
    let request = funded_request(&chain, &payer());

    let response = engine.process_payment(request).await;
    let error = response.error.unwrap();
    assert_eq!(error.code, "GAS_PRICE_TOO_HIGH");
    assert_eq!(error.category, ErrorCategory::Transient);
    assert!(chain.broadcast_nonces().is_empty());
    assert_eq!(chain.permit_nonce(payer().address()), U256::ZERO);
}

#[tokio::test]
async fn test_eip1559_mode_confirms() {
    let mut config = test_config();
    config.fees.eip1559 = true;
    let (chain, engine) = setup_with(config);
    let request = funded_request(&chain, &payer());

    assert!(engine.execute_payment("req-1", &request).await.is_ok());
    assert_eq!(chain.broadcast_nonces(), vec![0]);
}

#[tokio::test]
async fn test_revert_is_terminal_and_recorded() {
    let (chain, engine) = setup();
    let request = funded_request(&chain, &payer());
    chain.revert_next();

    let err = engine.execute_payment("req-1", &request).await.unwrap_err();
    let RelayError::Reverted { tx_hash: Some(hash), .. } = err.clone() else {
        panic!("expected revert, got {:?}", err);
    };
    assert_eq!(err.category(), ErrorCategory::OnChain);
    assert!(!err.is_retryable());

    // One attempt only; a revert never retries.
    let attempts = engine.ledger().for_request("req-1");
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, AttemptStatus::Failed);
    assert_eq!(attempts[0].hash, Some(hash));
}

#[tokio::test]
async fn test_nonce_conflict_retries_with_fresh_attempt() {
    let (chain, engine) = setup();
    let first = funded_request(&chain, &payer());
    engine.execute_payment("req-1", &first).await.unwrap();

    // Cached relayer nonce is now stale.
    chain.external_transaction();
    let other = PrivateKeySigner::random();
    let second = funded_request(&chain, &other);

    let receipt = engine.execute_payment("req-2", &second).await.unwrap();
    assert!(receipt.block_number > 0);
    assert_eq!(chain.stale_nonce_rejections(), 1);
    assert_eq!(chain.broadcast_nonces(), vec![0, 2]);

    let attempts = engine.ledger().for_request("req-2");
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].status, AttemptStatus::Failed);
    assert_eq!(attempts[1].status, AttemptStatus::Confirmed);
    assert_ne!(attempts[0].id, attempts[1].id);
    assert_eq!(attempts[1].nonce, Some(2));
}

#[tokio::test]
async fn test_confirmation_timeout_keeps_hash() {
    let mut config = test_config();
    config.blockchain.receipt_timeout_secs = 1;
    let (chain, engine) = setup_with(config);
    chain.withhold_receipts(true);
    let request = funded_request(&chain, &payer());

    let response = engine.process_payment(request).await;
    assert!(!response.success);
    let error = response.error.unwrap();
    assert_eq!(error.code, "CONFIRMATION_TIMEOUT");
    assert!(!error.retryable);
    let hash = response.tx_hash.unwrap();

    let attempts = engine.ledger().for_request(&response.request_id);
    assert_eq!(attempts[0].status, AttemptStatus::Submitted);

    chain.withhold_receipts(false);
    let status = engine.status(&hash.to_string()).await.unwrap();
    assert_eq!(status.block_number, Some(101));
}

#[tokio::test]
async fn test_broadcast_timeout_tracks_accepted_transaction() {
    let (chain, engine) = setup();
    chain.time_out_next_broadcast(BroadcastTimeout::Accepted);
    let request = funded_request(&chain, &payer());

    let receipt = engine.execute_payment("req-1", &request).await.unwrap();

    // One transaction, found by its locally computed hash.
    assert_eq!(chain.broadcast_nonces(), vec![0]);
    let attempts = engine.ledger().for_request("req-1");
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, AttemptStatus::Confirmed);
    assert_eq!(attempts[0].hash, Some(receipt.tx_hash));
    assert_eq!(chain.permit_nonce(payer().address()), U256::from(1));

    // The relayer nonce re-syncs past the timed-out broadcast.
    let next = funded_request(&chain, &PrivateKeySigner::random());
    engine.execute_payment("req-2", &next).await.unwrap();
    assert_eq!(chain.broadcast_nonces(), vec![0, 1]);
    assert_eq!(chain.stale_nonce_rejections(), 0);
}

#[tokio::test]
async fn test_lost_broadcast_is_not_retryable_and_returns_hash() {
    let mut config = test_config();
    config.blockchain.receipt_timeout_secs = 1;
    let (chain, engine) = setup_with(config);
    chain.time_out_next_broadcast(BroadcastTimeout::Lost);
    let request = funded_request(&chain, &payer());

    let response = engine.process_payment(request).await;
    assert!(!response.success);
    let error = response.error.unwrap();
    assert_eq!(error.code, "CONFIRMATION_TIMEOUT");
    assert!(!error.retryable);
    let hash = response.tx_hash.unwrap();

    // No second transaction under a fresh nonce.
    assert!(chain.broadcast_nonces().is_empty());
    let attempts = engine.ledger().for_request(&response.request_id);
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, AttemptStatus::Submitted);
    assert_eq!(attempts[0].hash, Some(hash));

    let status = engine.status(&hash.to_string()).await.unwrap();
    assert_eq!(status.status, permit_relay::status::TxState::Pending);
    assert_eq!(status.request_id.as_deref(), Some(response.request_id.as_str()));

    // The unused nonce is reused by the next request.
    let next = funded_request(&chain, &PrivateKeySigner::random());
    engine.execute_payment("req-2", &next).await.unwrap();
    assert_eq!(chain.broadcast_nonces(), vec![0]);
}
