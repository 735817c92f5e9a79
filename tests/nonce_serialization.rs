//! Concurrent requests share one relayer nonce sequence.

mod common;

use alloy::signers::local::PrivateKeySigner;
use common::*;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_get_distinct_increasing_nonces() {
    const N: usize = 12;
    let (chain, engine) = setup();
    let engine = Arc::new(engine);

    let requests: Vec<_> = (0..N)
        .map(|_| funded_request(&chain, &PrivateKeySigner::random()))
        .collect();

    let handles: Vec<_> = requests
        .into_iter()
        .enumerate()
        .map(|(i, request)| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .execute_payment(&format!("req-{}", i), &request)
                    .await
            })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.is_ok(), "request failed: {:?}", result.err());
    }

    let nonces = chain.broadcast_nonces();
    assert_eq!(nonces, (0..N as u64).collect::<Vec<_>>());
    assert_eq!(chain.stale_nonce_rejections(), 0);
}

#[tokio::test]
async fn test_low_relayer_balance_consumes_no_nonce() {
    let (chain, engine) = setup();
    let wallet = relayer_wallet();
    chain.set_native_balance(wallet.address(), alloy::primitives::U256::from(MIN_BALANCE_WEI - 1));

    let request = funded_request(&chain, &payer());
    let err = engine.execute_payment("req-1", &request).await.unwrap_err();

    assert!(matches!(
        err,
        permit_relay::RelayError::InsufficientRelayerBalance { .. }
    ));
    assert!(chain.broadcast_nonces().is_empty());

    // The nonce is still free for the next request once funded.
    chain.set_native_balance(wallet.address(), alloy::primitives::U256::from(MIN_BALANCE_WEI));
    let request = funded_request(&chain, &PrivateKeySigner::random());
    engine.execute_payment("req-2", &request).await.unwrap();
    assert_eq!(chain.broadcast_nonces(), vec![0]);
}
