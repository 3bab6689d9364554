use super::*;

use futures::executor::block_on;

#[test]
fn no_signal_passes_result_through() {
    let out = block_on(guard(None, "load", async { Ok::<_, FxError>(7) })).unwrap();
    assert_eq!(out, 7);
}

#[test]
fn pre_cancelled_token_fails_without_polling() {
    let token = CancellationToken::new();
    token.cancel();
    let polled = std::cell::Cell::new(false);
    let err = block_on(guard(Some(&token), "load", async {
        polled.set(true);
        Ok::<_, FxError>(())
    }))
    .unwrap_err();
    assert!(err.is_cancelled());
    assert!(!polled.get());
}

#[test]
fn cancel_while_pending_rejects() {
    let token = CancellationToken::new();
    let canceller = token.clone();
    let err = block_on(async {
        let pending = guard(
            Some(&token),
            "image",
            futures::future::pending::<FxResult<()>>(),
        );
        let trigger = async {
            canceller.cancel();
            Ok::<(), FxError>(())
        };
        let (res, _) = futures::join!(pending, trigger);
        res
    })
    .unwrap_err();
    assert!(err.is_cancelled());
}

#[test]
fn inner_errors_are_not_reclassified() {
    let token = CancellationToken::new();
    let err = block_on(guard(Some(&token), "image", async {
        Err::<(), _>(FxError::resource_load("404"))
    }))
    .unwrap_err();
    assert!(matches!(err, FxError::ResourceLoad(_)));
}
