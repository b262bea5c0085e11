use contextio::{Params, RestContext, RestError};
use serde_json::Value;

/// Build a context from CONTEXTIO_KEY / CONTEXTIO_SECRET
fn live_context() -> RestContext {
    let key = std::env::var("CONTEXTIO_KEY").expect("CONTEXTIO_KEY not set");
    let secret = std::env::var("CONTEXTIO_SECRET").expect("CONTEXTIO_SECRET not set");
    let mut ctx = RestContext::new(key, secret).expect("failed to create context");
    ctx.set_rate(60);
    ctx
}

#[test]
#[ignore] // Run with: cargo test --test integration_tests -- --ignored
fn test_list_accounts() {
    let ctx = live_context();

    let query = Params::from([("limit".to_string(), "10".to_string())]);
    let accounts: Vec<Value> = ctx
        .apply("GET", "/2.0/accounts", &query, None)
        .expect("failed to list accounts");

    assert!(accounts.len() <= 10, "expected at most 10 accounts");
    println!("List accounts test passed: {} accounts", accounts.len());
}

#[test]
#[ignore]
fn test_unknown_account_is_status_error() {
    let ctx = live_context();

    let result = ctx.do_json(
        "GET",
        "/2.0/accounts/no-such-account%40example.com",
        &Params::new(),
        None,
    );

    match result {
        Err(RestError::Http { status, body }) => {
            println!(
                "Status error test passed: {} {}",
                status,
                String::from_utf8_lossy(&body)
            );
        }
        other => panic!("expected RestError::Http, got {:?}", other),
    }
}

#[test]
#[ignore]
fn test_bad_credentials_rejected() {
    let ctx = RestContext::new("not-a-key", "not-a-secret").expect("failed to create context");

    let err = ctx
        .do_json("GET", "/2.0/accounts", &Params::new(), None)
        .expect_err("expected bad credentials to be rejected");

    assert!(err.is_status(), "expected a status error, got {:?}", err);
    println!("Bad credentials test passed: {}", err);
}
