mod test_support;

use std::net::SocketAddr;

use reporting_module::{router, AppState, BugReport, BugStatus};
use test_support::{email_config, harness, inbound_email, Harness};

async fn serve(h: &Harness) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    let state = AppState {
        poller: h.poller.clone(),
        inbound: h.inbound.clone(),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(state, 1024 * 1024)).await;
    });
    Ok(addr)
}

#[tokio::test]
async fn health_and_poll_endpoints_respond() -> Result<(), Box<dyn std::error::Error>> {
    let h = harness(false);
    h.store.reports.lock().unwrap().push(BugReport {
        id: "b1".to_string(),
        title: "WARNING in bar".to_string(),
        config: email_config(false, false),
        ..Default::default()
    });
    let addr = serve(&h).await?;
    let client = reqwest::Client::new();

    let health = client.get(format!("http://{}/health", addr)).send().await?;
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await?, "ok");

    let poll = client.get(format!("http://{}/email_poll", addr)).send().await?;
    assert_eq!(poll.status(), 200);
    assert_eq!(poll.text().await?, "OK");
    assert_eq!(h.transport.sent().len(), 1);
    assert_eq!(h.store.updates()[0].status, BugStatus::Open);
    Ok(())
}

#[tokio::test]
async fn inbound_mail_endpoint_always_accepts() -> Result<(), Box<dyn std::error::Error>> {
    let h = harness(false);
    let addr = serve(&h).await?;
    let client = reqwest::Client::new();

    let raw = inbound_email(
        "dev@example.org",
        "bot+b1@example.com",
        &[],
        "#bugbot invalid\n",
    );
    let response = client
        .post(format!("http://{}/_ah/mail/bot+b1@example.com", addr))
        .body(raw)
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    assert_eq!(h.store.updates()[0].status, BugStatus::Invalid);

    let garbage = client
        .post(format!("http://{}/_ah/mail/bot@example.com", addr))
        .body("not a message")
        .send()
        .await?;
    assert_eq!(garbage.status(), 200);
    assert_eq!(h.store.updates().len(), 1);
    Ok(())
}
