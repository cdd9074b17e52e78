//! The gate served over a real socket.

use std::time::Duration;

use admin_gate::http::GateServer;
use admin_gate::lifecycle::Shutdown;
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

mod common;
use common::*;

#[tokio::test]
async fn test_login_and_dashboard_over_tcp() {
    let config = test_config();
    let cookie_name = config.session.cookie_name.clone();
    let login_path = config.admin.login_path();
    let dashboard_path = config.admin.dashboard_path();

    let upstream = upstream(&config);
    let server = GateServer::builder(config).upstream(upstream).build().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let handle = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    let client = reqwest::Client::builder().redirect(Policy::none()).build().unwrap();

    let res = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.headers()["x-frame-options"], "DENY");

    let res = client
        .post(format!("{base}{login_path}"))
        .form(&[("username", "root"), ("password", PASSWORD)])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let cookie = res
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{cookie_name}=")))
        .unwrap()
        .to_string();

    let res = client
        .get(format!("{base}{dashboard_path}"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let dashboard: serde_json::Value = res.json().await.unwrap();
    assert_eq!(dashboard["user"]["username"], "root");

    drop(config_tx);
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}
