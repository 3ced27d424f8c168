//! JSON-RPC 会话集成测试
//!
//! 用 tokio-tungstenite 假服务端验证令牌签到、类型化调用、错误
//! 信封、乱序应答关联与惰性初始化（含失败缓存）。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use xoa_client::{Client, Config, Error};

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

/// 以预置令牌连接，REST 侧不会被触达
async fn connect(url: &str) -> Client {
    Client::new(Config {
        url: url.to_string(),
        token: "test-token".to_string(),
        ..Default::default()
    })
    .await
    .unwrap()
}

fn reply(id: &Value, result: Value) -> Message {
    Message::Text(json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string())
}

fn reply_error(id: &Value, code: i64, message: &str) -> Message {
    Message::Text(
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message },
        })
        .to_string(),
    )
}

// ==================== 签到与类型化调用 ====================

#[tokio::test]
async fn test_token_sign_in_precedes_first_call() {
    let (listener, url) = bind().await;
    let seen_token: Arc<Mutex<Option<String>>> = Arc::default();

    let seen = Arc::clone(&seen_token);
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let req: Value = serde_json::from_str(&text).unwrap();
            match req["method"].as_str().unwrap() {
                "session.signInWithToken" => {
                    *seen.lock().unwrap() =
                        req["params"]["token"].as_str().map(str::to_string);
                    ws.send(reply(&req["id"], json!({ "id": "session-1" })))
                        .await
                        .unwrap();
                }
                "backupNg.deleteJob" => {
                    ws.send(reply(&req["id"], json!(true))).await.unwrap();
                }
                other => panic!("未预期的方法: {}", other),
            }
        }
    });

    let client = connect(&url).await;
    client.backup().delete_job(Uuid::from_u128(7)).await.unwrap();

    // 会话令牌原样送入签到参数
    assert_eq!(seen_token.lock().unwrap().as_deref(), Some("test-token"));
}

#[tokio::test]
async fn test_application_error_names_method() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let req: Value = serde_json::from_str(&text).unwrap();
            let frame = match req["method"].as_str().unwrap() {
                "session.signInWithToken" => reply(&req["id"], json!(true)),
                _ => reply_error(&req["id"], 10, "no such job"),
            };
            ws.send(frame).await.unwrap();
        }
    });

    let client = connect(&url).await;
    let err = client
        .backup()
        .delete_job(Uuid::from_u128(8))
        .await
        .err()
        .unwrap();

    match &err {
        Error::Rpc { method, code, message } => {
            assert_eq!(method, "backupNg.deleteJob");
            assert_eq!(*code, 10);
            assert_eq!(message, "no such job");
        }
        other => panic!("期望 RPC 错误，得到: {}", other),
    }
}

#[tokio::test]
async fn test_false_result_is_domain_failure() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let req: Value = serde_json::from_str(&text).unwrap();
            let frame = match req["method"].as_str().unwrap() {
                "session.signInWithToken" => reply(&req["id"], json!(true)),
                // 传输层成功，领域层失败
                _ => reply(&req["id"], json!(false)),
            };
            ws.send(frame).await.unwrap();
        }
    });

    let client = connect(&url).await;
    let err = client
        .backup()
        .edit_job(json!({ "id": Uuid::from_u128(9) }))
        .await
        .err()
        .unwrap();

    assert!(err.to_string().contains("backupNg.editJob"), "得到: {}", err);
}

// ==================== 乱序应答关联 ====================

#[tokio::test]
async fn test_out_of_order_replies_are_correlated() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        // 签到
        loop {
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                return;
            };
            let req: Value = serde_json::from_str(&text).unwrap();
            if req["method"] == "session.signInWithToken" {
                ws.send(reply(&req["id"], json!(true))).await.unwrap();
                break;
            }
        }

        // 收齐两条在途请求后按相反顺序应答
        let mut inflight = Vec::new();
        while inflight.len() < 2 {
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                return;
            };
            inflight.push(serde_json::from_str::<Value>(&text).unwrap());
        }
        for req in inflight.iter().rev() {
            let result = match req["method"].as_str().unwrap() {
                "backupNg.restoreMetadata" => json!("/rest/v0/tasks/meta-1"),
                "backupNg.importVmBackup" => json!("/rest/v0/tasks/import-1"),
                other => panic!("未预期的方法: {}", other),
            };
            ws.send(reply(&req["id"], result)).await.unwrap();
        }
    });

    let client = connect(&url).await;
    let restore = client.restore();
    let (meta, import) = tokio::join!(
        restore.restore_metadata(json!({ "backup": "meta-0" })),
        restore.import_vm_backup(json!({ "backup": "vm-0" })),
    );

    // 各调用拿到的是自己 ID 对应的应答，与到达顺序无关
    assert_eq!(meta.unwrap(), "meta-1");
    assert_eq!(import.unwrap(), "import-1");
}

// ==================== 惰性初始化 ====================

#[tokio::test]
async fn test_concurrent_first_callers_share_session() {
    let (listener, url) = bind().await;
    let sign_ins = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&sign_ins);
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let req: Value = serde_json::from_str(&text).unwrap();
            let frame = match req["method"].as_str().unwrap() {
                "session.signInWithToken" => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    reply(&req["id"], json!(true))
                }
                _ => reply(&req["id"], json!(true)),
            };
            ws.send(frame).await.unwrap();
        }
    });

    let client = connect(&url).await;
    let backup = client.backup();
    let (a, b) = tokio::join!(
        backup.delete_job(Uuid::from_u128(1)),
        backup.delete_job(Uuid::from_u128(2)),
    );

    a.unwrap();
    b.unwrap();
    // 首个调用方建连并签到一次，并发调用方共享同一会话
    assert_eq!(sign_ins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_initialization_is_cached() {
    let (listener, url) = bind().await;
    let accepts = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&accepts);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            // 握手前断开，客户端观察到初始化失败
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let client = connect(&url).await;
    assert!(client
        .backup()
        .delete_job(Uuid::from_u128(3))
        .await
        .is_err());
    assert!(client.backup().edit_job(json!({})).await.is_err());

    // 失败被缓存，后续调用不再尝试建连
    assert_eq!(accepts.load(Ordering::SeqCst), 1);
}
