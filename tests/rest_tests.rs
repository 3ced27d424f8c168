//! REST 传输集成测试
//!
//! 用本地 axum 假服务端验证登录引导、查询参数平铺、JSON 体
//! 序列化、Cookie 携带与错误映射。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

use xoa_client::{Client, Config, Error, ListOptions};

/// 启动假服务端，返回基础地址
async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// 以预置令牌连接假服务端（跳过登录引导）
async fn connect(url: &str) -> Client {
    Client::new(Config {
        url: url.to_string(),
        token: "test-token".to_string(),
        ..Default::default()
    })
    .await
    .unwrap()
}

// ==================== 登录引导 ====================

#[tokio::test]
async fn test_password_login_exchanges_cookie() {
    let login_body: Arc<Mutex<Option<Value>>> = Arc::default();
    let seen_cookie: Arc<Mutex<Option<String>>> = Arc::default();

    let router = Router::new()
        .route(
            "/rest/v0/auth/login",
            post({
                let login_body = Arc::clone(&login_body);
                move |Json(body): Json<Value>| {
                    let login_body = Arc::clone(&login_body);
                    async move {
                        *login_body.lock().unwrap() = Some(body);
                        (
                            [(
                                header::SET_COOKIE,
                                "authenticationToken=issued-token; Path=/; HttpOnly",
                            )],
                            "",
                        )
                    }
                }
            }),
        )
        .route(
            "/rest/v0/vms",
            get({
                let seen_cookie = Arc::clone(&seen_cookie);
                move |headers: HeaderMap| {
                    let seen_cookie = Arc::clone(&seen_cookie);
                    async move {
                        *seen_cookie.lock().unwrap() = headers
                            .get(header::COOKIE)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        Json(json!([]))
                    }
                }
            }),
        );
    let url = spawn_server(router).await;

    let client = Client::new(Config {
        url,
        username: "admin@admin.net".to_string(),
        password: "admin".to_string(),
        ..Default::default()
    })
    .await
    .unwrap();

    let vms = client.vm().list(&ListOptions::new()).await.unwrap();
    assert!(vms.is_empty());

    let body = login_body.lock().unwrap().take().unwrap();
    assert_eq!(body["username"], "admin@admin.net");
    assert_eq!(body["password"], "admin");

    // 换回的令牌作为 Cookie 出现在后续每个请求上
    assert_eq!(
        seen_cookie.lock().unwrap().as_deref(),
        Some("authenticationToken=issued-token")
    );
}

#[tokio::test]
async fn test_login_without_cookie_is_fatal() {
    let router = Router::new().route("/rest/v0/auth/login", post(|| async { "" }));
    let url = spawn_server(router).await;

    let result = Client::new(Config {
        url,
        username: "admin@admin.net".to_string(),
        password: "admin".to_string(),
        ..Default::default()
    })
    .await;

    assert!(matches!(result, Err(Error::Auth(_))));
}

#[tokio::test]
async fn test_login_rejection_is_auth_error() {
    let router = Router::new().route(
        "/rest/v0/auth/login",
        post(|| async { (StatusCode::UNAUTHORIZED, "invalid credentials") }),
    );
    let url = spawn_server(router).await;

    let result = Client::new(Config {
        url,
        username: "admin@admin.net".to_string(),
        password: "wrong".to_string(),
        ..Default::default()
    })
    .await;

    let err = result.err().unwrap();
    assert!(matches!(err, Error::Auth(_)));
    assert!(err.to_string().contains("invalid credentials"));
}

// ==================== 查询参数平铺 ====================

#[tokio::test]
async fn test_get_flattens_query_parameters() {
    let seen: Arc<Mutex<Option<HashMap<String, String>>>> = Arc::default();

    let router = Router::new().route(
        "/rest/v0/vms",
        get({
            let seen = Arc::clone(&seen);
            move |Query(params): Query<HashMap<String, String>>| {
                let seen = Arc::clone(&seen);
                async move {
                    *seen.lock().unwrap() = Some(params);
                    Json(json!([]))
                }
            }
        }),
    );
    let url = spawn_server(router).await;
    let client = connect(&url).await;

    let options = ListOptions::new()
        .with_limit(5)
        .with_fields("*")
        .with_filter("power_state:Running,name_label:web");
    client.vm().list(&options).await.unwrap();

    let params = seen.lock().unwrap().take().unwrap();
    assert_eq!(params.get("limit").map(String::as_str), Some("5"));
    assert_eq!(params.get("fields").map(String::as_str), Some("*"));
    assert_eq!(
        params.get("filter").map(String::as_str),
        Some("power_state:Running,name_label:web")
    );
}

#[tokio::test]
async fn test_empty_filter_omitted_from_query() {
    let seen: Arc<Mutex<Option<HashMap<String, String>>>> = Arc::default();

    let router = Router::new().route(
        "/rest/v0/vms",
        get({
            let seen = Arc::clone(&seen);
            move |Query(params): Query<HashMap<String, String>>| {
                let seen = Arc::clone(&seen);
                async move {
                    *seen.lock().unwrap() = Some(params);
                    Json(json!([]))
                }
            }
        }),
    );
    let url = spawn_server(router).await;
    let client = connect(&url).await;

    client
        .vm()
        .list(&ListOptions::new().with_filter(""))
        .await
        .unwrap();

    // 空过滤串不作为空白参数发送，未设置的字段同样缺席
    let params = seen.lock().unwrap().take().unwrap();
    assert!(params.is_empty());
}

// ==================== JSON 体与请求头 ====================

#[tokio::test]
async fn test_post_sends_json_body_with_headers() {
    let seen: Arc<Mutex<Option<(Option<String>, Option<String>, Value)>>> = Arc::default();
    let vm_id = Uuid::from_u128(0x42);

    let router = Router::new().route(
        "/rest/v0/vms/_/actions/start",
        post({
            let seen = Arc::clone(&seen);
            move |headers: HeaderMap, Json(body): Json<Value>| {
                let seen = Arc::clone(&seen);
                async move {
                    let accept = headers
                        .get(header::ACCEPT)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let content_type = headers
                        .get(header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    *seen.lock().unwrap() = Some((accept, content_type, body));
                    "OK"
                }
            }
        }),
    );
    let url = spawn_server(router).await;
    let client = connect(&url).await;

    client.vm().start(vm_id).await.unwrap();

    let (accept, content_type, body) = seen.lock().unwrap().take().unwrap();
    assert_eq!(accept.as_deref(), Some("application/json"));
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(body["id"], json!(vm_id));
}

#[tokio::test]
async fn test_tag_path_uses_encoded_segment() {
    let seen: Arc<Mutex<Option<String>>> = Arc::default();
    let vm_id = Uuid::from_u128(0x43);

    let router = Router::new().route(
        "/rest/v0/vms/:id/tags/:tag",
        put({
            let seen = Arc::clone(&seen);
            move |Path((_, tag)): Path<(Uuid, String)>| {
                let seen = Arc::clone(&seen);
                async move {
                    *seen.lock().unwrap() = Some(tag);
                    "OK"
                }
            }
        }),
    );
    let url = spawn_server(router).await;
    let client = connect(&url).await;

    // 带空格的标签经百分号编码进入路径，服务端解码后取回原文
    client.vm().add_tag(vm_id, "prod env").await.unwrap();
    assert_eq!(seen.lock().unwrap().take().as_deref(), Some("prod env"));
}

// ==================== 错误映射 ====================

#[tokio::test]
async fn test_http_error_carries_status_and_body() {
    let router = Router::new().route(
        "/rest/v0/vms/:id",
        get(|| async { (StatusCode::NOT_FOUND, "no such VM") }),
    );
    let url = spawn_server(router).await;
    let client = connect(&url).await;

    let err = client.vm().get(Uuid::from_u128(1)).await.err().unwrap();
    match err {
        Error::Http { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "no such VM");
        }
        other => panic!("期望 HTTP 错误，得到: {}", other),
    }
}

#[tokio::test]
async fn test_decode_error_names_target_type() {
    let router = Router::new().route(
        "/rest/v0/vms/:id",
        get(|| async { Json(json!({ "id": 42 })) }),
    );
    let url = spawn_server(router).await;
    let client = connect(&url).await;

    let err = client.vm().get(Uuid::from_u128(1)).await.err().unwrap();
    match err {
        Error::Decode { type_name, body, .. } => {
            assert!(type_name.contains("Vm"), "类型名: {}", type_name);
            assert!(body.contains("42"));
        }
        other => panic!("期望解码错误，得到: {}", other),
    }
}

#[tokio::test]
async fn test_repeat_delete_surfaces_http_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let vm_id = Uuid::from_u128(0x44);

    let router = Router::new().route(
        "/rest/v0/vms/:id",
        delete({
            let calls = Arc::clone(&calls);
            move |Path(_): Path<Uuid>| {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::OK, "OK".to_string())
                    } else {
                        (StatusCode::NOT_FOUND, "already deleted".to_string())
                    }
                }
            }
        }),
    );
    let url = spawn_server(router).await;
    let client = connect(&url).await;

    // 首次删除接受裸 "OK" 响应体
    client.vm().delete(vm_id).await.unwrap();

    // 重复删除不得静默成功
    let err = client.vm().delete(vm_id).await.err().unwrap();
    assert!(matches!(err, Error::Http { status: 404, .. }));
}

#[tokio::test]
async fn test_direct_record_round_trips() {
    let vm_id = Uuid::from_u128(0x45);

    let router = Router::new().route(
        "/rest/v0/vms/:id",
        get(move |Path(id): Path<Uuid>| async move {
            Json(json!({
                "id": id,
                "name_label": "web-01",
                "name_description": "front web server",
                "power_state": "Running",
                "CPUs": { "number": 4, "max": 8 },
                "memory": { "size": 4294967296u64 },
                "$poolId": Uuid::from_u128(0x99),
                "tags": ["prod", "web"],
            }))
        }),
    );
    let url = spawn_server(router).await;
    let client = connect(&url).await;

    let vm = client.vm().get(vm_id).await.unwrap();
    assert_eq!(vm.id, vm_id);
    assert_eq!(vm.name_label, "web-01");
    assert_eq!(vm.cpus.unwrap().number, 4);
    assert_eq!(vm.memory.unwrap().size, 4294967296);
    assert_eq!(vm.pool_id, Some(Uuid::from_u128(0x99)));
    assert_eq!(vm.tags, vec!["prod", "web"]);
}
