//! Integration tests for the auth service against scripted HTTP and
//! WebSocket servers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::StreamExt;
use gatehouse::endpoints::{LOGIN_PATH, PASSWORD_PATH, PUBLIC_KEY_PATH, REGISTER_PATH};
use gatehouse::prelude::*;
use gatehouse_http::testing::{ScriptedResponse, ScriptedServer};
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use serde_json::{json, Value};

// =========================================================================
// Helpers
// =========================================================================

fn private_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap())
}

fn decrypt(ciphertext: &Value) -> String {
    let bytes = STANDARD.decode(ciphertext.as_str().unwrap()).unwrap();
    String::from_utf8(private_key().decrypt(Pkcs1v15Encrypt, &bytes).unwrap()).unwrap()
}

fn public_key_response(timestamp: i64) -> ScriptedResponse {
    let pem = private_key()
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap();
    ScriptedResponse::data(json!({ "rsapublickey": pem, "timestamp": timestamp }))
}

fn login_response(access_type: &str) -> ScriptedResponse {
    ScriptedResponse::data(json!({
        "usernumber": 302,
        "access_token": "tok-302",
        "accesstype": access_type,
        "security": { "pwdExpired": false },
    }))
}

fn service_for(server: &ScriptedServer, keys: KeyStore) -> AuthService {
    AuthService::builder()
        .base_url(server.base_url())
        .key_store(keys)
        .build()
        .unwrap()
}

// =========================================================================
// Login
// =========================================================================

#[tokio::test]
async fn test_mobile_login_persists_session() {
    let server =
        ScriptedServer::start(vec![public_key_response(1_700_000_000), login_response("13")]).await;
    let auth = service_for(&server, KeyStore::in_memory());

    let outcome = auth
        .login(LoginForm::new("302", "s3cret"), ClientType::Mobile)
        .await
        .unwrap();

    assert!(outcome.persisted);
    assert_eq!(outcome.grant.token, "tok-302");
    assert_eq!(outcome.grant.user, json!({ "userNumber": 302 }));
    assert_eq!(outcome.grant.permission_level, PermissionLevel::Web);
    assert_eq!(outcome.security, Some(json!({ "pwdExpired": false })));

    let session = auth.session();
    assert!(session.is_authenticated());
    assert_eq!(session.token.as_deref(), Some("tok-302"));
    assert_eq!(session.permission_level, PermissionLevel::Web);

    let requests = server.requests();
    assert_eq!(requests[0].path, PUBLIC_KEY_PATH);
    assert_eq!(requests[1].path, LOGIN_PATH);
    let body = requests[1].json();
    assert_eq!(body["accountname"], "302");
    assert_eq!(body["encrypttype"], 1);
    assert_eq!(decrypt(&body["accountpwd"]), "1700000000_s3cret");
    assert_eq!(requests[1].header("authorization"), None);
}

#[tokio::test]
async fn test_web_login_waits_for_commit() {
    let server = ScriptedServer::start(vec![public_key_response(1), login_response("00")]).await;
    let auth = service_for(&server, KeyStore::in_memory());

    let outcome = auth
        .login(LoginForm::new("302", "s3cret"), ClientType::Web)
        .await
        .unwrap();

    assert!(!outcome.persisted);
    assert!(!auth.session().is_authenticated());

    auth.commit_session(&outcome.grant);
    assert_eq!(auth.session().permission_level, PermissionLevel::Full);
}

#[tokio::test]
async fn test_login_remember_flag_controls_prefill() {
    let server = ScriptedServer::start(vec![
        public_key_response(1),
        login_response("00"),
        public_key_response(2),
        login_response("00"),
    ])
    .await;
    let auth = service_for(&server, KeyStore::in_memory());

    auth.login(LoginForm::new("302", "pw").remember(true), ClientType::Mobile)
        .await
        .unwrap();
    assert_eq!(
        auth.remembered_credential().unwrap(),
        Some(RememberedCredential::new("302", "pw"))
    );

    auth.login(LoginForm::new("302", "pw"), ClientType::Mobile)
        .await
        .unwrap();
    assert_eq!(auth.remembered_credential().unwrap(), None);
}

#[tokio::test]
async fn test_failed_login_persists_nothing() {
    let server = ScriptedServer::start(vec![
        public_key_response(1),
        ScriptedResponse::envelope(json!({ "error_code": "1001", "error_msg": "wrong password" })),
    ])
    .await;
    let auth = service_for(&server, KeyStore::in_memory());

    let err = auth
        .login(LoginForm::new("302", "bad").remember(true), ClientType::Mobile)
        .await
        .unwrap_err();

    let request_error = err.request_error().expect("request error");
    assert_eq!(request_error.kind(), RequestErrorKind::Application);
    assert_eq!(request_error.code().unwrap().as_str(), "1001");
    assert_eq!(err.to_string(), "wrong password");
    assert!(!auth.session().is_authenticated());
    assert_eq!(auth.remembered_credential().unwrap(), None);
}

#[tokio::test]
async fn test_unreachable_key_endpoint_fails_login() {
    let server = ScriptedServer::start(vec![ScriptedResponse::raw(503, "down")]).await;
    let auth = service_for(&server, KeyStore::in_memory());

    let err = auth
        .login(LoginForm::new("302", "pw"), ClientType::Mobile)
        .await
        .unwrap_err();

    assert!(matches!(err, GatehouseError::Cipher(_)));
    assert_eq!(err.to_string(), gatehouse::http::TRANSPORT_ERROR_MESSAGE);
    assert_eq!(server.request_count(), 1);
}

// =========================================================================
// Cross-tab session
// =========================================================================

#[tokio::test]
async fn test_login_in_other_tab_fires_token_change_once() {
    let server = ScriptedServer::start(vec![
        public_key_response(1),
        login_response("00"),
        public_key_response(2),
        ScriptedResponse::data(json!({
            "usernumber": 999,
            "access_token": "tok-999",
            "accesstype": "00",
        })),
    ])
    .await;
    let tab_a_keys = KeyStore::in_memory();
    let tab_a = service_for(&server, tab_a_keys.clone());
    let tab_b = service_for(&server, tab_a_keys.new_tab());
    let changes = Arc::new(AtomicUsize::new(0));
    tab_a.on_token_change({
        let changes = Arc::clone(&changes);
        move |change| {
            assert_eq!(change.old, "tok-302");
            assert_eq!(change.new, "tok-999");
            changes.fetch_add(1, Ordering::SeqCst);
        }
    });

    tab_a
        .login(LoginForm::new("302", "pw"), ClientType::Mobile)
        .await
        .unwrap();
    let _ = tab_a.session();
    tab_b
        .login(LoginForm::new("999", "pw"), ClientType::Mobile)
        .await
        .unwrap();

    assert_eq!(tab_a.session().token.as_deref(), Some("tok-999"));
    let _ = tab_a.session();
    assert_eq!(changes.load(Ordering::SeqCst), 1);
}

// =========================================================================
// Account operations
// =========================================================================

#[tokio::test]
async fn test_change_password_encrypts_both_with_one_key() {
    let server = ScriptedServer::start(vec![
        public_key_response(77),
        ScriptedResponse::data(json!(true)),
    ])
    .await;
    let auth = service_for(&server, KeyStore::in_memory());
    auth.commit_session(&SessionGrant {
        token: "tok".into(),
        user: json!({ "userNumber": 1 }),
        permission_level: PermissionLevel::Full,
    });

    let headers = [("X-Temp-Token".to_owned(), "temp".to_owned())].into();
    let result = auth
        .change_password(
            PasswordChange::new("new-pw", "old-pw").field("accountid", 0).field("userid", 1),
            headers,
        )
        .await
        .unwrap();

    assert_eq!(result, json!(true));
    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    let request = &requests[1];
    assert_eq!(request.path, PASSWORD_PATH);
    assert_eq!(request.header("authorization"), Some("Bearer tok"));
    assert_eq!(request.header("x-temp-token"), Some("temp"));
    let body = request.json();
    assert_eq!(decrypt(&body["accountpwd"]), "77_new-pw");
    assert_eq!(decrypt(&body["orginpwd"]), "77_old-pw");
    assert_eq!(body["encrypttype"], 1);
    assert_eq!(body["accountid"], 0);
    assert_eq!(body["userid"], 1);
}

#[tokio::test]
async fn test_register_user_encrypts_password() {
    let server =
        ScriptedServer::start(vec![public_key_response(5), ScriptedResponse::data(json!({}))])
            .await;
    let auth = service_for(&server, KeyStore::in_memory());

    auth.register_user(
        Registration::new("initial")
            .field("accountname", "10888008001")
            .field("accesstype", "00"),
    )
    .await
    .unwrap();

    let request = &server.requests()[1];
    assert_eq!(request.path, REGISTER_PATH);
    let body = request.json();
    assert_eq!(decrypt(&body["accountpwd"]), "5_initial");
    assert_eq!(body["accountname"], "10888008001");
    assert_eq!(body["encrypttype"], 1);
}

#[tokio::test]
async fn test_avatar_download_and_sso_requests() {
    let server = ScriptedServer::start(vec![
        ScriptedResponse::data(json!(null)),
        ScriptedResponse::data(json!("https://example.com/app.apk")),
        ScriptedResponse::data(json!({ "ok": true })),
    ])
    .await;
    let auth = service_for(&server, KeyStore::in_memory());

    auth.modify_avatar("file-9").await.unwrap();
    let url = auth.app_download_url().await.unwrap();
    auth.sso_login(&json!({ "signature": "af46", "usermobile": "100", "timestamp": "1" }))
        .await
        .unwrap();

    assert_eq!(url, json!("https://example.com/app.apk"));
    let requests = server.requests();
    assert_eq!(requests[0].path, "/api/account/modifyphoto");
    assert_eq!(requests[0].json(), json!({ "usericon": "file-9" }));
    assert_eq!(requests[1].method, "GET");
    assert_eq!(requests[1].path, "/api/account/downloadapp");
    assert_eq!(requests[2].path, "/api/xwlogin/crmLogin");
}

#[tokio::test]
async fn test_init_public_key_then_sync_encrypt() {
    let server = ScriptedServer::start(vec![public_key_response(1)]).await;
    let auth = service_for(&server, KeyStore::in_memory());

    auth.init_public_key().await.unwrap();
    let encrypted = auth
        .encrypt_password_sync(Credentials::Single("plain".into()))
        .unwrap()
        .into_vec();

    assert_eq!(decrypt(&json!(encrypted[0])), "plain");
}

// =========================================================================
// Realtime
// =========================================================================

#[tokio::test]
async fn test_connect_realtime_uses_session_token() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let msg = ws.next().await.unwrap().unwrap();
        let handshake = serde_json::from_str::<Value>(msg.to_text().unwrap()).unwrap();
        (handshake, ws)
    });
    let auth = AuthService::builder()
        .realtime(RealtimeConfig::default().with_endpoint(format!("ws://{addr}/ws/wechat")))
        .build()
        .unwrap();
    auth.commit_session(&SessionGrant {
        token: "rt-token".into(),
        user: json!({ "userNumber": 5 }),
        permission_level: PermissionLevel::Full,
    });

    let channel = auth.connect_realtime(5).await.unwrap();
    let (handshake, _ws) = server.await.unwrap();

    assert_eq!(channel.state(), ChannelState::Open);
    assert_eq!(
        handshake,
        json!({ "Cmd": 1, "data": { "userid": 5, "authorizedcode": "Bearer rt-token" } })
    );

    auth.disconnect_realtime().await.unwrap();
    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(auth.realtime().state(), ChannelState::Idle);
}
