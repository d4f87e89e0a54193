//! End-to-end tests for the session hook over both backends.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use varsclip_client::{
    Backend, ClientConfig, ClientError, HttpBackend, LoopbackBackend, Notice, SessionHook,
    SessionSnapshot,
};
use varsclip_core::{Config, Credentials, FileUpload, ItemKind, SessionService};
use varsclip_protocol::{CleanupSessionRequest, UpdateSettingsRequest, VerifySessionRequest};
use varsclip_server::{ServerConfig, VarsclipServer};

const PASSWORD: &str = "CorrectHorse42";

fn core_config() -> Config {
    Config::new().with_password_iterations(1_000)
}

fn verify(code: &str, password: Option<&str>) -> VerifySessionRequest {
    VerifySessionRequest {
        session_code: code.into(),
        password: password.map(str::to_string),
        ..Default::default()
    }
}

async fn wait_until(
    rx: &mut watch::Receiver<SessionSnapshot>,
    what: &str,
    check: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    match tokio::time::timeout(Duration::from_secs(5), rx.wait_for(check)).await {
        Ok(Ok(snapshot)) => snapshot.clone(),
        _ => panic!("timed out waiting for {what}"),
    }
}

#[tokio::test]
async fn loopback_shared_session() {
    let service = Arc::new(SessionService::in_memory(core_config()));
    let backend: Arc<dyn Backend> = Arc::new(LoopbackBackend::new(Arc::clone(&service)));

    let created = backend.verify_session(verify("frdna", None)).await.unwrap();
    assert!(created.created);
    assert!(created.is_public);
    assert!(created.token.is_none());

    let mut alice = SessionHook::open(Arc::clone(&backend), "frdna", Credentials::none())
        .await
        .unwrap();
    let bob = SessionHook::open(Arc::clone(&backend), "frdna", Credentials::none())
        .await
        .unwrap();
    let mut alice_view = alice.watch();
    let mut bob_view = bob.watch();
    let mut alice_notices = alice.notices().unwrap();
    assert!(alice.notices().is_none());

    wait_until(&mut alice_view, "two peers", |s| s.peers == 2).await;

    // Whitespace never reaches the server.
    assert!(alice.add_text("   \n").await.unwrap().is_none());

    alice.add_text("hello").await.unwrap();
    let seen = wait_until(&mut bob_view, "text", |s| s.text().is_some()).await;
    assert_eq!(seen.text().unwrap().content.as_deref(), Some("hello"));

    bob.add_text("hello, world").await.unwrap();
    let seen = wait_until(&mut alice_view, "updated text", |s| {
        s.text().and_then(|t| t.content.as_deref()) == Some("hello, world")
    })
    .await;
    assert_eq!(seen.items.len(), 1);

    let png = FileUpload::new("pixel.png", "image/png", vec![0x89, b'P', b'N', b'G']);
    let image = alice.add_file(png).await.unwrap();
    assert_eq!(image.kind, ItemKind::Image);
    assert_eq!(
        alice_notices.recv().await.unwrap(),
        Notice::Info("Uploaded pixel.png".into())
    );
    wait_until(&mut bob_view, "image", |s| s.items.len() == 2).await;

    let bad = FileUpload::new("run.exe", "application/x-msdownload", vec![0; 4]);
    let err = alice.add_file(bad).await.unwrap_err();
    assert!(matches!(err, ClientError::Invalid(_)));
    assert!(matches!(alice_notices.recv().await, Some(Notice::Error(_))));

    bob.remove_item(image.id).await.unwrap();
    wait_until(&mut alice_view, "image removed", |s| s.items.len() == 1).await;

    assert_eq!(alice.clear_text().await.unwrap(), 1);
    wait_until(&mut bob_view, "text cleared", |s| s.items.is_empty()).await;

    drop(bob);
    wait_until(&mut alice_view, "one peer", |s| s.peers == 1).await;

    backend
        .cleanup_session(CleanupSessionRequest {
            session_code: "frdna".into(),
            force_delete: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let last = wait_until(&mut alice_view, "close", |s| s.closed).await;
    assert!(!last.connected);
    assert_eq!(
        alice_notices.recv().await.unwrap(),
        Notice::Info("This session has been deleted".into())
    );

    let overview = service.admin_overview(&Credentials::admin()).unwrap();
    assert!(overview.sessions.is_empty());
}

#[tokio::test]
async fn failed_delete_with_revoked_token() {
    let service = Arc::new(SessionService::in_memory(core_config()));
    let backend: Arc<dyn Backend> = Arc::new(LoopbackBackend::new(service));
    let access = backend
        .verify_session(verify("vault", Some(PASSWORD)))
        .await
        .unwrap();
    let creds = Credentials::none().with_token(access.token.clone());

    let hook = SessionHook::open(Arc::clone(&backend), "vault", creds)
        .await
        .unwrap();
    let item = hook.add_text("secret").await.unwrap().unwrap();
    let mut view = hook.watch();
    wait_until(&mut view, "text", |s| s.text().is_some()).await;

    // Rotating the password revokes the hook's token.
    backend
        .update_settings(UpdateSettingsRequest {
            session_code: "vault".into(),
            token: access.token,
            new_password: Some("AnotherHorse77".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let err = hook.remove_item(item.id).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    // The optimistic removal could not be reconciled either, so the item
    // stays gone locally until a successful reload.
    assert!(hook.snapshot().items.is_empty());
}

#[tokio::test]
async fn protected_session_requires_token() {
    let service = Arc::new(SessionService::in_memory(core_config()));
    let backend: Arc<dyn Backend> = Arc::new(LoopbackBackend::new(service));
    backend
        .verify_session(verify("vault", Some(PASSWORD)))
        .await
        .unwrap();

    let err = SessionHook::open(Arc::clone(&backend), "vault", Credentials::none())
        .await
        .unwrap_err();
    assert!(err.requires_password());

    let err = backend
        .verify_session(verify("vault", Some("WrongHorse42x")))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), "Invalid password");
}

async fn start_server(admin_secret: &str) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let config = ServerConfig::default()
        .with_admin_secret(admin_secret)
        .with_core(core_config().with_public_base_url(base.clone()));
    let server = VarsclipServer::new(config).unwrap();
    let handle = tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });
    (base, handle)
}

#[tokio::test]
async fn http_end_to_end() {
    let (base, server) = start_server("s3cret").await;
    let http = HttpBackend::new(ClientConfig::new(&base).with_client_label("it")).unwrap();
    http.health().await.unwrap();
    let backend: Arc<dyn Backend> = Arc::new(http.clone());

    let access = backend
        .verify_session(verify("vault", Some(PASSWORD)))
        .await
        .unwrap();
    assert!(!access.is_public);
    let creds = Credentials::none().with_token(access.token.clone());

    let writer = SessionHook::open(Arc::clone(&backend), "vault", creds.clone())
        .await
        .unwrap();
    let reader = SessionHook::open(Arc::clone(&backend), "vault", creds.clone())
        .await
        .unwrap();
    let mut reader_view = reader.watch();
    wait_until(&mut reader_view, "two peers", |s| s.peers == 2).await;

    writer.add_text("over the wire").await.unwrap();
    wait_until(&mut reader_view, "text", |s| s.text().is_some()).await;

    let upload = FileUpload::new("notes.txt", "text/plain", b"line one\n".to_vec());
    let item = writer.add_file(upload).await.unwrap();
    let file = item.file.clone().unwrap();
    assert!(file.url.starts_with(&format!("{base}/files/")));
    assert!(file.url.contains("signature="));
    assert_eq!(http.download(&file.url).await.unwrap(), b"line one\n");

    let unsigned = file.url.split('?').next().unwrap().to_string();
    let err = http.download(&unsigned).await.unwrap_err();
    assert_eq!(err.status(), Some(401));

    let info = backend.session_info("vault").await.unwrap();
    assert!(!info.is_public);

    let admin = HttpBackend::new(ClientConfig::new(&base).with_admin_secret("s3cret")).unwrap();
    let overview = admin.admin_data().await.unwrap();
    assert_eq!(overview.sessions.len(), 1);
    assert_eq!(overview.sessions[0].stats.file_items, 1);
    assert!(overview
        .recent_activity
        .iter()
        .any(|event| event.action == "session_accessed"));

    let err = http.admin_data().await.unwrap_err();
    assert!(matches!(err, ClientError::Invalid(_)));

    admin
        .cleanup_session(CleanupSessionRequest {
            session_code: "vault".into(),
            force_delete: true,
            ..Default::default()
        })
        .await
        .unwrap();
    wait_until(&mut reader_view, "close", |s| s.closed).await;

    let err = backend.session_info("vault").await.unwrap_err();
    assert_eq!(err.status(), Some(404));

    drop(writer);
    drop(reader);
    server.abort();
}
