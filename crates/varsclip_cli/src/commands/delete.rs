//! Delete command implementation.

use varsclip_client::{Backend, ClientConfig, HttpBackend};
use varsclip_protocol::CleanupSessionRequest;

/// Force-deletes a session using admin credentials.
pub async fn run(server: &str, secret: &str, code: &str) -> Result<(), Box<dyn std::error::Error>> {
    let backend = HttpBackend::new(ClientConfig::new(server).with_admin_secret(secret))?;
    let response = backend
        .cleanup_session(CleanupSessionRequest {
            session_code: code.to_string(),
            force_delete: true,
            ..Default::default()
        })
        .await?;

    println!(
        "{}: {} ({} items, {} files)",
        code, response.message, response.items, response.files
    );
    Ok(())
}
