//! Admin command implementation.

use varsclip_client::{ClientConfig, HttpBackend};
use varsclip_core::AdminOverview;

/// Fetches and prints the admin overview.
pub async fn run(server: &str, secret: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let backend = HttpBackend::new(ClientConfig::new(server).with_admin_secret(secret))?;
    let overview = backend.admin_data().await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&overview)?),
        "text" => print!("{}", render_text(&overview)),
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}

fn render_text(overview: &AdminOverview) -> String {
    let mut out = String::new();
    out.push_str(&format!("Sessions ({})\n", overview.sessions.len()));
    for summary in &overview.sessions {
        let info = &summary.info;
        let stats = &summary.stats;
        let expires = info
            .expires_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".into());
        out.push_str(&format!(
            "  {:<20} {:<9} expires {:<16} items {}/{}/{} bytes {:>9} visitors {} peers {}\n",
            info.code,
            if info.is_public { "public" } else { "protected" },
            expires,
            stats.text_items,
            stats.image_items,
            stats.file_items,
            stats.total_data_bytes,
            stats.unique_visitors,
            stats.peers,
        ));
    }

    out.push_str(&format!("\nRecent activity ({})\n", overview.recent_activity.len()));
    for event in &overview.recent_activity {
        out.push_str(&format!(
            "  {} {:<20} {:<15} {}\n",
            event.created_at.format("%Y-%m-%d %H:%M:%S"),
            event.action,
            event.ip_address,
            event.user_agent,
        ));
    }
    out
}
