//! One-shot commands that do not start a session.

use crate::app::bridge_client;
use bridge_relay::BridgeApi;
use chrono::Utc;
use console_config_and_utils::{Config, Paths};
use contact_cache::{ContactCache, FileCacheStorage};

pub async fn print_status(
    config: &Config,
    tenant_id: &str,
    access_token: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = bridge_client(config, access_token.as_deref());
    let report = client.probe_status(tenant_id).await?;

    println!("Status: {}", report.status.as_str());
    if let Some(qr) = report.qr_code {
        println!("QR code: {}", qr);
    }
    Ok(())
}

pub async fn print_pairing_code(
    config: &Config,
    tenant_id: &str,
    phone: &str,
    access_token: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err("phone number is required".into());
    }

    let client = bridge_client(config, access_token.as_deref());
    let code = client.request_pairing_code(tenant_id, phone).await?;
    println!("Pairing code: {}", code);
    Ok(())
}

fn open_cache(paths: &Paths) -> Result<ContactCache, Box<dyn std::error::Error>> {
    Ok(ContactCache::new(Box::new(FileCacheStorage::new(
        paths.cache_dir(),
    )?)))
}

pub fn show_cache(paths: &Paths, user_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let cache = open_cache(paths)?;
    let flags = cache.flags(user_id)?;

    let Some(bundle) = cache.load(user_id)? else {
        println!("No cached contacts for {}", user_id);
        return Ok(());
    };

    let age = Utc::now().signed_duration_since(bundle.captured_at);
    println!(
        "{} contacts cached {}s ago (fetched: {})",
        bundle.len(),
        age.num_seconds(),
        flags.contacts_fetched
    );
    println!("{}", serde_json::to_string_pretty(&bundle.contacts)?);
    Ok(())
}

pub fn clear_cache(paths: &Paths, user_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    open_cache(paths)?.clear(user_id)?;
    println!("Cleared cached contacts for {}", user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contact_types::{Contact, ContactBundle};
    use tempfile::tempdir;

    #[test]
    fn test_clear_cache_removes_bundle() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let cache = open_cache(&paths).unwrap();
        cache
            .store("u1", &ContactBundle::capture(vec![Contact::new("A", "chat-A")]))
            .unwrap();

        clear_cache(&paths, "u1").unwrap();

        assert!(open_cache(&paths).unwrap().load("u1").unwrap().is_none());
    }
}
