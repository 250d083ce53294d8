use std::path::{Path, PathBuf};

use docsync::prelude::*;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Share directory used when `DOCSYNC_CONTENT_DIR` is not set.
const DEFAULT_CONTENT_DIR: &str = "./share";

/// Loads the server config from `path`, or the defaults if there is none.
///
/// Missing fields in the file fall back to their defaults.
fn load_config(path: Option<&Path>) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(ServerConfig::default());
    };
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Applies environment overrides on top of a loaded config.
fn apply_overrides(mut config: ServerConfig, bind: Option<String>) -> ServerConfig {
    if let Some(bind) = bind {
        config.bind = bind;
    }
    config
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = apply_overrides(
        load_config(config_path.as_deref())?,
        std::env::var("DOCSYNC_BIND").ok(),
    );
    let content_dir = std::env::var("DOCSYNC_CONTENT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONTENT_DIR));

    tracing::info!(
        bind = %config.bind,
        content_dir = %content_dir.display(),
        "starting share server"
    );

    let server = SyncServerBuilder::from_config(config)
        .build(DirectoryContentProvider::new(content_dir))
        .await?;

    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("share-server-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_config_defaults_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = scratch_dir("config");
        let path = dir.join("server.json");
        std::fs::write(&path, r#"{ "bind": "0.0.0.0:9999", "room": { "echo_to_sender": false } }"#)
            .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.bind, "0.0.0.0:9999");
        assert!(!config.room.echo_to_sender);
    }

    #[test]
    fn test_load_config_rejects_bad_json() {
        let dir = scratch_dir("bad-config");
        let path = dir.join("server.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_bind_override() {
        let config = apply_overrides(ServerConfig::default(), Some("0.0.0.0:1".into()));
        assert_eq!(config.bind, "0.0.0.0:1");

        let config = apply_overrides(ServerConfig::default(), None);
        assert_eq!(config.bind, "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_serves_document_from_share_directory() {
        let root = scratch_dir("content");
        std::fs::create_dir_all(root.join("doc-42")).unwrap();
        std::fs::write(root.join("doc-42").join("Notes.md"), "# Notes\n").unwrap();

        let config = apply_overrides(ServerConfig::default(), Some("127.0.0.1:0".into()));
        let server = SyncServerBuilder::from_config(config)
            .build(DirectoryContentProvider::new(&root))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let (mut ws, _) =
            tokio_tungstenite::connect_async(format!("ws://{addr}/share/ws/doc-42"))
                .await
                .unwrap();
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout")
            .unwrap()
            .unwrap();
        match msg {
            Message::Binary(data) => assert_eq!(decode_seed(&data).unwrap(), "# Notes\n"),
            other => panic!("expected seed frame, got {other:?}"),
        }
    }
}
