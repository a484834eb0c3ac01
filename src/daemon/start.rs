use crate::config::config::Config;

pub fn print_banner(config: &Config) {
    let ascii_art = format!(
        r#"
      __    __           __       __
     / /_  / /___  _____/ /______/ /
    / __ \/ / __ \/ ___/ //_/ __  /
   / /_/ / / /_/ / /__/ ,< / /_/ /
  /_.___/_/\____/\___/_/|_|\__,_/

blockd v{}
managing container "{}" (console {}:{})
"#,
        config.get_version(),
        config.container.name,
        config.console.host,
        config.console.port.unwrap_or_default(),
    );

    println!("{}", ascii_art);
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
