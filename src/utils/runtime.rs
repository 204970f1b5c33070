use anyhow::Result;

/// Every component runs on one thread. Timers and network calls are the only suspension points.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
