//! `shardfetch stop` – signal a running `shardfetch run` to stop dispatching.

use anyhow::Result;

use crate::cli::control_socket;

pub async fn run_stop() -> Result<()> {
    let path = shardfetch_core::control::default_control_socket_path()?;
    if control_socket::send_stop(&path).await? {
        println!("Stop requested; in-flight downloads will finish first.");
    } else {
        println!("No run in progress.");
    }
    Ok(())
}
