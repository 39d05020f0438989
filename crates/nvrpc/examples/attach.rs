//! Attach to a running Neovim and print a few things about it.
//!
//! ```text
//! nvim --listen /tmp/nvim.sock
//! cargo run -p nvrpc --example attach -- /tmp/nvim.sock
//! ```
//!
//! The socket path falls back to `$NVIM_LISTEN_ADDRESS`.

#[cfg(unix)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use nvrpc::{Session, SessionConfig, Value};

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("NVIM_LISTEN_ADDRESS").ok())
        .ok_or("usage: attach <socket-path>")?;

    let (inbound, writer) = nvrpc::transport::connect(&path).await?;
    let (session, _notifications, driver) =
        Session::new(inbound, writer, SessionConfig::default());
    tokio::spawn(driver.run());

    let info = session.call("nvim_get_api_info", vec![]).await?;
    if let Value::Array(items) = &info {
        println!("channel id: {}", items.first().unwrap_or(&Value::Nil));
    }

    let version = session
        .call("nvim_eval", vec![Value::from("v:version")])
        .await?;
    println!("v:version: {version}");

    let line = session.call("nvim_get_current_line", vec![]).await?;
    println!("current line: {line}");

    if let Ok(json) = line.to_json() {
        println!("as json: {json}");
    }

    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("attach needs Unix domain sockets");
}
