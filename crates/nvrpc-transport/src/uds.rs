use std::path::Path;

use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{chunk_stream, IoWriter};

/// Inbound half of a Unix domain socket channel.
pub type UnixReader = ReaderStream<OwnedReadHalf>;
/// Outbound half of a Unix domain socket channel.
pub type UnixWriter = IoWriter<OwnedWriteHalf>;
/// Both halves of a channel over a connected Unix domain socket.
pub type UnixChannel = (UnixReader, UnixWriter);

/// Connect to a listening Unix domain socket, e.g. one opened with
/// `nvim --listen /path/to/nvim.sock`.
pub async fn connect(path: impl AsRef<Path>) -> Result<UnixChannel> {
    let path = path.as_ref();
    let stream = UnixStream::connect(path)
        .await
        .map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
    debug!(?path, "connected to unix domain socket");

    let (read, write) = stream.into_split();
    Ok((chunk_stream(read), IoWriter::new(write)))
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    use super::*;
    use crate::traits::ChannelWriter;

    fn sock_path(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "nvrpc-uds-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("test.sock")
    }

    #[tokio::test]
    async fn connect_and_exchange_bytes() {
        let path = sock_path("exchange");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"ping");
            stream.write_all(b"pong").await.unwrap();
        });

        let (mut inbound, mut writer) = connect(&path).await.unwrap();
        writer.write(bytes::Bytes::from_static(b"ping")).await.unwrap();

        let mut received = Vec::new();
        while received.len() < 4 {
            let chunk = inbound.next().await.unwrap().unwrap();
            received.extend_from_slice(&chunk);
        }
        assert_eq!(received, b"pong");

        server.await.unwrap();
        assert!(inbound.next().await.is_none());
        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[tokio::test]
    async fn connect_missing_socket_fails() {
        let path = sock_path("missing");
        let err = connect(&path).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }
}
