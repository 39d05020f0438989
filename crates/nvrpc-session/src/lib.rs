//! msgpack-RPC client session.
//!
//! Layers, bottom up:
//! - [`message`]: the request / response / notification shapes over
//!   [`nvrpc_codec::Value`]
//! - [`store`]: id issuance and pending-call bookkeeping
//! - [`session`]: the public call surface plus the read loop that feeds it
//!
//! ```no_run
//! # async fn demo() -> nvrpc_session::Result<()> {
//! use nvrpc_session::{Session, SessionConfig};
//!
//! let (inbound, writer) = nvrpc_transport::connect("/tmp/nvim.sock").await?;
//! let (session, mut notifications, driver) =
//!     Session::new(inbound, writer, SessionConfig::default());
//! tokio::spawn(driver.run());
//!
//! let info = session.call("nvim_get_api_info", vec![]).await?;
//! println!("{info}");
//! while let Some(batch) = notifications.recv().await {
//!     for notification in batch {
//!         println!("{}", notification.method);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod store;

pub use config::{OverflowPolicy, SessionConfig, DEFAULT_NOTIFICATION_CAPACITY, MAX_REQUEST_ID_CEILING};
pub use error::{FrameError, RemoteError, Result, SessionError};
pub use message::{
    Message, Notification, Outcome, Request, RequestId, Response, NOTIFICATION, REQUEST, RESPONSE,
};
pub use session::{Driver, Notifications, Session};
pub use store::{Callback, Completion, CorrelationStore, StoreClosed};
