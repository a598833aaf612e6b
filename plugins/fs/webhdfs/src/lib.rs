//! `DistributedFs` over the WebHDFS REST protocol.

mod client;
mod response;

pub use client::WebHdfsClient;
