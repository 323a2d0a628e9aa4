pub mod client;

pub use client::{DownloadEntry, Downloader, HttpDownloader};

#[cfg(test)]
pub mod testing;
