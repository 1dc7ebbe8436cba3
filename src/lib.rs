#![forbid(unsafe_code)]

//! Library side of tubegrab: formatting helpers, the stream catalog
//! normalizer, and the orchestration that sits between the HTTP backend and
//! the external `yt-dlp`/`ffmpeg` tools.

pub mod api;
pub mod config;
pub mod error;
pub mod format;
pub mod process;
pub mod provider;
pub mod service;
pub mod streams;
pub mod transcoder;
