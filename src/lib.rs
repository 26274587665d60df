//! Downloads tracks, albums, playlists and podcast episodes from Deezer.
//!
//! A [`Downloader`](downloader::Downloader) session resolves a playable
//! source for each track, walking down the quality ladder when a tier
//! cannot be served, decrypts the stream straight to disk, and tags the
//! result. Albums and playlists are downloaded track by track; a track that
//! fails is recorded in the batch summary without stopping the others.
//!
//! Progress is reported as [`Event`](events::Event)s to a
//! [`Reporter`](events::Reporter) chosen per session.
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod api;
pub mod archive;
pub mod arl;
pub mod catalog;
pub mod config;
pub mod context;
pub mod convert;
pub mod cover;
pub mod crosswalk;
pub mod decrypt;
pub mod downloader;
pub mod engine;
pub mod error;
pub mod events;
pub mod fetch;
pub mod gateway;
pub mod http;
pub mod inflight;
pub mod item;
pub mod link;
pub mod m3u;
pub mod metadata;
pub mod orchestrate;
pub mod path;
pub mod preferences;
pub mod protocol;
pub mod quality;
pub mod resolver;
pub mod skip;
pub mod tagging;
pub mod track;
pub mod writer;
