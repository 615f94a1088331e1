//! Isometric viewport engine.
//!
//! * [`world`]    – the data drawn: height map, sprite bank, signs.
//! * [`engine`]   – projection, per-pass sprite collection, depth sorting,
//!   compositing and dirty-rect invalidation.
//! * [`renderer`] – the pixel sink ([`renderer::Blitter`]) and a software
//!   implementation.
//! * [`config`]   – viewport settings loaded from TOML.

pub mod config;
pub mod engine;
pub mod renderer;
pub mod world;
