pub mod beat_sync;
pub mod bundle_io;
pub mod clock;
pub mod color;
pub mod config;
pub mod console_display;
pub mod engine;
pub mod error;
pub mod keyboard;
pub mod population;
pub mod render;
pub mod synth;
pub mod timeline;
pub mod types;
