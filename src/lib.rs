//! nspd: an interactive viewer for the spectra a correlator spectrum server
//! hands out, one page of per-baseline spectra (SPD) at a time, or a
//! running time series of reduced visibilities and system data (VIS).

pub mod args;
pub mod averaging;
pub mod canvas;
pub mod codec;
pub mod command;
pub mod controls;
pub mod cycles;
pub mod device;
pub mod error;
pub mod geometry;
pub mod header;
pub mod logging;
pub mod network;
pub mod plot;
pub mod protocol;
pub mod read;
pub mod session;
pub mod spd;
pub mod spectrum;
pub mod syscal;
pub mod terminal;
pub mod utils;
pub mod vis;

pub use error::{NspdError, Result};
