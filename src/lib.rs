// src/lib.rs

//! Railbox Export Library
//!
//! Pulls the loaded-box listing from the rail logistics portal, filters the
//! day's train codes and downloads the matching spreadsheet export, then
//! splits it per booking partner.

pub mod auth;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod sheet;
pub mod utils;
