// SPDX-License-Identifier: GPL-3.0-only

//! Hardware backends
//!
//! - [`camera`]: still-photo camera backends (V4L2 and a synthetic camera)

pub mod camera;
