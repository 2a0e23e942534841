// SPDX-License-Identifier: GPL-3.0-only

//! Acquisition backends

pub mod capture;
