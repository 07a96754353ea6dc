// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module provides the bit-level primitives shared by all symbologies.

mod bit;

pub use bit::{BitArray, BitBuffer, BitReader};
