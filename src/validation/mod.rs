// © 2024-2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod poller;
mod source;

pub use poller::{FallbackPolicy, FieldOutcome, PollOutcome, PollReport, ValidationPoller};
pub use source::{CountKind, CountSource, FetchError, HttpCountSource, parse_count};
