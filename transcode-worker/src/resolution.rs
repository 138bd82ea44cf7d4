//! Target resolution planning for quality standards
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use std::fmt;
use transcoder_types::QualityStandard;

/// Output frame size passed to the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Plan the target geometry for a named standard
///
/// Returns `None` for an unknown standard name; callers must fail the job
/// rather than encode at source resolution.
pub fn plan_resolution(standard: &str, source_width: u32, source_height: u32) -> Option<Geometry> {
    QualityStandard::from_name(standard)
        .map(|standard| plan_for_standard(standard, source_width, source_height))
}

/// The long edge (width when landscape, height otherwise) takes the tier's
/// pixel target; the short edge keeps the source aspect ratio and is forced
/// even by decrementing.
pub fn plan_for_standard(standard: QualityStandard, source_width: u32, source_height: u32) -> Geometry {
    let target_long = standard.long_edge();
    let landscape = source_width > source_height;
    let (long_source, short_source) = if landscape {
        (source_width, source_height)
    } else {
        (source_height, source_width)
    };

    let scaled = f64::from(target_long) * f64::from(short_source) / f64::from(long_source);
    let short = make_even(scaled.round() as u32).max(2);

    if landscape {
        Geometry::new(target_long, short)
    } else {
        Geometry::new(short, target_long)
    }
}

fn make_even(value: u32) -> u32 {
    if value % 2 != 0 {
        value - 1
    } else {
        value
    }
}
