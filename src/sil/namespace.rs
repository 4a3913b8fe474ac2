//! Compact descriptions of which elements of a SIL collection are selected.
//!
//! A namespace either lists its elements explicitly or, when they form one
//! contiguous run, stores only the inclusive bounds.

use crate::error::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};

const WIRE_ENUMERATED: i32 = 1;
const WIRE_RANGE: i32 = 2;

/// Inclusive `[min_range, max_range]` run of elements backed by one set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilRangeNamespace {
    set_index: i32,
    min_range: i32,
    max_range: i32,
}

impl SilRangeNamespace {
    /// A namespace with `min > max` contains nothing.
    pub fn new(set_index: i32, min_range: i32, max_range: i32) -> Self {
        Self {
            set_index,
            min_range,
            max_range,
        }
    }

    pub fn set_index(&self) -> i32 {
        self.set_index
    }

    pub fn min_range(&self) -> i32 {
        self.min_range
    }

    pub fn max_range(&self) -> i32 {
        self.max_range
    }

    #[inline]
    pub fn contains_element(&self, element: i32) -> bool {
        self.min_range <= element && element <= self.max_range
    }

    pub fn elements(&self) -> Vec<i32> {
        (self.min_range..=self.max_range).collect()
    }

    pub fn len(&self) -> usize {
        if self.min_range > self.max_range {
            0
        } else {
            (self.max_range as i64 - self.min_range as i64 + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Explicit sorted, de-duplicated element list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilEnumeratedNamespace {
    elements: Vec<i32>,
}

impl SilEnumeratedNamespace {
    pub fn new(elements: impl IntoIterator<Item = i32>) -> Self {
        let mut elements: Vec<i32> = elements.into_iter().collect();
        elements.sort_unstable();
        elements.dedup();
        Self { elements }
    }

    pub fn contains_element(&self, element: i32) -> bool {
        self.elements.binary_search(&element).is_ok()
    }

    pub fn elements(&self) -> &[i32] {
        &self.elements
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SilNamespace {
    Enumerated(SilEnumeratedNamespace),
    Range(SilRangeNamespace),
}

impl SilNamespace {
    pub fn enumerated(elements: impl IntoIterator<Item = i32>) -> Self {
        SilNamespace::Enumerated(SilEnumeratedNamespace::new(elements))
    }

    pub fn range(set_index: i32, min: i32, max: i32) -> Self {
        SilNamespace::Range(SilRangeNamespace::new(set_index, min, max))
    }

    pub fn contains_element(&self, element: i32) -> bool {
        match self {
            SilNamespace::Enumerated(ns) => ns.contains_element(element),
            SilNamespace::Range(ns) => ns.contains_element(element),
        }
    }

    pub fn elements(&self) -> Vec<i32> {
        match self {
            SilNamespace::Enumerated(ns) => ns.elements().to_vec(),
            SilNamespace::Range(ns) => ns.elements(),
        }
    }

    /// Elements selected by both. Two ranges over the same set stay a range;
    /// ranges over different sets share nothing.
    pub fn intersect(&self, other: &SilNamespace) -> SilNamespace {
        match (self, other) {
            (SilNamespace::Range(a), SilNamespace::Range(b)) => {
                if a.set_index == b.set_index {
                    SilNamespace::range(
                        a.set_index,
                        a.min_range.max(b.min_range),
                        a.max_range.min(b.max_range),
                    )
                } else {
                    SilNamespace::enumerated([])
                }
            }
            (SilNamespace::Range(r), SilNamespace::Enumerated(e))
            | (SilNamespace::Enumerated(e), SilNamespace::Range(r)) => SilNamespace::enumerated(
                e.elements().iter().copied().filter(|&x| r.contains_element(x)),
            ),
            (SilNamespace::Enumerated(a), SilNamespace::Enumerated(b)) => SilNamespace::enumerated(
                a.elements().iter().copied().filter(|&x| b.contains_element(x)),
            ),
        }
    }

    /// True when every element of `self` is also in `other`.
    pub fn is_subset_of(&self, other: &SilNamespace) -> bool {
        match (self, other) {
            (SilNamespace::Range(a), _) if a.is_empty() => true,
            (SilNamespace::Range(a), SilNamespace::Range(b)) => {
                a.set_index == b.set_index && b.min_range <= a.min_range && a.max_range <= b.max_range
            }
            (SilNamespace::Range(a), SilNamespace::Enumerated(b)) => {
                // Never walk a run longer than the list it must fit in.
                a.len() <= b.elements().len()
                    && (a.min_range..=a.max_range).all(|x| b.contains_element(x))
            }
            (SilNamespace::Enumerated(a), _) => a.elements().iter().all(|&x| other.contains_element(x)),
        }
    }

    /// Flat integer form: `[1, n, e0..en]` or `[2, set, min, max]`.
    pub fn to_wire(&self) -> Vec<i32> {
        match self {
            SilNamespace::Enumerated(ns) => {
                let mut out = Vec::with_capacity(ns.elements.len() + 2);
                out.push(WIRE_ENUMERATED);
                out.push(ns.elements.len() as i32);
                out.extend_from_slice(&ns.elements);
                out
            }
            SilNamespace::Range(ns) => vec![WIRE_RANGE, ns.set_index, ns.min_range, ns.max_range],
        }
    }

    pub fn from_wire(words: &[i32]) -> FlowResult<Self> {
        match words {
            [WIRE_ENUMERATED, n, rest @ ..] if *n >= 0 && rest.len() == *n as usize => {
                Ok(SilNamespace::enumerated(rest.iter().copied()))
            }
            [WIRE_RANGE, set, min, max] => Ok(SilNamespace::range(*set, *min, *max)),
            _ => Err(FlowError::Wire(format!(
                "malformed SIL namespace ({} words)",
                words.len()
            ))),
        }
    }
}
