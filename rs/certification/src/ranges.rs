use candid::Principal;
use serde::{Deserialize, Serialize};

/// An inclusive range of canister ids a subnet is authorized to certify.
///
/// Principals are compared as unsigned byte strings. The derived ordering
/// of `Principal` is not used because it compares lengths first.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(from = "(Principal, Principal)", into = "(Principal, Principal)")]
pub struct PrincipalRange {
    pub low: Principal,
    pub high: Principal,
}

impl PrincipalRange {
    pub fn new(low: Principal, high: Principal) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, principal: &Principal) -> bool {
        let principal = principal.as_slice();
        self.low.as_slice() <= principal && principal <= self.high.as_slice()
    }
}

impl From<(Principal, Principal)> for PrincipalRange {
    fn from((low, high): (Principal, Principal)) -> Self {
        Self { low, high }
    }
}

impl From<PrincipalRange> for (Principal, Principal) {
    fn from(range: PrincipalRange) -> Self {
        (range.low, range.high)
    }
}

/// Returns whether `principal` lies within at least one of `ranges`.
pub fn principal_is_within_ranges(principal: &Principal, ranges: &[PrincipalRange]) -> bool {
    ranges.iter().any(|range| range.contains(principal))
}
