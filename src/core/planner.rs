//! Quota-aware allocation planning.

use serde::{Deserialize, Serialize};

use crate::core::error::PlannerError;

/// Outcome of planning one create cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationPlan {
    /// Request this many new resources (always > 0).
    Allocate(u32),
    /// Nothing to do: the pool is full.
    AtCapacity {
        /// Active resources.
        active: u32,
        /// Configured ceiling.
        max: u32,
    },
    /// Nothing possible: below capacity but no quota left.
    NoQuota {
        /// Active resources.
        active: u32,
        /// Configured ceiling.
        max: u32,
    },
}

impl AllocationPlan {
    /// Number of resources to request; zero for both idle variants.
    #[must_use]
    pub const fn to_allocate(self) -> u32 {
        match self {
            Self::Allocate(n) => n,
            Self::AtCapacity { .. } | Self::NoQuota { .. } => 0,
        }
    }

    /// Convert the idle variants into planner errors for `tag`.
    pub fn into_result(self, tag: &str) -> Result<u32, PlannerError> {
        match self {
            Self::Allocate(n) => Ok(n),
            Self::AtCapacity { active, max } => Err(PlannerError::AtCapacity {
                tag: tag.to_string(),
                active,
                max,
            }),
            Self::NoQuota { active, max } => Err(PlannerError::NoQuota {
                tag: tag.to_string(),
                active,
                max,
            }),
        }
    }
}

/// `clamp(max_allocation - current_active, 0, remaining_quota)`, labelled by
/// why it is zero when it is.
#[must_use]
pub const fn plan_allocation(
    max_allocation: u32,
    current_active: u32,
    remaining_quota: u32,
) -> AllocationPlan {
    if current_active >= max_allocation {
        return AllocationPlan::AtCapacity {
            active: current_active,
            max: max_allocation,
        };
    }
    if remaining_quota == 0 {
        return AllocationPlan::NoQuota {
            active: current_active,
            max: max_allocation,
        };
    }
    let headroom = max_allocation - current_active;
    let n = if headroom < remaining_quota {
        headroom
    } else {
        remaining_quota
    };
    AllocationPlan::Allocate(n)
}
