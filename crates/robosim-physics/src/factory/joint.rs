//! Joint construction from descriptions.

use std::collections::BTreeMap;

use nalgebra::{Unit, Vector3};
use robosim_description::{JointDescription, JointKind, JointLimits};
use slotmap::SlotMap;

use crate::error::BuildError;
use crate::joint::Joint;
use crate::link::{Link, LinkKey};

/// Resolves joint endpoints against built links and normalizes limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct JointFactory;

impl JointFactory {
    /// Build a joint between two links that already exist.
    pub fn load(
        &self,
        links: &SlotMap<LinkKey, Link>,
        names: &BTreeMap<String, LinkKey>,
        description: &JointDescription,
    ) -> Result<Joint, BuildError> {
        let resolve = |link: &str| {
            names
                .get(link)
                .copied()
                .filter(|key| links.contains_key(*key))
                .ok_or_else(|| BuildError::UnknownLink {
                    joint: description.name.clone(),
                    link: link.to_string(),
                })
        };
        let parent = resolve(&description.parent)?;
        let child = resolve(&description.child)?;
        if parent == child {
            return Err(invalid(description, "parent and child are the same link"));
        }

        let axis = normalize_axis(description)?;
        let limits = normalize_limits(description)?;

        let rest_offset = links[parent].base_pose().inverse() * links[child].base_pose();

        Ok(Joint::new(
            description.name.clone(),
            description.kind,
            (parent, description.parent.clone()),
            (child, description.child.clone()),
            axis,
            description.pose.to_isometry(),
            limits,
            rest_offset,
        ))
    }
}

fn invalid(description: &JointDescription, reason: impl Into<String>) -> BuildError {
    BuildError::InvalidJoint {
        joint: description.name.clone(),
        reason: reason.into(),
    }
}

fn normalize_axis(description: &JointDescription) -> Result<Unit<Vector3<f64>>, BuildError> {
    let axis = description.axis.to_vector();
    match Unit::try_new(axis, 1.0e-9) {
        Some(unit) if axis.iter().all(|v| v.is_finite()) => Ok(unit),
        _ if description.kind == JointKind::Fixed => Ok(Vector3::x_axis()),
        _ => Err(invalid(description, format!("degenerate axis {:?}", description.axis))),
    }
}

fn normalize_limits(description: &JointDescription) -> Result<JointLimits, BuildError> {
    let mut limits = description
        .limits
        .unwrap_or_else(|| JointLimits::new(f64::NEG_INFINITY, f64::INFINITY));

    if limits.effort < 0.0 || limits.velocity < 0.0 || limits.effort.is_nan() || limits.velocity.is_nan() {
        return Err(invalid(description, "effort and velocity limits must be non-negative"));
    }

    match description.kind {
        JointKind::Fixed => {
            limits.lower = 0.0;
            limits.upper = 0.0;
        }
        JointKind::Continuous => {
            limits.lower = f64::NEG_INFINITY;
            limits.upper = f64::INFINITY;
        }
        JointKind::Revolute | JointKind::Prismatic => {
            if description.limits.is_none() {
                tracing::warn!("Joint '{}' has no limits; treating it as unbounded", description.name);
            }
            if limits.lower.is_nan() || limits.upper.is_nan() || limits.lower > limits.upper {
                return Err(invalid(
                    description,
                    format!("lower limit {} exceeds upper limit {}", limits.lower, limits.upper),
                ));
            }
        }
    }
    Ok(limits)
}
