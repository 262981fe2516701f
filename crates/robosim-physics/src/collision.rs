//! Collision channels and per-body collision filtering.

use serde::{Deserialize, Serialize};

/// Object channel a body is registered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionChannel {
    /// Static environment geometry.
    WorldStatic,
    /// Movable environment objects (graspable props).
    WorldDynamic,
    /// Bodies belonging to a robot.
    RobotSelf,
    /// Grasp sensing volumes.
    Grasp,
}

impl CollisionChannel {
    /// Every channel, in a fixed order.
    pub const ALL: [CollisionChannel; 4] = [
        CollisionChannel::WorldStatic,
        CollisionChannel::WorldDynamic,
        CollisionChannel::RobotSelf,
        CollisionChannel::Grasp,
    ];

    fn index(self) -> usize {
        match self {
            CollisionChannel::WorldStatic => 0,
            CollisionChannel::WorldDynamic => 1,
            CollisionChannel::RobotSelf => 2,
            CollisionChannel::Grasp => 3,
        }
    }
}

/// How a body reacts to another body on a given channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionResponse {
    /// No interaction.
    Ignore,
    /// Report overlaps without a physical response.
    Overlap,
    /// Solid contact.
    #[default]
    Block,
}

/// Which parts of the collision pipeline a body takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionEnabled {
    /// Not collidable at all.
    NoCollision,
    /// Only scene queries.
    QueryOnly,
    /// Queries and rigid-body contacts.
    #[default]
    QueryAndPhysics,
}

/// Collision configuration of one scene body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionSettings {
    /// The channel this body is registered on.
    pub object_channel: CollisionChannel,
    /// Participation in queries and physics.
    pub enabled: CollisionEnabled,
    responses: [CollisionResponse; 4],
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            object_channel: CollisionChannel::WorldDynamic,
            enabled: CollisionEnabled::QueryAndPhysics,
            responses: [CollisionResponse::Block; 4],
        }
    }
}

impl CollisionSettings {
    /// Set the same response for every channel.
    pub fn set_response_to_all(&mut self, response: CollisionResponse) {
        self.responses = [response; 4];
    }

    /// Set the response to one channel.
    pub fn set_response(&mut self, channel: CollisionChannel, response: CollisionResponse) {
        self.responses[channel.index()] = response;
    }

    /// Response to one channel.
    pub fn response(&self, channel: CollisionChannel) -> CollisionResponse {
        self.responses[channel.index()]
    }

    /// Channels this body reacts to at all.
    pub fn interacting_channels(&self) -> impl Iterator<Item = CollisionChannel> + '_ {
        CollisionChannel::ALL
            .into_iter()
            .filter(|c| self.response(*c) != CollisionResponse::Ignore)
    }

    /// True when the body never produces solid contacts.
    pub fn is_overlap_only(&self) -> bool {
        !CollisionChannel::ALL
            .iter()
            .any(|c| self.response(*c) == CollisionResponse::Block)
    }

    /// True when the body interacts with nothing.
    pub fn ignores_everything(&self) -> bool {
        self.enabled == CollisionEnabled::NoCollision || self.interacting_channels().next().is_none()
    }
}
