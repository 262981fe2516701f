//! Error types for model construction, controllers and the physics host.

use thiserror::Error;

/// Errors raised by scene graph edits.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// The body key is stale or was never issued by this scene.
    #[error("Unknown scene body: {0}")]
    UnknownBody(String),

    /// The edit would make a body its own ancestor.
    #[error("Attaching '{child}' to '{parent}' would create a cycle")]
    Cycle {
        /// Body being attached.
        child: String,
        /// Requested parent.
        parent: String,
    },
}

/// Errors raised while turning descriptions into links and joints.
///
/// These are construction-input errors: the model logs them, skips the
/// affected link or joint and keeps building the rest.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// The owner context or the description was not supplied.
    #[error("Missing build input: {0}")]
    MissingInput(&'static str),

    /// No builder variant handles this link under the active policy.
    #[error("Link '{link}' not built: {reason}")]
    Unsupported {
        /// Link name.
        link: String,
        /// Why no builder applies.
        reason: String,
    },

    /// A joint endpoint names a link that was never loaded.
    #[error("Joint '{joint}' references unknown link '{link}'")]
    UnknownLink {
        /// Joint name.
        joint: String,
        /// Missing link name.
        link: String,
    },

    /// The joint description is inconsistent.
    #[error("Invalid joint '{joint}': {reason}")]
    InvalidJoint {
        /// Joint name.
        joint: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A scene edit failed while assembling a link.
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Errors raised by joint and gripper controllers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// A configured joint does not exist in the model.
    #[error("Controller '{controller}': joint '{joint}' not found")]
    JointNotFound {
        /// Controller name.
        controller: String,
        /// Joint name.
        joint: String,
    },

    /// The joint controller a gripper should drive does not exist.
    #[error("Controller '{controller}': joint controller '{joint_controller}' not found")]
    JointControllerNotFound {
        /// Gripper controller name.
        controller: String,
        /// Joint controller name.
        joint_controller: String,
    },

    /// The gripper joint is not part of the joint controller's group.
    #[error("Controller '{controller}' does not drive joint '{joint}'")]
    JointNotControlled {
        /// Joint controller name.
        controller: String,
        /// Joint name.
        joint: String,
    },

    /// The link carrying a grasp component does not exist.
    #[error("Grasp component '{component}': link '{link}' not found")]
    LinkNotFound {
        /// Grasp component name.
        component: String,
        /// Link name.
        link: String,
    },

    /// A joint resolved at init time has since been removed.
    #[error("Controller '{controller}': joint '{joint}' was removed after init")]
    DanglingJoint {
        /// Controller name.
        controller: String,
        /// Joint name.
        joint: String,
    },

    /// A link resolved at init time has since been removed.
    #[error("Grasp component '{component}': link '{link}' was removed after init")]
    DanglingLink {
        /// Grasp component name.
        component: String,
        /// Link name.
        link: String,
    },

    /// Tick or command issued before a successful init.
    #[error("Controller '{0}' is not initialized")]
    NotInitialized(String),

    /// Parameters failed validation.
    #[error("Controller '{controller}': invalid parameters: {reason}")]
    InvalidParameters {
        /// Controller name.
        controller: String,
        /// Validation failure.
        reason: String,
    },

    /// A joint reported a non-finite state.
    #[error("Joint '{joint}' has non-finite state (position {position}, velocity {velocity})")]
    NonFiniteState {
        /// Joint name.
        joint: String,
        /// Reported position.
        position: f64,
        /// Reported velocity.
        velocity: f64,
    },
}

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO failure while reading the config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Errors raised by the model registry and tick loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A link with this name is already registered.
    #[error("Duplicate link name: {0}")]
    DuplicateLink(String),

    /// A joint with this name is already registered.
    #[error("Duplicate joint name: {0}")]
    DuplicateJoint(String),

    /// A controller with this name is already registered.
    #[error("Duplicate controller name: {0}")]
    DuplicateController(String),

    /// Link lookup failed.
    #[error("Link not found: {0}")]
    LinkNotFound(String),

    /// Joint lookup failed.
    #[error("Joint not found: {0}")]
    JointNotFound(String),

    /// Controller lookup failed.
    #[error("Controller not found: {0}")]
    ControllerNotFound(String),

    /// Tick called before a description was loaded.
    #[error("Model '{0}' has not been loaded")]
    NotLoaded(String),

    /// Tick called before controllers were initialized.
    #[error("Model '{0}' has controllers that are not initialized")]
    ControllersNotInitialized(String),

    /// A prop could not be placed.
    #[error("Invalid prop '{name}': {reason}")]
    InvalidProp {
        /// Prop name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Tick called with an unusable delta time.
    #[error("Invalid delta time: {0}")]
    InvalidDeltaTime(f64),

    /// A joint references a link that was removed.
    #[error("Joint '{joint}': link '{link}' was removed")]
    DanglingLink {
        /// Joint name.
        joint: String,
        /// Missing link name.
        link: String,
    },

    /// An earlier tick failed; the model state is no longer trusted.
    #[error("Model '{model}' halted after error: {cause}")]
    Halted {
        /// Model name.
        model: String,
        /// The error that halted the model.
        cause: String,
    },

    /// Construction failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A controller failed.
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

/// Errors raised by the Rapier physics host.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// The model has nothing to simulate.
    #[error("Model '{0}' has no bodies to simulate")]
    EmptyModel(String),

    /// Failed to create collision shape.
    #[error("Failed to create collision shape for {name}: {reason}")]
    CollisionShape {
        /// Body name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// A joint could not be realized.
    #[error("Invalid joint configuration: {0}")]
    InvalidJoint(String),

    /// The model reported an error while stepping.
    #[error(transparent)]
    Model(#[from] ModelError),
}
