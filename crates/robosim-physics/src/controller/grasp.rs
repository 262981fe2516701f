//! Grasp sensing at a gripper's tool center point.

use std::collections::BTreeMap;

use nalgebra::{Isometry3, Point3};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::error::ControllerError;
use crate::link::{Link, LinkKey};
use crate::scene::{BodyKey, BodyRole, Scene};

/// Where a grasp component sits and how far it reaches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraspComponentSetting {
    /// Link carrying the component.
    pub gripper_name: String,
    /// Tool center point in the link frame (meters).
    pub tool_center_point: [f64; 3],
    /// Sensing radius around the tool center point (meters).
    pub radius: f64,
}

impl Default for GraspComponentSetting {
    fn default() -> Self {
        Self {
            gripper_name: String::new(),
            tool_center_point: [0.15, 0.0, 0.0],
            radius: 0.03,
        }
    }
}

#[derive(Debug, Clone)]
struct Fixation {
    object: BodyKey,
    name: String,
    offset: Isometry3<f64>,
}

/// Reports objects near the tool center point and holds a grasped one.
#[derive(Debug, Clone)]
pub struct GraspComponent {
    name: String,
    setting: GraspComponentSetting,
    link: Option<LinkKey>,
    in_reach: Vec<BodyKey>,
    fixation: Option<Fixation>,
}

impl GraspComponent {
    /// Component that still has to be bound to its link.
    pub fn new(name: impl Into<String>, setting: GraspComponentSetting) -> Self {
        Self {
            name: name.into(),
            setting,
            link: None,
            in_reach: Vec::new(),
            fixation: None,
        }
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Settings.
    pub fn setting(&self) -> &GraspComponentSetting {
        &self.setting
    }

    /// The carrying link, once resolved.
    pub fn link(&self) -> Option<LinkKey> {
        self.link
    }

    /// Resolve the carrying link by name.
    pub fn init(
        &mut self,
        links: &SlotMap<LinkKey, Link>,
        names: &BTreeMap<String, LinkKey>,
    ) -> Result<(), ControllerError> {
        let key = names
            .get(&self.setting.gripper_name)
            .copied()
            .filter(|key| links.contains_key(*key))
            .ok_or_else(|| ControllerError::LinkNotFound {
                component: self.name.clone(),
                link: self.setting.gripper_name.clone(),
            })?;
        self.link = Some(key);
        self.in_reach.clear();
        self.fixation = None;
        Ok(())
    }

    /// Tool center point in world coordinates for a link pose.
    pub fn tool_center_point(&self, link_pose: &Isometry3<f64>) -> Point3<f64> {
        let [x, y, z] = self.setting.tool_center_point;
        link_pose * Point3::new(x, y, z)
    }

    /// Move a held object with the link and recompute the objects in reach.
    pub fn update(&mut self, scene: &mut Scene, link_pose: &Isometry3<f64>) {
        if let Some(fixation) = &self.fixation {
            if scene
                .set_world_transform(fixation.object, link_pose * fixation.offset)
                .is_err()
            {
                tracing::warn!("{}: grasped object '{}' disappeared", self.name, fixation.name);
                self.fixation = None;
            }
        }

        let tcp = self.tool_center_point(link_pose);
        let mut in_reach: Vec<(f64, BodyKey)> = scene
            .bodies_with_role(BodyRole::Prop)
            .filter_map(|(key, body)| {
                let distance = (body.transform().translation.vector - tcp.coords).norm();
                let extent = body.geometry.as_ref().map_or(0.0, |g| g.bounding_radius());
                (distance <= self.setting.radius + extent).then_some((distance, key))
            })
            .collect();
        in_reach.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.in_reach = in_reach.into_iter().map(|(_, key)| key).collect();
    }

    /// An object is within reach or held.
    pub fn is_engaged(&self) -> bool {
        !self.in_reach.is_empty() || self.fixation.is_some()
    }

    /// Objects in reach, nearest first.
    pub fn objects_in_reach(&self) -> &[BodyKey] {
        &self.in_reach
    }

    /// Weld the nearest object in reach to the link's primary body.
    ///
    /// Returns the held object's name; an already held object is kept.
    pub fn try_to_fixate(&mut self, scene: &mut Scene, link: &Link) -> Option<String> {
        if let Some(fixation) = &self.fixation {
            return Some(fixation.name.clone());
        }

        let object = *self.in_reach.first()?;
        let body = scene.get(object)?;
        let name = body.name.clone();
        let offset = link.world_pose().inverse() * body.transform();

        if let Some(primary) = link.get_collision() {
            if let Err(err) = scene.weld_to(object, primary) {
                tracing::warn!("{}: cannot weld '{}': {}", self.name, name, err);
                return None;
            }
        }

        tracing::debug!("{} fixated '{}'", self.name, name);
        self.fixation = Some(Fixation {
            object,
            name: name.clone(),
            offset,
        });
        Some(name)
    }

    /// Let go of the held object. Returns its name.
    pub fn try_to_detach(&mut self, scene: &mut Scene) -> Option<String> {
        let fixation = self.fixation.take()?;
        if scene.contains(fixation.object) {
            if let Err(err) = scene.detach(fixation.object) {
                tracing::warn!("{}: cannot detach '{}': {}", self.name, fixation.name, err);
            }
        }
        tracing::debug!("{} detached '{}'", self.name, fixation.name);
        Some(fixation.name)
    }

    /// The held object.
    pub fn grasped_object(&self) -> Option<BodyKey> {
        self.fixation.as_ref().map(|f| f.object)
    }

    /// Name of the held object.
    pub fn grasped_object_name(&self) -> Option<&str> {
        self.fixation.as_ref().map(|f| f.name.as_str())
    }

    /// Held object pose relative to the carrying link.
    pub fn grasp_offset(&self) -> Option<&Isometry3<f64>> {
        self.fixation.as_ref().map(|f| &f.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BodyGeometry;
    use approx::assert_relative_eq;

    fn setup() -> (Scene, SlotMap<LinkKey, Link>, BTreeMap<String, LinkKey>) {
        let mut scene = Scene::new();
        let mut link = Link::new("palm", Isometry3::identity());
        let body = scene.spawn("palm_c", BodyRole::Collision);
        link.collisions.push(body);

        let mut links = SlotMap::with_key();
        let key = links.insert(link);
        let names = BTreeMap::from([("palm".to_string(), key)]);
        (scene, links, names)
    }

    fn prop(scene: &mut Scene, name: &str, x: f64) -> BodyKey {
        let key = scene.spawn(name, BodyRole::Prop);
        scene.set_world_transform(key, Isometry3::translation(x, 0.0, 0.0)).unwrap();
        scene.get_mut(key).unwrap().geometry = Some(BodyGeometry::Ball { radius: 0.01 });
        key
    }

    fn component() -> GraspComponent {
        GraspComponent::new(
            "grasp",
            GraspComponentSetting {
                gripper_name: "palm".to_string(),
                ..GraspComponentSetting::default()
            },
        )
    }

    #[test]
    fn default_tool_center_point_is_fifteen_centimeters() {
        let setting = GraspComponentSetting::default();
        assert_eq!(setting.tool_center_point, [0.15, 0.0, 0.0]);
        let tcp = component().tool_center_point(&Isometry3::translation(0.0, 0.0, 1.0));
        assert_relative_eq!(tcp, Point3::new(0.15, 0.0, 1.0));
    }

    #[test]
    fn init_requires_the_link() {
        let (_, links, _) = setup();
        let mut grasp = component();
        assert_eq!(
            grasp.init(&links, &BTreeMap::new()),
            Err(ControllerError::LinkNotFound {
                component: "grasp".to_string(),
                link: "palm".to_string()
            })
        );
    }

    #[test]
    fn nearest_prop_is_fixated_and_follows_the_link() {
        let (mut scene, links, names) = setup();
        let far = prop(&mut scene, "far", 0.17);
        let near = prop(&mut scene, "near", 0.155);
        prop(&mut scene, "away", 1.0);

        let mut grasp = component();
        grasp.init(&links, &names).unwrap();
        let link = &links[names["palm"]];

        grasp.update(&mut scene, link.world_pose());
        assert!(grasp.is_engaged());
        assert_eq!(grasp.objects_in_reach(), &[near, far]);

        assert_eq!(grasp.try_to_fixate(&mut scene, link), Some("near".to_string()));
        assert_eq!(scene.get(near).unwrap().weld_parent(), link.get_collision());

        let moved = Isometry3::translation(0.0, 0.5, 0.0);
        grasp.update(&mut scene, &moved);
        assert_relative_eq!(
            scene.world_transform(near).unwrap().translation.vector,
            nalgebra::Vector3::new(0.155, 0.5, 0.0),
            epsilon = 1e-12
        );

        assert_eq!(grasp.try_to_detach(&mut scene), Some("near".to_string()));
        assert_eq!(scene.get(near).unwrap().weld_parent(), None);
        assert_eq!(grasp.try_to_detach(&mut scene), None);
    }

    #[test]
    fn nothing_in_reach_fixates_nothing() {
        let (mut scene, links, names) = setup();
        prop(&mut scene, "away", 1.0);
        let mut grasp = component();
        grasp.init(&links, &names).unwrap();
        let link = &links[names["palm"]];

        grasp.update(&mut scene, link.world_pose());
        assert!(!grasp.is_engaged());
        assert_eq!(grasp.try_to_fixate(&mut scene, link), None);
    }
}
