//! Scene side of the binding: where virtual objects live.

use serde::{Deserialize, Serialize};
use snapmark_core::Pose;

/// Opaque reference to a spawned virtual object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHandle(pub u64);

/// Where an object hangs in the scene hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parent {
    #[default]
    World,
    /// Stable root that holds frozen, anchored objects.
    AnchorRoot,
}

/// Operations the binder and anchor controller need from a renderer.
pub trait Scene {
    /// Instantiate `template` at `pose`. New objects start active.
    fn spawn(&mut self, template: &str, pose: &Pose) -> ObjectHandle;

    fn set_active(&mut self, object: ObjectHandle, active: bool);

    fn set_pose(&mut self, object: ObjectHandle, pose: &Pose);

    /// Move `object` under the anchor root, keeping its world pose.
    fn reparent_to_anchor_root(&mut self, object: ObjectHandle);
}

/// State of one object in a [`SceneGraph`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub template: String,
    pub pose: Pose,
    pub active: bool,
    pub parent: Parent,
    /// Number of `set_pose` calls after spawning.
    pub pose_writes: usize,
}

/// In-memory [`Scene`], used headless and in tests.
#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    objects: Vec<SceneObject>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, handle: ObjectHandle) -> Option<&SceneObject> {
        self.objects.get(handle.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, &SceneObject)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, o)| (ObjectHandle(i as u64), o))
    }

    fn object_mut(&mut self, handle: ObjectHandle) -> Option<&mut SceneObject> {
        self.objects.get_mut(handle.0 as usize)
    }
}

impl Scene for SceneGraph {
    fn spawn(&mut self, template: &str, pose: &Pose) -> ObjectHandle {
        let handle = ObjectHandle(self.objects.len() as u64);
        self.objects.push(SceneObject {
            template: template.to_owned(),
            pose: *pose,
            active: true,
            parent: Parent::World,
            pose_writes: 0,
        });
        handle
    }

    fn set_active(&mut self, object: ObjectHandle, active: bool) {
        if let Some(o) = self.object_mut(object) {
            o.active = active;
        }
    }

    fn set_pose(&mut self, object: ObjectHandle, pose: &Pose) {
        if let Some(o) = self.object_mut(object) {
            o.pose = *pose;
            o.pose_writes += 1;
        }
    }

    fn reparent_to_anchor_root(&mut self, object: ObjectHandle) {
        if let Some(o) = self.object_mut(object) {
            o.parent = Parent::AnchorRoot;
        }
    }
}
