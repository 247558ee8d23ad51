// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Total normalization of partial wire messages.
//!
//! Every field of an inbound message may be missing. Each `Partial*` type
//! mirrors the wire shape with optional fields; [`Normalize`] turns it into the
//! fully-populated counterpart so geometry code never checks for absence.
//!
//! # Defaults
//!
//! | wire type | default |
//! |---|---|
//! | numbers | `0` (non-finite floats also become `0`) |
//! | booleans | `false` |
//! | strings | empty |
//! | lists | empty |
//! | timestamps | [`Time::ZERO`], nanoseconds folded into seconds |
//! | quaternion | all components `0` (placed as identity by [`Pose::new`]) |
//! | nested messages | recursively normalized defaults |
//!
//! Decoding is per field: a value of the wrong type counts as missing and its
//! siblings are kept. A list element that does not decode becomes the
//! element's default, so list positions are preserved.
//!
//! Normalization is pure, total and idempotent: feeding a normalized value
//! back through its `Partial*` form yields the same value.

use glam::{Quat, Vec3};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use vantage_scene_port::{Pose, Time};

use crate::error::LayerError;
use crate::extension::MessageEvent;

/// Conversion of a partial message into its fully-defaulted form.
pub trait Normalize {
    /// Fully-populated counterpart.
    type Output;

    /// Fills every missing field with its documented default.
    fn normalize(&self) -> Self::Output;
}

impl<T: Normalize> Normalize for Option<T>
where
    T: Default,
{
    type Output = T::Output;

    fn normalize(&self) -> T::Output {
        match self {
            Some(inner) => inner.normalize(),
            None => T::default().normalize(),
        }
    }
}

impl<T: Normalize> Normalize for Vec<T> {
    type Output = Vec<T::Output>;

    fn normalize(&self) -> Self::Output {
        self.iter().map(Normalize::normalize).collect()
    }
}

fn number(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

#[allow(clippy::cast_possible_truncation)]
fn narrow(value: f64) -> f32 {
    value as f32
}

/// Decodes a message payload into its partial wire type.
pub fn decode_message<P>(event: &MessageEvent) -> Result<P, LayerError>
where
    P: DeserializeOwned,
{
    P::deserialize(&event.message).map_err(|source| LayerError::Message {
        topic: event.topic.clone(),
        schema: event.schema_name.clone(),
        source,
    })
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match T::deserialize(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(err) => {
            debug!(%err, "ignoring ill-typed field");
            Ok(None)
        }
    }
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .map(|item| T::deserialize(item).unwrap_or_default())
                .collect(),
        )),
        Value::Null => Ok(None),
        other => {
            debug!(found = %other, "ignoring non-list field");
            Ok(None)
        }
    }
}

/// [`decode_message`], falling back to an all-missing message when the payload
/// is not an object at all.
pub fn decode_or_default<P>(event: &MessageEvent) -> P
where
    P: DeserializeOwned + Default,
{
    if event.message.is_null() {
        return P::default();
    }
    decode_message(event).unwrap_or_else(|err| {
        warn!(%err, "treating message as empty");
        P::default()
    })
}

/// Wire timestamp.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialTime {
    /// Seconds.
    #[serde(deserialize_with = "lenient")]
    pub sec: Option<u32>,
    /// Nanoseconds (may exceed one second on the wire).
    #[serde(deserialize_with = "lenient")]
    pub nsec: Option<u32>,
}

impl Normalize for PartialTime {
    type Output = Time;

    fn normalize(&self) -> Time {
        Time::new(self.sec.unwrap_or(0), self.nsec.unwrap_or(0))
    }
}

impl From<Time> for PartialTime {
    fn from(time: Time) -> Self {
        Self {
            sec: Some(time.sec),
            nsec: Some(time.nsec),
        }
    }
}

/// Wire 3-vector.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialVector3 {
    /// X.
    #[serde(deserialize_with = "lenient")]
    pub x: Option<f64>,
    /// Y.
    #[serde(deserialize_with = "lenient")]
    pub y: Option<f64>,
    /// Z.
    #[serde(deserialize_with = "lenient")]
    pub z: Option<f64>,
}

/// Normalized 3-vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Vector3 {
    /// X.
    pub x: f64,
    /// Y.
    pub y: f64,
    /// Z.
    pub z: f64,
}

impl Vector3 {
    /// Single-precision form for geometry buffers.
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(narrow(self.x), narrow(self.y), narrow(self.z))
    }
}

impl Normalize for PartialVector3 {
    type Output = Vector3;

    fn normalize(&self) -> Vector3 {
        Vector3 {
            x: number(self.x),
            y: number(self.y),
            z: number(self.z),
        }
    }
}

impl From<Vector3> for PartialVector3 {
    fn from(v: Vector3) -> Self {
        Self {
            x: Some(v.x),
            y: Some(v.y),
            z: Some(v.z),
        }
    }
}

/// Wire quaternion.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialQuaternion {
    /// X.
    #[serde(deserialize_with = "lenient")]
    pub x: Option<f64>,
    /// Y.
    #[serde(deserialize_with = "lenient")]
    pub y: Option<f64>,
    /// Z.
    #[serde(deserialize_with = "lenient")]
    pub z: Option<f64>,
    /// W.
    #[serde(deserialize_with = "lenient")]
    pub w: Option<f64>,
}

/// Normalized quaternion (not necessarily unit length).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Quaternion {
    /// X.
    pub x: f64,
    /// Y.
    pub y: f64,
    /// Z.
    pub z: f64,
    /// W.
    pub w: f64,
}

impl Normalize for PartialQuaternion {
    type Output = Quaternion;

    fn normalize(&self) -> Quaternion {
        Quaternion {
            x: number(self.x),
            y: number(self.y),
            z: number(self.z),
            w: number(self.w),
        }
    }
}

impl From<Quaternion> for PartialQuaternion {
    fn from(q: Quaternion) -> Self {
        Self {
            x: Some(q.x),
            y: Some(q.y),
            z: Some(q.z),
            w: Some(q.w),
        }
    }
}

/// Wire pose.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialPose {
    /// Translation.
    #[serde(deserialize_with = "lenient")]
    pub position: Option<PartialVector3>,
    /// Rotation.
    #[serde(deserialize_with = "lenient")]
    pub orientation: Option<PartialQuaternion>,
}

/// Normalized pose as carried by messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PoseMsg {
    /// Translation.
    pub position: Vector3,
    /// Rotation.
    pub orientation: Quaternion,
}

impl PoseMsg {
    /// Placement pose; a zero quaternion places as identity.
    pub fn to_pose(self) -> Pose {
        let q = self.orientation;
        Pose::new(
            self.position.to_vec3(),
            Quat::from_xyzw(narrow(q.x), narrow(q.y), narrow(q.z), narrow(q.w)),
        )
    }
}

impl Normalize for PartialPose {
    type Output = PoseMsg;

    fn normalize(&self) -> PoseMsg {
        PoseMsg {
            position: self.position.normalize(),
            orientation: self.orientation.normalize(),
        }
    }
}

impl From<PoseMsg> for PartialPose {
    fn from(pose: PoseMsg) -> Self {
        Self {
            position: Some(pose.position.into()),
            orientation: Some(pose.orientation.into()),
        }
    }
}

/// Wire RGBA color in `0..=1`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialColor {
    /// Red.
    #[serde(deserialize_with = "lenient")]
    pub r: Option<f64>,
    /// Green.
    #[serde(deserialize_with = "lenient")]
    pub g: Option<f64>,
    /// Blue.
    #[serde(deserialize_with = "lenient")]
    pub b: Option<f64>,
    /// Alpha.
    #[serde(deserialize_with = "lenient")]
    pub a: Option<f64>,
}

/// Normalized color. A missing color is fully transparent black.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ColorRgba {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Alpha.
    pub a: f64,
}

impl ColorRgba {
    /// Uniform form for materials and instance colors.
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a].map(narrow)
    }
}

impl Normalize for PartialColor {
    type Output = ColorRgba;

    fn normalize(&self) -> ColorRgba {
        ColorRgba {
            r: number(self.r),
            g: number(self.g),
            b: number(self.b),
            a: number(self.a),
        }
    }
}

impl From<ColorRgba> for PartialColor {
    fn from(c: ColorRgba) -> Self {
        Self {
            r: Some(c.r),
            g: Some(c.g),
            b: Some(c.b),
            a: Some(c.a),
        }
    }
}

/// Wire header.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartialHeader {
    /// Message timestamp.
    #[serde(deserialize_with = "lenient")]
    pub stamp: Option<PartialTime>,
    /// Frame the payload is expressed in.
    #[serde(deserialize_with = "lenient")]
    pub frame_id: Option<String>,
}

/// Normalized header.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Header {
    /// Message timestamp.
    pub stamp: Time,
    /// Frame the payload is expressed in (empty: render frame).
    pub frame_id: String,
}

impl Normalize for PartialHeader {
    type Output = Header;

    fn normalize(&self) -> Header {
        Header {
            stamp: self.stamp.normalize(),
            frame_id: self.frame_id.clone().unwrap_or_default(),
        }
    }
}

impl From<Header> for PartialHeader {
    fn from(header: Header) -> Self {
        Self {
            stamp: Some(header.stamp.into()),
            frame_id: Some(header.frame_id),
        }
    }
}

/// Wire object of an object list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialSceneObject {
    /// Object identifier.
    #[serde(deserialize_with = "lenient")]
    pub id: Option<String>,
    /// Label text.
    #[serde(deserialize_with = "lenient")]
    pub label: Option<String>,
    /// Pose within the list's frame.
    #[serde(deserialize_with = "lenient")]
    pub pose: Option<PartialPose>,
    /// Box extents.
    #[serde(deserialize_with = "lenient")]
    pub scale: Option<PartialVector3>,
    /// Instance color.
    #[serde(deserialize_with = "lenient")]
    pub color: Option<PartialColor>,
}

/// Normalized object.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SceneObject {
    /// Object identifier.
    pub id: String,
    /// Label text (empty: no label).
    pub label: String,
    /// Pose within the list's frame.
    pub pose: PoseMsg,
    /// Box extents.
    pub scale: Vector3,
    /// Instance color.
    pub color: ColorRgba,
}

impl Normalize for PartialSceneObject {
    type Output = SceneObject;

    fn normalize(&self) -> SceneObject {
        SceneObject {
            id: self.id.clone().unwrap_or_default(),
            label: self.label.clone().unwrap_or_default(),
            pose: self.pose.normalize(),
            scale: self.scale.normalize(),
            color: self.color.normalize(),
        }
    }
}

impl From<SceneObject> for PartialSceneObject {
    fn from(object: SceneObject) -> Self {
        Self {
            id: Some(object.id),
            label: Some(object.label),
            pose: Some(object.pose.into()),
            scale: Some(object.scale.into()),
            color: Some(object.color.into()),
        }
    }
}

/// Wire object list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialObjectList {
    /// Header.
    #[serde(deserialize_with = "lenient")]
    pub header: Option<PartialHeader>,
    /// Objects.
    #[serde(deserialize_with = "lenient_list")]
    pub objects: Option<Vec<PartialSceneObject>>,
}

/// Normalized object list.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ObjectList {
    /// Header.
    pub header: Header,
    /// Objects in draw order.
    pub objects: Vec<SceneObject>,
}

impl Normalize for PartialObjectList {
    type Output = ObjectList;

    fn normalize(&self) -> ObjectList {
        ObjectList {
            header: self.header.normalize(),
            objects: self.objects.normalize(),
        }
    }
}

impl From<ObjectList> for PartialObjectList {
    fn from(list: ObjectList) -> Self {
        Self {
            header: Some(list.header.into()),
            objects: Some(list.objects.into_iter().map(Into::into).collect()),
        }
    }
}

/// Primitive drawn by a marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// Unit cube scaled by `scale`.
    Cube,
    /// Unit sphere scaled by `scale`.
    Sphere,
    /// Connected polyline through `points`.
    LineStrip,
    /// Point cloud of `points`.
    Points,
}

impl MarkerKind {
    /// Maps the wire type code; unknown codes yield `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Cube),
            1 => Some(Self::Sphere),
            2 => Some(Self::LineStrip),
            3 => Some(Self::Points),
            _ => None,
        }
    }

    /// Whether the primitive is drawn from a shared template.
    pub fn is_templated(self) -> bool {
        matches!(self, Self::Cube | Self::Sphere)
    }
}

/// Wire marker.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialMarker {
    /// Header.
    #[serde(deserialize_with = "lenient")]
    pub header: Option<PartialHeader>,
    /// Namespace.
    #[serde(deserialize_with = "lenient")]
    pub ns: Option<String>,
    /// Identifier within the namespace.
    #[serde(deserialize_with = "lenient")]
    pub id: Option<i32>,
    /// Primitive type code.
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub marker_type: Option<u32>,
    /// Pose within the header frame.
    #[serde(deserialize_with = "lenient")]
    pub pose: Option<PartialPose>,
    /// Primitive scale (line width / point size for lists).
    #[serde(deserialize_with = "lenient")]
    pub scale: Option<PartialVector3>,
    /// Color.
    #[serde(deserialize_with = "lenient")]
    pub color: Option<PartialColor>,
    /// Vertices for line strips and points.
    #[serde(deserialize_with = "lenient_list")]
    pub points: Option<Vec<PartialVector3>>,
}

/// Normalized marker.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Marker {
    /// Header.
    pub header: Header,
    /// Namespace.
    pub ns: String,
    /// Identifier within the namespace.
    pub id: i32,
    /// Primitive type code; see [`Marker::kind`].
    pub marker_type: u32,
    /// Pose within the header frame.
    pub pose: PoseMsg,
    /// Primitive scale.
    pub scale: Vector3,
    /// Color.
    pub color: ColorRgba,
    /// Vertices for line strips and points.
    pub points: Vec<Vector3>,
}

impl Marker {
    /// Decoded primitive type.
    pub fn kind(&self) -> Option<MarkerKind> {
        MarkerKind::from_code(self.marker_type)
    }
}

impl Normalize for PartialMarker {
    type Output = Marker;

    fn normalize(&self) -> Marker {
        Marker {
            header: self.header.normalize(),
            ns: self.ns.clone().unwrap_or_default(),
            id: self.id.unwrap_or(0),
            marker_type: self.marker_type.unwrap_or(0),
            pose: self.pose.normalize(),
            scale: self.scale.normalize(),
            color: self.color.normalize(),
            points: self.points.normalize(),
        }
    }
}

impl From<Marker> for PartialMarker {
    fn from(marker: Marker) -> Self {
        Self {
            header: Some(marker.header.into()),
            ns: Some(marker.ns),
            id: Some(marker.id),
            marker_type: Some(marker.marker_type),
            pose: Some(marker.pose.into()),
            scale: Some(marker.scale.into()),
            color: Some(marker.color.into()),
            points: Some(marker.points.into_iter().map(Into::into).collect()),
        }
    }
}

/// Convenience: decode (tolerantly) and normalize in one step.
pub fn normalize_event<P>(event: &MessageEvent) -> P::Output
where
    P: Normalize + DeserializeOwned + Default,
{
    decode_or_default::<P>(event).normalize()
}
