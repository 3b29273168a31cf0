//! Animation clips and the curve builder
//!
//! Channels arrive as parallel `times`/`values` arrays. The builder turns
//! each channel into one keyframed curve per value component, then a
//! post-process assigns tangents without touching the samples.
//!
//! ```ignore
//! let curves = anim.transform.translation.gen_curves();
//! let bindings = clip.export(&InterpolationType::Smooth);
//! ```

use serde::{Deserialize, Serialize};

use crate::transform::EntityType;

/// A value type that can be decomposed into scalar curve components
pub trait CurveComponents {
    const COMPONENTS: usize;

    fn component(&self, index: usize) -> f32;
}

impl CurveComponents for f32 {
    const COMPONENTS: usize = 1;

    fn component(&self, _index: usize) -> f32 {
        *self
    }
}

impl CurveComponents for bool {
    const COMPONENTS: usize = 1;

    fn component(&self, _index: usize) -> f32 {
        if *self { 1.0 } else { 0.0 }
    }
}

impl<const N: usize> CurveComponents for [f32; N] {
    const COMPONENTS: usize = N;

    fn component(&self, index: usize) -> f32 {
        self[index]
    }
}

/// Sparse samples of one animated property, times non-decreasing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel<T> {
    pub times: Vec<f32>,
    pub values: Vec<T>,
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self { times: Vec::new(), values: Vec::new() }
    }
}

impl<T> Channel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: f32, value: T) {
        self.times.push(time);
        self.values.push(value);
    }

    /// Number of usable samples; extra entries in the longer array are ignored
    pub fn len(&self) -> usize {
        self.times.len().min(self.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: CurveComponents> Channel<T> {
    /// One curve per component, `None` when the channel has no samples
    pub fn gen_curves(&self) -> Option<Vec<Curve>> {
        if self.is_empty() {
            return None;
        }
        if self.times.len() != self.values.len() {
            log::debug!(
                "Channel has {} times and {} values, using {}",
                self.times.len(),
                self.values.len(),
                self.len()
            );
        }

        let curves = (0..T::COMPONENTS)
            .map(|c| Curve {
                keyframes: self
                    .times
                    .iter()
                    .zip(&self.values)
                    .map(|(&time, value)| Keyframe::new(time, value.component(c)))
                    .collect(),
            })
            .collect();
        Some(curves)
    }

    /// Single curve of a scalar channel
    pub fn gen_curve(&self) -> Option<Curve> {
        debug_assert_eq!(T::COMPONENTS, 1);
        self.gen_curves().and_then(|mut curves| curves.pop())
    }
}

/// How tangents of a key were derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TangentMode {
    #[default]
    Free,
    ClampedAuto,
    Linear,
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    pub in_tangent: f32,
    pub out_tangent: f32,
    pub tangent_mode: TangentMode,
}

impl Keyframe {
    pub fn new(time: f32, value: f32) -> Self {
        Self {
            time,
            value,
            in_tangent: 0.0,
            out_tangent: 0.0,
            tangent_mode: TangentMode::Free,
        }
    }
}

/// Scalar keyframed curve
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Curve {
    pub keyframes: Vec<Keyframe>,
}

impl Curve {
    #[inline]
    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Slope between keys `a` and `b`, zero for coincident times
    fn slope(&self, a: usize, b: usize) -> f32 {
        let (ka, kb) = (&self.keyframes[a], &self.keyframes[b]);
        let dt = kb.time - ka.time;
        if dt.abs() <= f32::EPSILON {
            0.0
        } else {
            (kb.value - ka.value) / dt
        }
    }

    /// Hermite evaluation using the stored tangents
    pub fn evaluate(&self, time: f32) -> f32 {
        let keys = &self.keyframes;
        match keys.len() {
            0 => return 0.0,
            1 => return keys[0].value,
            _ => {}
        }
        if time <= keys[0].time {
            return keys[0].value;
        }
        let last = keys.len() - 1;
        if time >= keys[last].time {
            return keys[last].value;
        }

        let next = keys.partition_point(|k| k.time <= time);
        let (k0, k1) = (&keys[next - 1], &keys[next]);
        if k0.out_tangent.is_infinite() || k1.in_tangent.is_infinite() {
            return k0.value;
        }

        let dt = k1.time - k0.time;
        let t = (time - k0.time) / dt;
        let (t2, t3) = (t * t, t * t * t);
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        h00 * k0.value + h10 * dt * k0.out_tangent + h01 * k1.value + h11 * dt * k1.in_tangent
    }
}

/// Post-process run over every curve emitted for a channel group
pub trait CurvePostProcess {
    fn apply(&self, curve: &mut Curve);
}

impl<F: Fn(&mut Curve)> CurvePostProcess for F {
    fn apply(&self, curve: &mut Curve) {
        self(curve)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationType {
    #[default]
    Smooth,
    Linear,
    Constant,
}

impl CurvePostProcess for InterpolationType {
    fn apply(&self, curve: &mut Curve) {
        let n = curve.len();
        for i in 0..n {
            let (in_tangent, out_tangent, mode) = match self {
                InterpolationType::Constant => {
                    (f32::INFINITY, f32::INFINITY, TangentMode::Constant)
                }
                InterpolationType::Linear => {
                    let left = if i > 0 { curve.slope(i - 1, i) } else { 0.0 };
                    let right = if i + 1 < n { curve.slope(i, i + 1) } else { 0.0 };
                    let left = if i == 0 { right } else { left };
                    let right = if i + 1 == n { left } else { right };
                    (left, right, TangentMode::Linear)
                }
                InterpolationType::Smooth => {
                    let tangent = if i == 0 || i + 1 == n {
                        0.0
                    } else {
                        let prev = curve.keyframes[i - 1].value;
                        let cur = curve.keyframes[i].value;
                        let next = curve.keyframes[i + 1].value;
                        // clamped: flat at local extrema
                        if (cur - prev) * (next - cur) <= 0.0 {
                            0.0
                        } else {
                            curve.slope(i - 1, i + 1)
                        }
                    };
                    (tangent, tangent, TangentMode::ClampedAuto)
                }
            };
            let key = &mut curve.keyframes[i];
            key.in_tangent = in_tangent;
            key.out_tangent = out_tangent;
            key.tangent_mode = mode;
        }
    }
}

/// Channels every animated entity carries
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformChannels {
    pub translation: Channel<[f32; 3]>,
    /// Quaternion (x, y, z, w)
    pub rotation: Channel<[f32; 4]>,
    pub scale: Channel<[f32; 3]>,
    pub visible: Channel<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlendShapeChannel {
    pub name: String,
    pub weight: Channel<f32>,
}

/// Camera lens channels; apertures and focal length in millimetres
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraChannels {
    pub fov: Channel<f32>,
    pub near_plane: Channel<f32>,
    pub far_plane: Channel<f32>,
    pub horizontal_aperture: Channel<f32>,
    pub vertical_aperture: Channel<f32>,
    pub focal_length: Channel<f32>,
    pub focus_distance: Channel<f32>,
}

/// Entity-specific channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnimationKind {
    Transform,
    Camera(CameraChannels),
    Light {
        color: Channel<[f32; 4]>,
        intensity: Channel<f32>,
        range: Channel<f32>,
        spot_angle: Channel<f32>,
    },
    Mesh {
        blendshapes: Vec<BlendShapeChannel>,
    },
    Points {
        time: Channel<f32>,
    },
}

/// A named curve ready to be bound to an entity property
#[derive(Debug, Clone, PartialEq)]
pub struct CurveBinding {
    pub path: String,
    pub property: String,
    pub curve: Curve,
}

/// Animation of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationData {
    pub path: String,
    pub transform: TransformChannels,
    pub kind: AnimationKind,
}

impl AnimationData {
    pub fn new(path: impl Into<String>, kind: AnimationKind) -> Self {
        Self {
            path: path.into(),
            transform: TransformChannels::default(),
            kind,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self.kind {
            AnimationKind::Transform => EntityType::Transform,
            AnimationKind::Camera(_) => EntityType::Camera,
            AnimationKind::Light { .. } => EntityType::Light,
            AnimationKind::Mesh { .. } => EntityType::Mesh,
            AnimationKind::Points { .. } => EntityType::Points,
        }
    }

    /// Build every animated curve and run `post` over each group,
    /// visibility included. Pass [`InterpolationType::Constant`] to keep
    /// visibility stepped.
    pub fn export(&self, post: &dyn CurvePostProcess) -> Vec<CurveBinding> {
        let mut out = Vec::new();
        let t = &self.transform;

        self.push_group(&mut out, "translation", &["x", "y", "z"], t.translation.gen_curves(), post);
        self.push_group(&mut out, "rotation", &["x", "y", "z", "w"], t.rotation.gen_curves(), post);
        self.push_group(&mut out, "scale", &["x", "y", "z"], t.scale.gen_curves(), post);
        self.push_group(&mut out, "visible", &[], t.visible.gen_curves(), post);

        match &self.kind {
            AnimationKind::Transform => {}
            AnimationKind::Camera(cam) => {
                let lens = [
                    ("camera.fov", &cam.fov),
                    ("camera.near_plane", &cam.near_plane),
                    ("camera.far_plane", &cam.far_plane),
                    ("camera.horizontal_aperture", &cam.horizontal_aperture),
                    ("camera.vertical_aperture", &cam.vertical_aperture),
                    ("camera.focal_length", &cam.focal_length),
                    ("camera.focus_distance", &cam.focus_distance),
                ];
                for (property, channel) in lens {
                    self.push_group(&mut out, property, &[], channel.gen_curves(), post);
                }
            }
            AnimationKind::Light { color, intensity, range, spot_angle } => {
                self.push_group(&mut out, "light.color", &["r", "g", "b", "a"], color.gen_curves(), post);
                self.push_group(&mut out, "light.intensity", &[], intensity.gen_curves(), post);
                self.push_group(&mut out, "light.range", &[], range.gen_curves(), post);
                self.push_group(&mut out, "light.spot_angle", &[], spot_angle.gen_curves(), post);
            }
            AnimationKind::Mesh { blendshapes } => {
                for bs in blendshapes {
                    let property = format!("blendshape.{}", bs.name);
                    self.push_group(&mut out, &property, &[], bs.weight.gen_curves(), post);
                }
            }
            AnimationKind::Points { time } => {
                self.push_group(&mut out, "points.time", &[], time.gen_curves(), post);
            }
        }
        out
    }

    fn push_group(
        &self,
        out: &mut Vec<CurveBinding>,
        property: &str,
        suffixes: &[&str],
        curves: Option<Vec<Curve>>,
        post: &dyn CurvePostProcess,
    ) {
        let Some(curves) = curves else {
            return;
        };
        for (i, mut curve) in curves.into_iter().enumerate() {
            post.apply(&mut curve);
            let property = match suffixes.get(i) {
                Some(suffix) => format!("{}.{}", property, suffix),
                None => property.to_string(),
            };
            out.push(CurveBinding {
                path: self.path.clone(),
                property,
                curve,
            });
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnimationClipData {
    pub name: String,
    pub animations: Vec<AnimationData>,
}

impl AnimationClipData {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), animations: Vec::new() }
    }

    /// Curves of every animation in the clip
    pub fn export(&self, post: &dyn CurvePostProcess) -> Vec<CurveBinding> {
        self.animations.iter().flat_map(|a| a.export(post)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scalar(samples: &[(f32, f32)]) -> Channel<f32> {
        let mut ch = Channel::new();
        for &(t, v) in samples {
            ch.push(t, v);
        }
        ch
    }

    #[test]
    fn test_empty_channel_emits_nothing() {
        let ch: Channel<[f32; 3]> = Channel::new();
        assert!(ch.gen_curves().is_none());
        assert!(Channel::<f32>::new().gen_curve().is_none());
    }

    #[test]
    fn test_keyframes_match_samples() {
        let ch = scalar(&[(0.0, 1.0), (0.5, 2.0), (2.0, 0.0)]);
        let curve = ch.gen_curve().unwrap();
        assert_eq!(curve.len(), 3);
        let times: Vec<f32> = curve.keyframes.iter().map(|k| k.time).collect();
        assert_eq!(times, vec![0.0, 0.5, 2.0]);
    }

    #[test]
    fn test_vector_channel_decomposes() {
        let mut ch: Channel<[f32; 4]> = Channel::new();
        ch.push(0.0, [0.0, 0.0, 0.0, 1.0]);
        ch.push(1.0, [0.0, 0.7, 0.0, 0.7]);
        let curves = ch.gen_curves().unwrap();
        assert_eq!(curves.len(), 4);
        assert_relative_eq!(curves[1].keyframes[1].value, 0.7);
        assert_relative_eq!(curves[3].keyframes[0].value, 1.0);
        assert!(curves.iter().all(|c| c.keyframes[1].time == 1.0));
    }

    #[test]
    fn test_mismatched_lengths_use_shorter() {
        let ch = Channel { times: vec![0.0, 1.0, 2.0], values: vec![5.0f32, 6.0] };
        assert_eq!(ch.gen_curve().unwrap().len(), 2);
    }

    #[test]
    fn test_linear_tangents() {
        let mut curve = scalar(&[(0.0, 0.0), (1.0, 2.0), (3.0, 2.0)]).gen_curve().unwrap();
        let before = curve.clone();
        InterpolationType::Linear.apply(&mut curve);
        assert_relative_eq!(curve.keyframes[0].out_tangent, 2.0);
        assert_relative_eq!(curve.keyframes[1].in_tangent, 2.0);
        assert_relative_eq!(curve.keyframes[1].out_tangent, 0.0);
        assert_relative_eq!(curve.evaluate(0.5), 1.0);
        for (a, b) in curve.keyframes.iter().zip(&before.keyframes) {
            assert_eq!((a.time, a.value), (b.time, b.value));
        }
    }

    #[test]
    fn test_constant_steps() {
        let mut curve = scalar(&[(0.0, 1.0), (1.0, 5.0)]).gen_curve().unwrap();
        InterpolationType::Constant.apply(&mut curve);
        assert_eq!(curve.keyframes[0].tangent_mode, TangentMode::Constant);
        assert_relative_eq!(curve.evaluate(0.99), 1.0);
        assert_relative_eq!(curve.evaluate(1.0), 5.0);
    }

    #[test]
    fn test_smooth_flat_at_extrema() {
        let mut curve = scalar(&[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0), (3.0, 0.5), (4.0, 2.0)])
            .gen_curve()
            .unwrap();
        InterpolationType::Smooth.apply(&mut curve);
        assert_relative_eq!(curve.keyframes[1].out_tangent, 0.0);
        assert_relative_eq!(curve.keyframes[3].out_tangent, 1.0);
        assert_eq!(curve.keyframes[3].tangent_mode, TangentMode::ClampedAuto);
    }

    #[test]
    fn test_closure_post_process() {
        let mut curve = scalar(&[(0.0, 1.0)]).gen_curve().unwrap();
        let post = |c: &mut Curve| c.keyframes.iter_mut().for_each(|k| k.out_tangent = 9.0);
        post.apply(&mut curve);
        assert_eq!(curve.keyframes[0].out_tangent, 9.0);
    }

    #[test]
    fn test_export_skips_unanimated_channels() {
        let mut anim = AnimationData::new(
            "/cam",
            AnimationKind::Camera(CameraChannels {
                fov: scalar(&[(0.0, 30.0), (1.0, 60.0)]),
                focal_length: scalar(&[(0.0, 35.0), (1.0, 85.0)]),
                focus_distance: scalar(&[(0.5, 3.0)]),
                ..Default::default()
            }),
        );
        anim.transform.translation.push(0.0, [0.0, 1.0, 2.0]);
        anim.transform.visible.push(0.0, true);

        let bindings = anim.export(&InterpolationType::Linear);
        let names: Vec<&str> = bindings.iter().map(|b| b.property.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "translation.x",
                "translation.y",
                "translation.z",
                "visible",
                "camera.fov",
                "camera.focal_length",
                "camera.focus_distance",
            ]
        );
        assert_eq!(bindings[5].curve.len(), 2);
        assert_relative_eq!(bindings[5].curve.keyframes[1].value, 85.0);
        assert_eq!(anim.entity_type(), EntityType::Camera);
    }

    #[test]
    fn test_camera_apertures_exported() {
        let anim = AnimationData::new(
            "/cam",
            AnimationKind::Camera(CameraChannels {
                horizontal_aperture: scalar(&[(0.0, 36.0)]),
                vertical_aperture: scalar(&[(0.0, 24.0)]),
                ..Default::default()
            }),
        );
        let bindings = anim.export(&InterpolationType::Smooth);
        let names: Vec<&str> = bindings.iter().map(|b| b.property.as_str()).collect();
        assert_eq!(names, vec!["camera.horizontal_aperture", "camera.vertical_aperture"]);
    }

    #[test]
    fn test_visibility_follows_post_process() {
        let mut anim = AnimationData::new("/node", AnimationKind::Transform);
        anim.transform.visible.push(0.0, true);
        anim.transform.visible.push(1.0, false);

        let linear = anim.export(&InterpolationType::Linear);
        assert_eq!(linear[0].property, "visible");
        assert_eq!(linear[0].curve.keyframes[0].tangent_mode, TangentMode::Linear);
        assert_relative_eq!(linear[0].curve.keyframes[0].out_tangent, -1.0);

        let stepped = anim.export(&InterpolationType::Constant);
        assert_eq!(stepped[0].curve.keyframes[0].tangent_mode, TangentMode::Constant);
    }
}
