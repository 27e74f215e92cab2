//! Camera auto-framing.
//!
//! A freshly loaded model goes through four steps before the camera moves:
//!
//! 1. **Orientation**: meshes get a per-format base rotation (most exporters
//!    disagree about which axis is up); flat aerial captures are laid down.
//! 2. **Inversion voting**: independent signals each vote "upside down";
//!    enough votes rotate the model 180° about X.
//! 3. **Scale normalization**: the model is scaled towards a comfortable
//!    working size, with different rules for meshes and splats.
//! 4. **Framing**: the transformed bounds are recentred, extreme sizes are
//!    rescaled, and the camera is placed on a diagonal at a distance derived
//!    from the bounding-box diagonal and the field of view.
//!
//! Every threshold lives in [`FramingTunables`].

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::Serialize;
use tracing::debug;

use vitrine_shared::{LoaderKind, ModelFormat};

use crate::bounds::Aabb;
use crate::camera::CameraState;
use crate::renderable::Renderable;

#[derive(Debug, Clone, Serialize)]
pub struct FramingTunables {
    /// Edge of the box used when a model yields no usable bounds.
    pub default_box_edge: f32,
    /// A mesh lower than this fraction of both its width and depth is
    /// treated as an aerial capture.
    pub aerial_height_ratio: f32,

    /// `center.y / size.y` below this votes "inverted".
    pub centroid_ratio: f32,
    /// Vertex sampling aims for this many samples...
    pub sample_target: usize,
    /// ...never takes more than this many...
    pub max_samples: usize,
    /// ...and needs more than this many to vote.
    pub min_samples: usize,
    /// Vertices further than this fraction of the height from the centre
    /// count as top or bottom.
    pub skew_band: f32,
    /// Bottom count must exceed top count times this to vote.
    pub skew_ratio: f32,
    /// Name or path substrings that vote "inverted".
    pub inversion_hints: Vec<String>,
    /// A splat votes when `y_min < -y_max` and `|y_min|` exceeds this.
    pub splat_min_depth: f32,
    pub inversion_votes_required: usize,

    pub mesh_ideal_size: f32,
    pub mesh_comfort_range: (f32, f32),
    /// Scale applied to meshes already inside the comfort range.
    pub mesh_comfort_boost: f32,
    pub splat_large_threshold: f32,
    pub splat_ideal_size: f32,
    pub splat_scale_range: (f32, f32),
    pub splat_small_range: (f32, f32),
    pub splat_max_boost: f32,

    pub recenter_epsilon: f32,
    pub frame_size_range: (f32, f32),
    pub reframe_size: f32,
    pub partial_side: f32,
    pub imbalance_ratio: f32,
    pub safety_partial: f32,
    pub safety_imbalanced: f32,
    pub safety_default: f32,
    pub distance_range: (f32, f32),
    pub near_divisor: f32,
    pub min_near: f32,
    pub far_multiplier: f32,
    pub min_far: f32,
    pub orbit_min_factor: f32,
    pub orbit_max_factor: f32,
}

impl Default for FramingTunables {
    fn default() -> Self {
        Self {
            default_box_edge: 20.0,
            aerial_height_ratio: 0.2,
            centroid_ratio: -0.25,
            sample_target: 100,
            max_samples: 500,
            min_samples: 10,
            skew_band: 0.2,
            skew_ratio: 1.5,
            inversion_hints: ["inverted", "upside", "flipped", "flip"]
                .into_iter()
                .map(String::from)
                .collect(),
            splat_min_depth: 1.0,
            inversion_votes_required: 1,
            mesh_ideal_size: 20.0,
            mesh_comfort_range: (10.0, 30.0),
            mesh_comfort_boost: 1.5,
            splat_large_threshold: 20.0,
            splat_ideal_size: 10.0,
            splat_scale_range: (0.01, 1.0),
            splat_small_range: (0.1, 5.0),
            splat_max_boost: 10.0,
            recenter_epsilon: 0.01,
            frame_size_range: (1.0, 1000.0),
            reframe_size: 10.0,
            partial_side: 0.1,
            imbalance_ratio: 10.0,
            safety_partial: 3.0,
            safety_imbalanced: 2.0,
            safety_default: 1.5,
            distance_range: (2.0, 1000.0),
            near_divisor: 100.0,
            min_near: 0.01,
            far_multiplier: 100.0,
            min_far: 5000.0,
            orbit_min_factor: 0.1,
            orbit_max_factor: 5.0,
        }
    }
}

/// Which signals voted for "upside down".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InversionVotes {
    pub centroid: bool,
    pub vertex_skew: bool,
    pub name_hint: bool,
    pub splat_depth: bool,
}

impl InversionVotes {
    pub fn count(&self) -> usize {
        [self.centroid, self.vertex_skew, self.name_hint, self.splat_depth]
            .into_iter()
            .filter(|v| *v)
            .count()
    }
}

/// Where the camera ends up and how the model is placed for it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Framing {
    /// Recentring and rescaling applied on top of the model transform.
    pub adjustment: Mat4,
    /// World bounds after the adjustment.
    pub bounds: Aabb,
    pub recentered: bool,
    pub rescale: f32,
    pub partial: bool,
    pub imbalanced: bool,
    pub safety_factor: f32,
    pub distance: f32,
    pub camera: CameraState,
}

/// Everything decided about one model.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fit {
    /// Model-space bounds (with the loader's base scale), or the default box.
    pub raw_bounds: Aabb,
    pub default_bounds: bool,
    pub rotation: Quat,
    pub votes: InversionVotes,
    pub inverted: bool,
    /// Normalization factor, on top of the loader's base scale.
    pub scale: f32,
    /// Full model-to-world transform, framing adjustment included.
    pub transform: Mat4,
    pub framing: Framing,
}

/// Run orientation, inversion voting, scale normalization and framing for
/// a loaded model. `hint_text` is searched for inversion hints.
pub fn fit(renderable: &Renderable, hint_text: &str, fov_y: f32, t: &FramingTunables) -> Fit {
    let base_scale = renderable.base_scale;
    let scaled: Vec<Vec3> = renderable.positions.iter().map(|p| *p * base_scale).collect();
    let measured = Aabb::from_points(scaled.iter());
    let default_bounds = measured.is_none();
    let raw_bounds = measured.unwrap_or_else(|| Aabb::centered_cube(t.default_box_edge));

    let (mut rotation, votes, scale) = match renderable.kind {
        LoaderKind::Mesh => (
            base_rotation(renderable.format, raw_bounds.size(), t),
            mesh_inversion_votes(&scaled, &raw_bounds, hint_text, t),
            if default_bounds {
                1.0
            } else {
                mesh_scale(raw_bounds.max_dim(), t)
            },
        ),
        LoaderKind::PlySplat | LoaderKind::Splat => (
            Quat::IDENTITY,
            splat_inversion_votes(&raw_bounds, hint_text, t),
            if default_bounds {
                1.0
            } else {
                splat_scale(raw_bounds.max_dim(), t)
            },
        ),
    };

    let inverted = !default_bounds && votes.count() >= t.inversion_votes_required.max(1);
    if inverted {
        rotation = inversion_correction(renderable.format, rotation);
    }

    let model = Mat4::from_scale_rotation_translation(Vec3::splat(scale), rotation, Vec3::ZERO);
    let world_bounds = if default_bounds {
        raw_bounds
    } else {
        raw_bounds.transformed(model)
    };
    let framing = frame(&world_bounds, fov_y, t);

    debug!(
        format = %renderable.format,
        votes = votes.count(),
        inverted,
        scale,
        distance = framing.distance,
        "Model framed"
    );

    Fit {
        raw_bounds,
        default_bounds,
        rotation,
        votes,
        inverted,
        scale,
        transform: framing.adjustment * model * Mat4::from_scale(Vec3::splat(base_scale)),
        framing,
    }
}

/// Per-format rotation that brings a mesh upright and facing the viewer.
pub fn base_rotation(format: ModelFormat, raw_size: Vec3, t: &FramingTunables) -> Quat {
    let (mut x, y) = match format {
        ModelFormat::Glb | ModelFormat::Gltf | ModelFormat::Fbx => (0.0, PI),
        _ => (-FRAC_PI_2, 0.0),
    };

    let aerial = raw_size.y < raw_size.x * t.aerial_height_ratio
        && raw_size.y < raw_size.z * t.aerial_height_ratio;
    if aerial {
        x = -FRAC_PI_2;
    }

    Quat::from_euler(EulerRot::XYZ, x, y, 0.0)
}

fn inversion_correction(format: ModelFormat, rotation: Quat) -> Quat {
    match format {
        // glTF is Y-up already; flip and keep it facing the viewer.
        ModelFormat::Glb | ModelFormat::Gltf => Quat::from_euler(EulerRot::XYZ, PI, PI, 0.0),
        _ => rotation * Quat::from_rotation_x(PI),
    }
}

pub fn mesh_inversion_votes(
    positions: &[Vec3],
    bounds: &Aabb,
    hint_text: &str,
    t: &FramingTunables,
) -> InversionVotes {
    let size = bounds.size();
    let center = bounds.center();

    let centroid = size.y > 0.0 && center.y / size.y < t.centroid_ratio;

    let stride = (positions.len() / t.sample_target.max(1)).max(1);
    let (mut top, mut bottom, mut sampled) = (0usize, 0usize, 0usize);
    for p in positions.iter().step_by(stride).take(t.max_samples) {
        if p.y < center.y - size.y * t.skew_band {
            bottom += 1;
        }
        if p.y > center.y + size.y * t.skew_band {
            top += 1;
        }
        sampled += 1;
    }
    let vertex_skew = sampled > t.min_samples && bottom as f32 > top as f32 * t.skew_ratio;

    InversionVotes {
        centroid,
        vertex_skew,
        name_hint: has_inversion_hint(hint_text, t),
        splat_depth: false,
    }
}

pub fn splat_inversion_votes(bounds: &Aabb, hint_text: &str, t: &FramingTunables) -> InversionVotes {
    let (y_min, y_max) = (bounds.min.y, bounds.max.y);
    InversionVotes {
        splat_depth: y_min < -y_max && y_min.abs() > t.splat_min_depth,
        name_hint: has_inversion_hint(hint_text, t),
        ..InversionVotes::default()
    }
}

fn has_inversion_hint(hint_text: &str, t: &FramingTunables) -> bool {
    let text = hint_text.to_lowercase();
    t.inversion_hints.iter().any(|h| text.contains(h.as_str()))
}

pub fn mesh_scale(max_dim: f32, t: &FramingTunables) -> f32 {
    if !(max_dim.is_finite() && max_dim > 0.0) {
        return 1.0;
    }
    let (lo, hi) = t.mesh_comfort_range;
    if max_dim < lo || max_dim > hi {
        t.mesh_ideal_size / max_dim
    } else {
        t.mesh_comfort_boost
    }
}

pub fn splat_scale(max_dim: f32, t: &FramingTunables) -> f32 {
    if !(max_dim.is_finite() && max_dim > 0.0) {
        return 1.0;
    }
    let (small_lo, small_hi) = t.splat_small_range;
    if max_dim > t.splat_large_threshold {
        let (lo, hi) = t.splat_scale_range;
        (t.splat_ideal_size / max_dim).clamp(lo, hi)
    } else if max_dim > small_lo && max_dim < small_hi {
        (t.splat_ideal_size / max_dim).min(t.splat_max_boost)
    } else {
        1.0
    }
}

/// Place the camera for world-space `bounds`.
pub fn frame(bounds: &Aabb, fov_y: f32, t: &FramingTunables) -> Framing {
    let mut adjustment = Mat4::IDENTITY;
    let mut bounds = *bounds;

    let center = bounds.center();
    let recentered = center.abs().max_element() > t.recenter_epsilon;
    if recentered {
        adjustment = Mat4::from_translation(-center);
        bounds = bounds.transformed(adjustment);
    }

    let size = bounds.size();
    let max_dim = bounds.max_dim();
    let partial = size.min_element() < t.partial_side;
    let r = t.imbalance_ratio;
    let imbalanced =
        size.x / size.y > r || size.y / size.x > r || size.z / size.y > r || size.y / size.z > r;

    let (lo, hi) = t.frame_size_range;
    let mut rescale = 1.0;
    if max_dim > 0.0 && (max_dim < lo || max_dim > hi) {
        rescale = t.reframe_size / max_dim;
        let scale = Mat4::from_scale(Vec3::splat(rescale));
        adjustment = scale * adjustment;
        bounds = bounds.transformed(scale);
    }

    let safety_factor = if partial {
        t.safety_partial
    } else if imbalanced {
        t.safety_imbalanced
    } else {
        t.safety_default
    };

    let (min_d, max_d) = t.distance_range;
    let raw_distance = (bounds.diagonal() / (2.0 * (fov_y / 2.0).tan())).abs() * safety_factor;
    let distance = if raw_distance.is_finite() {
        raw_distance.clamp(min_d, max_d)
    } else {
        max_d
    };

    let size = bounds.size();
    let direction = if imbalanced {
        let xz = size.x / size.z;
        if xz > 5.0 {
            Vec3::new(0.3, 0.5, 0.7)
        } else if xz < 0.2 {
            Vec3::new(0.7, 0.5, 0.3)
        } else {
            Vec3::splat(0.5)
        }
    } else {
        Vec3::splat(0.5)
    };

    let target = bounds.center();
    let camera = CameraState {
        position: target + direction * distance,
        target,
        fov_y,
        near: (distance / t.near_divisor).max(t.min_near),
        far: (distance * t.far_multiplier).max(t.min_far),
        min_distance: distance * t.orbit_min_factor,
        max_distance: distance * t.orbit_max_factor,
    };

    Framing {
        adjustment,
        bounds,
        recentered,
        rescale,
        partial,
        imbalanced,
        safety_factor,
        distance,
        camera,
    }
}
