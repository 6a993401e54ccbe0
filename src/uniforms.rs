//! Uniform sets handed to point shading programs.
//!
//! Every set starts with the shared time uniform followed by the point size,
//! then any caller-supplied extras in insertion order. Order matters: it is
//! the WGSL struct layout the program declares.

use glam::{Vec2, Vec3, Vec4};
use std::collections::HashMap;

/// Name of the per-frame time uniform.
pub const TIME: &str = "u_time";
/// Name of the fixed point-size uniform.
pub const SIZE: &str = "u_size";

/// Supported uniform value types.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    F32(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
}

impl UniformValue {
    /// WGSL type name for this value.
    pub fn wgsl_type(&self) -> &'static str {
        match self {
            UniformValue::F32(_) => "f32",
            UniformValue::Vec2(_) => "vec2<f32>",
            UniformValue::Vec3(_) => "vec3<f32>",
            UniformValue::Vec4(_) => "vec4<f32>",
        }
    }

    /// std140-ish alignment in bytes.
    fn align(&self) -> usize {
        match self {
            UniformValue::F32(_) => 4,
            UniformValue::Vec2(_) => 8,
            UniformValue::Vec3(_) | UniformValue::Vec4(_) => 16,
        }
    }

    fn write_bytes(&self, buf: &mut Vec<u8>) {
        match self {
            UniformValue::F32(v) => buf.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => buf.extend_from_slice(bytemuck::cast_slice(&v.to_array())),
            // vec3 leaves its trailing 4 bytes for the next scalar
            UniformValue::Vec3(v) => buf.extend_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Vec4(v) => buf.extend_from_slice(bytemuck::cast_slice(&v.to_array())),
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            UniformValue::F32(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::F32(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

/// Ordered uniform set for a shader-driven point cloud.
///
/// Only the time slot is writable after construction.
#[derive(Clone, Debug)]
pub struct UniformSet {
    values: Vec<(String, UniformValue)>,
    indices: HashMap<String, usize>,
    /// Number of time writes since construction.
    time_writes: u64,
}

impl UniformSet {
    /// Build a set with time = 0, the given point size and `extras`.
    ///
    /// # Panics
    ///
    /// Panics if an extra reuses a name already in the set.
    pub fn for_points<I, S>(point_size: f32, extras: I) -> Self
    where
        I: IntoIterator<Item = (S, UniformValue)>,
        S: Into<String>,
    {
        let mut set = Self {
            values: Vec::new(),
            indices: HashMap::new(),
            time_writes: 0,
        };
        set.insert(TIME.to_string(), UniformValue::F32(0.0));
        set.insert(SIZE.to_string(), UniformValue::F32(point_size));
        for (name, value) in extras {
            set.insert(name.into(), value);
        }
        set
    }

    fn insert(&mut self, name: String, value: UniformValue) {
        assert!(!self.indices.contains_key(&name), "duplicate uniform '{}'", name);
        self.indices.insert(name.clone(), self.values.len());
        self.values.push((name, value));
    }

    /// Current value of the time uniform.
    pub fn time(&self) -> f32 {
        self.values[0].1.as_f32().unwrap_or(0.0)
    }

    /// Fixed point size.
    pub fn point_size(&self) -> f32 {
        self.values[1].1.as_f32().unwrap_or(0.0)
    }

    pub(crate) fn set_time(&mut self, time: f32) {
        self.values[0].1 = UniformValue::F32(time);
        self.time_writes += 1;
    }

    /// How many times the time uniform has been written.
    pub fn time_writes(&self) -> u64 {
        self.time_writes
    }

    /// Get a uniform value by name.
    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.indices.get(name).map(|&idx| &self.values[idx].1)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all uniforms in layout order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// WGSL struct body matching [`Self::to_bytes`].
    pub fn to_wgsl_fields(&self) -> String {
        self.values
            .iter()
            .map(|(name, value)| format!("    {}: {},", name, value.wgsl_type()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Serialize all values for GPU upload, padded to 16 bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for (_, value) in &self.values {
            let align = value.align();
            while buf.len() % align != 0 {
                buf.push(0);
            }
            value.write_bytes(&mut buf);
        }
        while buf.len() % 16 != 0 {
            buf.push(0);
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_starts_with_time_and_size() {
        let set = UniformSet::for_points(0.05, Vec::<(String, UniformValue)>::new());
        let names: Vec<_> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec![TIME, SIZE]);
        assert_eq!(set.time(), 0.0);
        assert_eq!(set.point_size(), 0.05);
        assert_eq!(set.to_bytes().len(), 16);
    }

    #[test]
    fn test_extras_follow_in_order() {
        let set = UniformSet::for_points(0.1, [
            ("u_lift", UniformValue::F32(0.05)),
            ("u_tint", UniformValue::Vec3(Vec3::ONE)),
        ]);
        assert_eq!(set.len(), 4);
        assert_eq!(set.get("u_lift"), Some(&UniformValue::F32(0.05)));
        // time, size, lift at 0..12, tint aligned to 16.
        assert_eq!(set.to_bytes().len(), 32);
        assert!(set.to_wgsl_fields().contains("u_tint: vec3<f32>,"));
    }

    #[test]
    fn test_set_time_touches_only_time() {
        let mut set = UniformSet::for_points(0.1, [("u_lift", UniformValue::F32(0.05))]);
        set.set_time(2.5);
        assert_eq!(set.time(), 2.5);
        assert_eq!(set.point_size(), 0.1);
        assert_eq!(set.get("u_lift"), Some(&UniformValue::F32(0.05)));
        assert_eq!(set.time_writes(), 1);

        let bytes = set.to_bytes();
        assert_eq!(bytes[0..4], 2.5f32.to_le_bytes());
    }

    #[test]
    #[should_panic]
    fn test_extras_cannot_shadow_time() {
        UniformSet::for_points(0.1, [(TIME, UniformValue::F32(1.0))]);
    }
}
