//! Named uniform blocks laid out with std140 rules.
//!
//! A [`UniformLayout`] is built once from `(name, type)` pairs. It knows the
//! byte offset of every member and can emit the matching GLSL block so shader
//! code keeps referring to each uniform by its plain name. [`UniformBlock`]
//! holds the CPU copy of the values and [`UniformBuffer`] mirrors it on the GPU.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;

use thiserror::Error;

/// GLSL types a uniform block member may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    /// `float`
    Float,
    /// `int`
    Int,
    /// `vec2`
    Vec2,
    /// `vec3`; aligned to 16 bytes but only 12 wide, so a scalar may follow.
    Vec3,
    /// `vec4`
    Vec4,
}

impl UniformType {
    /// Type keyword used in generated GLSL.
    pub fn glsl_name(self) -> &'static str {
        match self {
            UniformType::Float => "float",
            UniformType::Int => "int",
            UniformType::Vec2 => "vec2",
            UniformType::Vec3 => "vec3",
            UniformType::Vec4 => "vec4",
        }
    }

    /// Size in bytes inside a std140 block.
    pub fn size(self) -> usize {
        match self {
            UniformType::Float | UniformType::Int => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
        }
    }

    fn alignment(self) -> usize {
        match self {
            UniformType::Float | UniformType::Int => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 | UniformType::Vec4 => 16,
        }
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glsl_name())
    }
}

/// A value for one uniform member, tagged with its GLSL type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformValue {
    pub fn ty(&self) -> UniformType {
        match self {
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
        }
    }

    fn write_to(&self, dst: &mut [u8]) {
        match self {
            UniformValue::Float(value) => dst.copy_from_slice(bytemuck::bytes_of(value)),
            UniformValue::Int(value) => dst.copy_from_slice(bytemuck::bytes_of(value)),
            UniformValue::Vec2(value) => dst.copy_from_slice(bytemuck::cast_slice(value)),
            UniformValue::Vec3(value) => dst.copy_from_slice(bytemuck::cast_slice(value)),
            UniformValue::Vec4(value) => dst.copy_from_slice(bytemuck::cast_slice(value)),
        }
    }

    fn read_from(ty: UniformType, src: &[u8]) -> Self {
        let float = |index: usize| bytemuck::pod_read_unaligned::<f32>(&src[index * 4..index * 4 + 4]);
        match ty {
            UniformType::Float => UniformValue::Float(float(0)),
            UniformType::Int => UniformValue::Int(bytemuck::pod_read_unaligned(&src[..4])),
            UniformType::Vec2 => UniformValue::Vec2([float(0), float(1)]),
            UniformType::Vec3 => UniformValue::Vec3([float(0), float(1), float(2)]),
            UniformType::Vec4 => UniformValue::Vec4([float(0), float(1), float(2), float(3)]),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<u32> for UniformValue {
    fn from(value: u32) -> Self {
        UniformValue::Int(i32::try_from(value).unwrap_or(i32::MAX))
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<(f32, f32)> for UniformValue {
    fn from((x, y): (f32, f32)) -> Self {
        UniformValue::Vec2([x, y])
    }
}

impl From<(f32, f32, f32)> for UniformValue {
    fn from((x, y, z): (f32, f32, f32)) -> Self {
        UniformValue::Vec3([x, y, z])
    }
}

/// Errors building a layout or writing a value into a block.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UniformError {
    #[error("'{0}' is not a valid uniform name")]
    InvalidName(String),
    #[error("uniform '{0}' is declared more than once")]
    DuplicateName(String),
    #[error("program has no uniform named '{0}'")]
    UnknownName(String),
    #[error("uniform '{name}' is a {expected} but was given a {actual}")]
    TypeMismatch {
        name: String,
        expected: UniformType,
        actual: UniformType,
    },
}

/// One member of a [`UniformLayout`].
#[derive(Debug, Clone, PartialEq)]
pub struct UniformField {
    /// Name shaders use to refer to the uniform.
    pub name: String,
    pub ty: UniformType,
    /// Byte offset from the start of the block.
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    index: HashMap<String, usize>,
    size: usize,
}

impl UniformLayout {
    pub fn new<'a, I>(fields: I) -> Result<Self, UniformError>
    where
        I: IntoIterator<Item = (&'a str, UniformType)>,
    {
        let mut laid_out = Vec::new();
        let mut index = HashMap::new();
        let mut cursor = 0usize;

        for (name, ty) in fields {
            if !is_identifier(name) {
                return Err(UniformError::InvalidName(name.to_string()));
            }
            if index.contains_key(name) {
                return Err(UniformError::DuplicateName(name.to_string()));
            }
            let offset = align_up(cursor, ty.alignment());
            cursor = offset + ty.size();
            index.insert(name.to_string(), laid_out.len());
            laid_out.push(UniformField {
                name: name.to_string(),
                ty,
                offset,
            });
        }

        // wgpu rejects zero-sized uniform bindings.
        let size = align_up(cursor, 16).max(16);
        Ok(Self {
            fields: laid_out,
            index,
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&UniformField> {
        self.index.get(name).map(|&slot| &self.fields[slot])
    }

    /// Emits a std140 block whose members are prefixed with `_`, plus one
    /// `#define` per member so shaders use the bare name.
    pub fn glsl_block(&self, set: u32, binding: u32, block: &str, instance: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "layout(std140, set = {set}, binding = {binding}) uniform {block} {{"
        );
        for field in &self.fields {
            let _ = writeln!(out, "    {} _{};", field.ty.glsl_name(), field.name);
        }
        let _ = writeln!(out, "}} {instance};");
        for field in &self.fields {
            let _ = writeln!(out, "#define {name} {instance}._{name}", name = field.name);
        }
        out
    }
}

fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    !name.starts_with("gl_") && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// CPU-side values for a [`UniformLayout`], zero-initialised.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    layout: UniformLayout,
    data: Vec<u8>,
    dirty: bool,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let data = vec![0u8; layout.size()];
        Self {
            layout,
            data,
            dirty: true,
        }
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn try_set(
        &mut self,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<(), UniformError> {
        let value = value.into();
        let field = self
            .layout
            .field(name)
            .ok_or_else(|| UniformError::UnknownName(name.to_string()))?;
        if field.ty != value.ty() {
            return Err(UniformError::TypeMismatch {
                name: name.to_string(),
                expected: field.ty,
                actual: value.ty(),
            });
        }
        let range = field.offset..field.offset + field.ty.size();
        value.write_to(&mut self.data[range]);
        self.dirty = true;
        Ok(())
    }

    /// Writes a value if the block declares it. Unknown names are ignored so a
    /// shader may leave uniforms out; mismatched types are logged.
    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) -> bool {
        match self.try_set(name, value) {
            Ok(()) => true,
            Err(UniformError::UnknownName(name)) => {
                tracing::trace!(uniform = %name, "ignoring uniform missing from block");
                false
            }
            Err(err) => {
                tracing::warn!("{err}");
                false
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        let field = self.layout.field(name)?;
        let bytes = &self.data[field.offset..field.offset + field.ty.size()];
        Some(UniformValue::read_from(field.ty, bytes))
    }
}

/// A [`UniformBlock`] paired with the GPU buffer it is uploaded to.
pub struct UniformBuffer {
    block: UniformBlock,
    buffer: wgpu::Buffer,
}

impl UniformBuffer {
    pub fn new(device: &wgpu::Device, label: &str, layout: UniformLayout) -> Self {
        let block = UniformBlock::new(layout);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: block.bytes().len() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { block, buffer }
    }

    pub fn layout(&self) -> &UniformLayout {
        self.block.layout()
    }

    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) -> bool {
        self.block.set(name, value)
    }

    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }

    /// Uploads the block if anything changed since the last flush.
    pub fn flush(&mut self, queue: &wgpu::Queue) -> bool {
        if !self.block.is_dirty() {
            return false;
        }
        queue.write_buffer(&self.buffer, 0, self.block.bytes());
        self.block.mark_clean();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slime_like_layout() -> UniformLayout {
        UniformLayout::new([
            ("SCREEN_WIDTH", UniformType::Int),
            ("COLOR", UniformType::Vec3),
            ("FADE_RATE", UniformType::Float),
            ("u_mouse", UniformType::Vec2),
            ("time", UniformType::Float),
        ])
        .unwrap()
    }

    #[test]
    fn offsets_follow_std140() {
        let layout = slime_like_layout();
        let offsets: Vec<_> = layout
            .fields()
            .iter()
            .map(|field| (field.name.as_str(), field.offset))
            .collect();
        assert_eq!(
            offsets,
            vec![
                ("SCREEN_WIDTH", 0),
                ("COLOR", 16),
                ("FADE_RATE", 28),
                ("u_mouse", 32),
                ("time", 40),
            ]
        );
        assert_eq!(layout.size(), 48);
    }

    #[test]
    fn empty_layout_still_has_a_binding_size() {
        let layout = UniformLayout::new(Vec::<(&str, UniformType)>::new()).unwrap();
        assert_eq!(layout.size(), 16);
        assert!(layout.fields().is_empty());
    }

    #[test]
    fn rejects_duplicates_and_bad_names() {
        let err = UniformLayout::new([("time", UniformType::Float), ("time", UniformType::Int)])
            .unwrap_err();
        assert_eq!(err, UniformError::DuplicateName("time".into()));

        for bad in ["", "1st", "has space", "_hidden", "gl_Position"] {
            let err = UniformLayout::new([(bad, UniformType::Float)]).unwrap_err();
            assert_eq!(err, UniformError::InvalidName(bad.into()));
        }
    }

    #[test]
    fn glsl_block_declares_members_and_aliases() {
        let layout = UniformLayout::new([
            ("u_time", UniformType::Float),
            ("u_resolution", UniformType::Vec2),
        ])
        .unwrap();
        let block = layout.glsl_block(0, 0, "ViewerParams", "params");
        assert!(block.starts_with("layout(std140, set = 0, binding = 0) uniform ViewerParams {"));
        assert!(block.contains("    float _u_time;\n"));
        assert!(block.contains("    vec2 _u_resolution;\n"));
        assert!(block.contains("} params;\n"));
        assert!(block.contains("#define u_time params._u_time\n"));
        assert!(block.contains("#define u_resolution params._u_resolution\n"));
    }

    #[test]
    fn set_writes_bytes_at_field_offset() {
        let mut block = UniformBlock::new(slime_like_layout());
        block.mark_clean();

        block.try_set("COLOR", [0.25f32, 0.5, 1.0]).unwrap();
        block.try_set("SCREEN_WIDTH", 1280u32).unwrap();
        assert!(block.is_dirty());

        let bytes = block.bytes();
        assert_eq!(bytemuck::pod_read_unaligned::<i32>(&bytes[0..4]), 1280);
        assert_eq!(bytemuck::pod_read_unaligned::<f32>(&bytes[16..20]), 0.25);
        assert_eq!(bytemuck::pod_read_unaligned::<f32>(&bytes[24..28]), 1.0);
        assert_eq!(block.get("COLOR"), Some(UniformValue::Vec3([0.25, 0.5, 1.0])));
        assert_eq!(block.get("SCREEN_WIDTH"), Some(UniformValue::Int(1280)));
    }

    #[test]
    fn try_set_reports_unknown_and_mismatched() {
        let mut block = UniformBlock::new(slime_like_layout());
        assert_eq!(
            block.try_set("missing", 1.0f32),
            Err(UniformError::UnknownName("missing".into()))
        );
        assert_eq!(
            block.try_set("time", 3i32),
            Err(UniformError::TypeMismatch {
                name: "time".into(),
                expected: UniformType::Float,
                actual: UniformType::Int,
            })
        );
    }

    #[test]
    fn lenient_set_skips_missing_uniforms() {
        let mut block = UniformBlock::new(slime_like_layout());
        block.mark_clean();
        assert!(!block.set("not_declared", 1.0f32));
        assert!(!block.set("time", (1.0f32, 2.0f32)));
        assert!(!block.is_dirty());
        assert!(block.set("u_mouse", (3.0f32, 4.0f32)));
        assert_eq!(block.get("u_mouse"), Some(UniformValue::Vec2([3.0, 4.0])));
    }

    #[test]
    fn u32_conversion_saturates() {
        assert_eq!(UniformValue::from(u32::MAX), UniformValue::Int(i32::MAX));
        assert_eq!(UniformValue::from(7u32), UniformValue::Int(7));
    }
}
