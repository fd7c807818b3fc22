use std::borrow::Cow;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use wgpu::naga::ShaderStage;

use crate::gpu::with_validation;
use crate::types::GroupSize;
use crate::uniforms::UniformLayout;

/// Block and instance names used for injected uniform blocks.
pub const PARAMS_BLOCK: &str = "DemoParams";
pub const PARAMS_INSTANCE: &str = "params";

/// Where the generated uniform block is bound.
#[derive(Debug, Clone, Copy)]
pub struct UniformBinding<'a> {
    pub set: u32,
    pub binding: u32,
    pub layout: &'a UniformLayout,
}

/// Source rewriting applied before a GLSL file reaches naga.
#[derive(Debug, Clone, Default)]
pub struct ShaderPrelude<'a> {
    pub uniforms: Option<UniformBinding<'a>>,
    pub substitutions: Vec<(String, String)>,
}

impl<'a> ShaderPrelude<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uniforms(mut self, set: u32, binding: u32, layout: &'a UniformLayout) -> Self {
        self.uniforms = Some(UniformBinding {
            set,
            binding,
            layout,
        });
        self
    }

    pub fn with_group_size(mut self, group: GroupSize) -> Self {
        self.substitutions.extend(group_size_substitutions(group));
        self
    }

    pub fn with_substitution(mut self, token: impl Into<String>, value: impl Into<String>) -> Self {
        self.substitutions.push((token.into(), value.into()));
        self
    }
}

/// Tokens that compute shaders use for their `local_size_*` qualifiers.
pub fn group_size_substitutions(group: GroupSize) -> Vec<(String, String)> {
    vec![
        ("XGROUPSIZE_VAL".to_string(), group.x.to_string()),
        ("YGROUPSIZE_VAL".to_string(), group.y.to_string()),
        ("ZGROUPSIZE_VAL".to_string(), group.z.to_string()),
    ]
}

/// Produces the source handed to the GLSL frontend.
///
/// 1. Drop the first `#version` directive and any loose `uniform` declaration
///    of a name the injected block already provides.
/// 2. Replace substitution tokens in what remains.
/// 3. Prepend `#version 450`, the uniform block and `#line 1` so compiler
///    diagnostics keep pointing at the original file's lines.
pub fn prepare_source(source: &str, prelude: &ShaderPrelude<'_>) -> String {
    let layout = prelude.uniforms.map(|binding| binding.layout);
    let mut body = String::with_capacity(source.len());
    let mut skipped_version = false;
    for line in source.lines() {
        let trimmed = line.trim_start();
        if !skipped_version && trimmed.starts_with("#version") {
            skipped_version = true;
            continue;
        }
        if let Some(layout) = layout {
            if declares_block_uniform(trimmed, layout) {
                continue;
            }
        }
        body.push_str(line);
        body.push('\n');
    }

    for (token, value) in &prelude.substitutions {
        body = body.replace(token.as_str(), value);
    }

    let mut out = String::from("#version 450\n");
    if let Some(binding) = prelude.uniforms {
        out.push_str(&binding.layout.glsl_block(
            binding.set,
            binding.binding,
            PARAMS_BLOCK,
            PARAMS_INSTANCE,
        ));
    }
    out.push_str("#line 1\n");
    out.push_str(&body);
    out
}

fn declares_block_uniform(line: &str, layout: &UniformLayout) -> bool {
    let Some(rest) = line.strip_prefix("uniform ") else {
        return false;
    };
    let mut parts = rest.split_whitespace();
    let (Some(_ty), Some(name)) = (parts.next(), parts.next()) else {
        return false;
    };
    let name = name.trim_end_matches(';');
    layout.field(name).is_some()
}

pub fn load_shader_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read shader at {}", path.display()))
}

/// Compiles GLSL through naga, turning validation errors into `Err`.
pub fn compile_glsl(
    device: &wgpu::Device,
    label: &str,
    source: String,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule> {
    tracing::trace!(label, %source, "compiling shader");
    with_validation(device, label, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(source),
                stage,
                defines: &[],
            },
        })
    })
    .with_context(|| format!("failed to compile shader '{label}'"))
}

/// Reads, prepares and compiles one shader file.
pub fn compile_shader_file(
    device: &wgpu::Device,
    path: &Path,
    prelude: &ShaderPrelude<'_>,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule> {
    let source = load_shader_file(path)?;
    let label = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    compile_glsl(device, &label, prepare_source(&source, prelude), stage)
}

pub struct ProgramModules {
    pub vertex: wgpu::ShaderModule,
    pub fragment: wgpu::ShaderModule,
}

/// Compiles `{name}_fs.glsl` from `dir`, paired with `{name}_vs.glsl` when it
/// exists and the built-in fullscreen triangle otherwise.
pub fn compile_program(
    device: &wgpu::Device,
    dir: &Path,
    name: &str,
    prelude: &ShaderPrelude<'_>,
) -> Result<ProgramModules> {
    let fragment_path = dir.join(format!("{name}_fs.glsl"));
    let fragment = compile_shader_file(device, &fragment_path, prelude, ShaderStage::Fragment)?;

    let vertex_path = dir.join(format!("{name}_vs.glsl"));
    let vertex = if vertex_path.is_file() {
        tracing::debug!(path = %vertex_path.display(), "using custom vertex shader");
        compile_shader_file(device, &vertex_path, prelude, ShaderStage::Vertex)?
    } else {
        compile_fullscreen_vertex(device)?
    };

    Ok(ProgramModules { vertex, fragment })
}

/// Compiles the static full-screen triangle vertex shader.
pub fn compile_fullscreen_vertex(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    compile_glsl(
        device,
        "fullscreen triangle vertex",
        FULLSCREEN_VERTEX_GLSL.to_string(),
        ShaderStage::Vertex,
    )
}

/// Full-screen triangle; `v_uv` is (0, 0) at the bottom-left corner.
pub const FULLSCREEN_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::UniformType;
    use std::fs;
    use tempfile::TempDir;

    fn layout() -> UniformLayout {
        UniformLayout::new([
            ("u_time", UniformType::Float),
            ("u_resolution", UniformType::Vec2),
        ])
        .unwrap()
    }

    #[test]
    fn replaces_version_and_injects_block() {
        let layout = layout();
        let source = "#version 330 core\nout vec4 color;\nvoid main() { color = vec4(u_time); }\n";
        let prepared = prepare_source(source, &ShaderPrelude::new().with_uniforms(0, 0, &layout));

        assert!(prepared.starts_with("#version 450\nlayout(std140, set = 0, binding = 0)"));
        assert_eq!(prepared.matches("#version").count(), 1);
        assert!(prepared.contains("#define u_time params._u_time"));
        let body = prepared.split("#line 1\n").nth(1).unwrap();
        assert!(body.starts_with("out vec4 color;"));
    }

    #[test]
    fn strips_loose_declarations_of_block_members_only() {
        let layout = layout();
        let source = "uniform float u_time;\n  uniform vec2 u_resolution;\nuniform sampler2D tex;\n";
        let prepared = prepare_source(source, &ShaderPrelude::new().with_uniforms(0, 0, &layout));
        let body = prepared.split("#line 1\n").nth(1).unwrap();
        assert!(!body.contains("u_time"));
        assert!(!body.contains("u_resolution"));
        assert!(body.contains("uniform sampler2D tex;"));
    }

    #[test]
    fn substitutes_group_size_tokens() {
        let source = "layout(local_size_x = XGROUPSIZE_VAL, local_size_y = YGROUPSIZE_VAL, local_size_z = ZGROUPSIZE_VAL) in;\n";
        let prelude = ShaderPrelude::new().with_group_size(GroupSize::new(64, 2, 1));
        let prepared = prepare_source(source, &prelude);
        assert!(prepared.contains("local_size_x = 64, local_size_y = 2, local_size_z = 1"));
        assert!(!prepared.contains("GROUPSIZE_VAL"));
    }

    #[test]
    fn source_without_version_or_uniforms() {
        let prepared = prepare_source("void main() {}\n", &ShaderPrelude::new());
        assert_eq!(prepared, "#version 450\n#line 1\nvoid main() {}\n");
    }

    #[test]
    fn custom_substitutions_apply_in_order() {
        let prelude = ShaderPrelude::new()
            .with_substitution("MAX_STEPS", "128")
            .with_substitution("EPSILON", "0.001");
        let prepared = prepare_source("int n = MAX_STEPS; float e = EPSILON;\n", &prelude);
        assert!(prepared.contains("int n = 128; float e = 0.001;"));
    }

    #[test]
    fn only_first_version_directive_is_removed() {
        let prepared = prepare_source("#version 330\n#version 450\n", &ShaderPrelude::new());
        assert_eq!(prepared.matches("#version").count(), 2);
    }

    #[test]
    fn load_shader_file_reports_missing_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing_fs.glsl");
        let err = load_shader_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("missing_fs.glsl"));

        fs::write(&path, "void main() {}").unwrap();
        assert_eq!(load_shader_file(&path).unwrap(), "void main() {}");
    }
}
