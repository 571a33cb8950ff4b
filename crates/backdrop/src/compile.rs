//! GLSL front-end shared by every device backend.
//!
//! Effect fragments are written against a WebGL-style contract: loose
//! `uniform` declarations, `gl_FragColor`, and a bottom-left `gl_FragCoord`.
//! [`wrap_effect_fragment`] rewrites them into GLSL 450 with a single std140
//! uniform block, then [`compile_stage`] parses and validates the result with
//! naga and reflects the interface the program builder needs.

use std::collections::BTreeMap;
use std::fmt;

use wgpu::naga;

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub(crate) fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Names of the uniforms every effect may read.
pub const CONTRACT_UNIFORMS: [&str; 5] = ["iTime", "iResolution", "iColor1", "iColor2", "iColor3"];

/// Vertex stage shared by every effect: passes the quad corners through.
pub const VERTEX_SHADER_GLSL: &str = include_str!("../shaders/quad.vert");

const FRAG_COLOR_OUTPUT: &str = "backdrop_frag_color";
const FRAG_COORD_GLOBAL: &str = "backdrop_frag_coord";
const EFFECT_ENTRY: &str = "backdrop_effect_main";

/// Declares the contract uniforms in a std140 block plus the renamed builtins.
///
/// The block is anonymous so effects keep addressing `iTime` and friends
/// directly, and reflection reports members under those names.
const FRAGMENT_PRELUDE: &str = r"#version 450
layout(location = 0) out vec4 backdrop_frag_color;

layout(std140, set = 0, binding = 0) uniform BackdropUniforms {
    float iTime;
    vec2 iResolution;
    vec3 iColor1;
    vec3 iColor2;
    vec3 iColor3;
};

vec4 backdrop_frag_coord;
";

/// Flips the hardware coordinate to a bottom-left origin, then runs the effect.
const FRAGMENT_EPILOGUE: &str = r"
void main() {
    backdrop_frag_coord = vec4(gl_FragCoord.x, iResolution.y - gl_FragCoord.y, gl_FragCoord.z, gl_FragCoord.w);
    backdrop_effect_main();
}
";

/// Produces a self-contained GLSL 450 fragment shader from effect source.
///
/// 1. Drops `#version`, `precision`, and contract `uniform` declarations.
/// 2. Renames `gl_FragColor`, `gl_FragCoord`, and `main` in the effect body.
/// 3. Wraps the body in [`FRAGMENT_PRELUDE`] and [`FRAGMENT_EPILOGUE`].
pub fn wrap_effect_fragment(source: &str) -> String {
    let mut body = String::with_capacity(source.len());
    for line in source.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#version") || trimmed.starts_with("precision ") {
            continue;
        }
        if trimmed.starts_with("uniform ") && declares_contract_uniform(trimmed) {
            continue;
        }
        body.push_str(line);
        body.push('\n');
    }

    let body = rename_identifier(&body, "gl_FragColor", FRAG_COLOR_OUTPUT);
    let body = rename_identifier(&body, "gl_FragCoord", FRAG_COORD_GLOBAL);
    let body = rename_identifier(&body, "main", EFFECT_ENTRY);

    format!("{FRAGMENT_PRELUDE}\n{body}{FRAGMENT_EPILOGUE}")
}

fn declares_contract_uniform(line: &str) -> bool {
    line.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .skip(2)
        .any(|token| CONTRACT_UNIFORMS.contains(&token))
}

/// Replaces whole-identifier occurrences of `from` with `to`.
fn rename_identifier(source: &str, from: &str, to: &str) -> String {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut out = String::with_capacity(source.len());
    let mut copied = 0;
    for (index, _) in source.match_indices(from) {
        let before = source[..index].chars().next_back();
        let after = source[index + from.len()..].chars().next();
        if before.map_or(false, is_ident) || after.map_or(false, is_ident) {
            continue;
        }
        out.push_str(&source[copied..index]);
        out.push_str(to);
        copied = index + from.len();
    }
    out.push_str(&source[copied..]);
    out
}

/// Shader that passed parsing and validation, with its reflected interface.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub source: String,
    pub reflection: StageReflection,
}

/// Interface facts pulled out of a validated naga module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReflection {
    pub entry_point: Option<String>,
    pub inputs: Vec<InterfaceVariable>,
    pub outputs: Vec<InterfaceVariable>,
    pub uniform_block: Option<UniformBlock>,
}

/// Location-bound stage input or output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceVariable {
    pub name: Option<String>,
    pub location: u32,
}

/// Uniform buffer block with member offsets keyed by name.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBlock {
    pub group: u32,
    pub binding: u32,
    pub size: u32,
    pub members: BTreeMap<String, UniformMember>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformMember {
    pub offset: u32,
    pub kind: UniformKind,
}

/// Shape of a uniform member as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Other,
}

impl UniformKind {
    fn of(inner: &naga::TypeInner) -> Self {
        match inner {
            naga::TypeInner::Scalar(scalar) if scalar.kind == naga::ScalarKind::Float => {
                UniformKind::Float
            }
            naga::TypeInner::Vector { size, scalar } if scalar.kind == naga::ScalarKind::Float => {
                match size {
                    naga::VectorSize::Bi => UniformKind::Vec2,
                    naga::VectorSize::Tri => UniformKind::Vec3,
                    naga::VectorSize::Quad => UniformKind::Vec4,
                }
            }
            _ => UniformKind::Other,
        }
    }
}

/// Parses and validates `source`, returning the driver-style log on failure.
pub fn compile_stage(stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(stage.to_naga());
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| errors.emit_to_string(source))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|error| error.emit_to_string(source))?;

    Ok(CompiledStage {
        stage,
        source: source.to_owned(),
        reflection: reflect(&module, stage),
    })
}

fn reflect(module: &naga::Module, stage: ShaderStage) -> StageReflection {
    let mut reflection = StageReflection {
        uniform_block: uniform_block(module),
        ..StageReflection::default()
    };

    let Some(entry) = module
        .entry_points
        .iter()
        .find(|entry| entry.stage == stage.to_naga())
    else {
        return reflection;
    };

    reflection.entry_point = Some(entry.name.clone());
    for argument in &entry.function.arguments {
        collect_locations(
            module,
            argument.name.as_deref(),
            argument.ty,
            argument.binding.as_ref(),
            &mut reflection.inputs,
        );
    }
    if let Some(result) = entry.function.result.as_ref() {
        collect_locations(
            module,
            None,
            result.ty,
            result.binding.as_ref(),
            &mut reflection.outputs,
        );
    }
    reflection.inputs.sort_by_key(|variable| variable.location);
    reflection.outputs.sort_by_key(|variable| variable.location);
    reflection
}

fn collect_locations(
    module: &naga::Module,
    name: Option<&str>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<InterfaceVariable>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => out.push(InterfaceVariable {
            name: name.map(str::to_owned),
            location: *location,
        }),
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(
                        module,
                        member.name.as_deref(),
                        member.ty,
                        member.binding.as_ref(),
                        out,
                    );
                }
            }
        }
    }
}

fn uniform_block(module: &naga::Module) -> Option<UniformBlock> {
    module.global_variables.iter().find_map(|(_, variable)| {
        if variable.space != naga::AddressSpace::Uniform {
            return None;
        }
        let binding = variable.binding.as_ref()?;
        let naga::TypeInner::Struct { members, span } = &module.types[variable.ty].inner else {
            return None;
        };
        let members = members
            .iter()
            .filter_map(|member| {
                let name = member.name.clone()?;
                let kind = UniformKind::of(&module.types[member.ty].inner);
                Some((
                    name,
                    UniformMember {
                        offset: member.offset,
                        kind,
                    },
                ))
            })
            .collect();
        Some(UniformBlock {
            group: binding.group,
            binding: binding.binding,
            size: *span,
            members,
        })
    })
}

/// Interface shared by both stages once they link.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedLayout {
    pub attributes: Vec<InterfaceVariable>,
    pub uniform_block: Option<UniformBlock>,
}

impl LinkedLayout {
    /// Location of the named vertex attribute.
    ///
    /// The GLSL front-end does not always keep interface names, so a program
    /// with exactly one attribute answers for it under any name.
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name.as_deref() == Some(name))
            .or_else(|| match self.attributes.as_slice() {
                [only] if only.name.is_none() => Some(only),
                _ => None,
            })
            .map(|attribute| attribute.location)
    }

    pub fn uniform(&self, name: &str) -> Option<UniformMember> {
        self.uniform_block
            .as_ref()
            .and_then(|block| block.members.get(name).copied())
    }
}

/// Checks that two compiled stages form a program.
pub fn link_stages(vertex: &CompiledStage, fragment: &CompiledStage) -> Result<LinkedLayout, String> {
    if vertex.stage != ShaderStage::Vertex {
        return Err(format!("vertex slot holds a {} shader", vertex.stage));
    }
    if fragment.stage != ShaderStage::Fragment {
        return Err(format!("fragment slot holds a {} shader", fragment.stage));
    }
    if vertex.reflection.entry_point.is_none() {
        return Err("vertex shader has no entry point".to_owned());
    }
    if fragment.reflection.entry_point.is_none() {
        return Err("fragment shader has no entry point".to_owned());
    }

    for input in &fragment.reflection.inputs {
        let written = vertex
            .reflection
            .outputs
            .iter()
            .any(|output| output.location == input.location);
        if !written {
            return Err(format!(
                "fragment input at location {} is not written by the vertex shader",
                input.location
            ));
        }
    }

    let uniform_block = match (
        vertex.reflection.uniform_block.as_ref(),
        fragment.reflection.uniform_block.as_ref(),
    ) {
        (Some(a), Some(b)) if a.group == b.group && a.binding == b.binding && a != b => {
            return Err(format!(
                "uniform block at group {} binding {} differs between stages",
                a.group, a.binding
            ));
        }
        (a, b) => b.or(a).cloned(),
    };

    Ok(LinkedLayout {
        attributes: vertex.reflection.inputs.clone(),
        uniform_block,
    })
}

/// Prefixes each line with its number for diagnostics.
pub fn numbered_source(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + source.len() / 8);
    for (index, line) in source.lines().enumerate() {
        out.push_str(&format!("{:>4} | {}\n", index + 1, line));
    }
    out
}
