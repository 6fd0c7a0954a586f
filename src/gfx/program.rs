// Copyright (c) 2026 rezky_nightky

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::ProgramId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgramError {
    Compile { stage: ShaderStage, log: String },
    Link { log: String },
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::Compile { stage, log } => {
                write!(f, "{} shader failed to compile: {}", stage, log)
            }
            ProgramError::Link { log } => write!(f, "program failed to link: {}", log),
        }
    }
}

impl std::error::Error for ProgramError {}

/// Turns shader source text plus compile-time feature defines into a
/// program handle.
pub trait ProgramLoader {
    fn load_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
        defines: &[&str],
    ) -> Result<ProgramId, ProgramError>;

    fn delete_program(&mut self, program: ProgramId);
}

/// Inserts one `#define` line per entry right after the `#version` line, or
/// at the very top when the source has no version directive.
pub fn inject_defines(source: &str, defines: &[&str]) -> String {
    if defines.is_empty() {
        return source.to_string();
    }

    let pos = match source.find("#version") {
        Some(v) => source[v..]
            .find('\n')
            .map(|nl| v + nl + 1)
            .unwrap_or(source.len()),
        None => 0,
    };

    let mut out = String::with_capacity(source.len() + defines.len() * 24);
    out.push_str(&source[..pos]);
    if pos == source.len() && !source.ends_with('\n') && !source.is_empty() {
        out.push('\n');
    }
    for d in defines {
        out.push_str("#define ");
        out.push_str(d);
        out.push('\n');
    }
    out.push_str(&source[pos..]);
    out
}

/// Vertex stages the software context knows how to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexStage {
    Fullscreen,
    Glyph,
}

/// Fragment kernels the software context knows how to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kernel {
    Glyph,
    Copy,
    BlurHorizontal,
    BlurVertical,
    BloomPrefilter,
    BloomDownsample,
    BloomUpsample,
    ToneMap,
}

impl Kernel {
    fn from_name(name: &str) -> Option<Kernel> {
        Some(match name {
            "glyph" => Kernel::Glyph,
            "copy" => Kernel::Copy,
            "blur_horizontal" => Kernel::BlurHorizontal,
            "blur_vertical" => Kernel::BlurVertical,
            "bloom_prefilter" => Kernel::BloomPrefilter,
            "bloom_downsample" => Kernel::BloomDownsample,
            "bloom_upsample" => Kernel::BloomUpsample,
            "tonemap" => Kernel::ToneMap,
            _ => return None,
        })
    }

    fn vertex_stage(self) -> VertexStage {
        match self {
            Kernel::Glyph => VertexStage::Glyph,
            _ => VertexStage::Fullscreen,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Uniform {
    F32(f32),
    I32(i32),
}

#[derive(Clone, Debug)]
pub struct Program {
    pub vertex: VertexStage,
    pub kernel: Kernel,
    uniforms: HashMap<String, Uniform>,
}

impl Program {
    pub fn set_uniform(&mut self, name: &str, value: Uniform) {
        self.uniforms.insert(name.to_string(), value);
    }

    /// Unset uniforms read as zero.
    pub fn f32(&self, name: &str) -> f32 {
        match self.uniforms.get(name) {
            Some(Uniform::F32(v)) => *v,
            Some(Uniform::I32(v)) => *v as f32,
            None => 0.0,
        }
    }

    pub fn i32(&self, name: &str) -> i32 {
        match self.uniforms.get(name) {
            Some(Uniform::I32(v)) => *v,
            Some(Uniform::F32(v)) => *v as i32,
            None => 0,
        }
    }
}

#[derive(Debug, Default)]
struct Directives {
    kernel: Option<String>,
    vertex: Option<String>,
}

fn parse_condition(expr: &str, defined: &HashSet<String>) -> Result<bool, String> {
    let expr = expr.trim();
    if let Some(rest) = expr.strip_prefix('!') {
        return parse_condition(rest, defined).map(|v| !v);
    }
    if let Some(inner) = expr
        .strip_prefix("defined(")
        .and_then(|r| r.strip_suffix(')'))
    {
        return Ok(defined.contains(inner.trim()));
    }
    if let Some(name) = expr.strip_prefix("defined ") {
        return Ok(defined.contains(name.trim()));
    }
    match expr {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(format!("unsupported #if expression: {}", expr)),
    }
}

struct Branch {
    parent_active: bool,
    taken: bool,
    active: bool,
}

/// Runs the conditional-compilation subset of the GLSL preprocessor and
/// collects the `#pragma` directives that survive it.
fn preprocess(source: &str) -> Result<Directives, String> {
    let mut defined: HashSet<String> = HashSet::new();
    let mut stack: Vec<Branch> = Vec::new();
    let mut out = Directives::default();
    let mut seen_version = false;

    for (n, raw) in source.lines().enumerate() {
        let line = raw.trim();
        let Some(directive) = line.strip_prefix('#') else {
            continue;
        };
        let directive = directive.trim_start();
        let (word, rest) = directive
            .split_once(char::is_whitespace)
            .map(|(w, r)| (w, r.trim()))
            .unwrap_or((directive, ""));
        let active = stack.last().map(|b| b.active).unwrap_or(true);

        if !seen_version {
            if word != "version" {
                return Err(format!("line {}: #version must come first", n + 1));
            }
            seen_version = true;
            continue;
        }

        match word {
            "version" => return Err(format!("line {}: duplicate #version", n + 1)),
            "define" if active => {
                if let Some(name) = rest.split_whitespace().next() {
                    defined.insert(name.to_string());
                }
            }
            "undef" if active => {
                defined.remove(rest);
            }
            "if" | "ifdef" | "ifndef" => {
                let cond = if !active {
                    false
                } else {
                    match word {
                        "ifdef" => defined.contains(rest),
                        "ifndef" => !defined.contains(rest),
                        _ => parse_condition(rest, &defined)
                            .map_err(|e| format!("line {}: {}", n + 1, e))?,
                    }
                };
                stack.push(Branch {
                    parent_active: active,
                    taken: cond,
                    active: cond,
                });
            }
            "elif" => {
                let Some(b) = stack.last_mut() else {
                    return Err(format!("line {}: #elif without #if", n + 1));
                };
                if b.taken || !b.parent_active {
                    b.active = false;
                } else {
                    let cond = parse_condition(rest, &defined)
                        .map_err(|e| format!("line {}: {}", n + 1, e))?;
                    b.active = cond;
                    b.taken = cond;
                }
            }
            "else" => {
                let Some(b) = stack.last_mut() else {
                    return Err(format!("line {}: #else without #if", n + 1));
                };
                b.active = b.parent_active && !b.taken;
                b.taken = true;
            }
            "endif" => {
                if stack.pop().is_none() {
                    return Err(format!("line {}: #endif without #if", n + 1));
                }
            }
            "error" if active => {
                return Err(format!("line {}: #error {}", n + 1, rest));
            }
            "pragma" if active => {
                if let Some((kind, name)) = rest.split_once(char::is_whitespace) {
                    match kind {
                        "kernel" => out.kernel = Some(name.trim().to_string()),
                        "vertex" => out.vertex = Some(name.trim().to_string()),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    if !seen_version {
        return Err("missing #version directive".to_string());
    }
    if !stack.is_empty() {
        return Err("unterminated #if block".to_string());
    }
    Ok(out)
}

/// Compiles both stages and links them into a [`Program`].
pub fn build_program(
    vertex_source: &str,
    fragment_source: &str,
    defines: &[&str],
) -> Result<Program, ProgramError> {
    let vs = preprocess(&inject_defines(vertex_source, defines)).map_err(|log| {
        ProgramError::Compile {
            stage: ShaderStage::Vertex,
            log,
        }
    })?;
    let fs = preprocess(&inject_defines(fragment_source, defines)).map_err(|log| {
        ProgramError::Compile {
            stage: ShaderStage::Fragment,
            log,
        }
    })?;

    let vertex = match vs.vertex.as_deref() {
        Some("fullscreen") => VertexStage::Fullscreen,
        Some("glyph") => VertexStage::Glyph,
        Some(other) => {
            return Err(ProgramError::Compile {
                stage: ShaderStage::Vertex,
                log: format!("unknown vertex stage: {}", other),
            })
        }
        None => {
            return Err(ProgramError::Compile {
                stage: ShaderStage::Vertex,
                log: "no vertex stage selected".to_string(),
            })
        }
    };

    let kernel = match fs.kernel.as_deref() {
        Some(name) => Kernel::from_name(name).ok_or_else(|| ProgramError::Compile {
            stage: ShaderStage::Fragment,
            log: format!("unknown kernel: {}", name),
        })?,
        None => {
            return Err(ProgramError::Compile {
                stage: ShaderStage::Fragment,
                log: "no kernel selected".to_string(),
            })
        }
    };

    if kernel.vertex_stage() != vertex {
        return Err(ProgramError::Link {
            log: format!(
                "kernel {:?} cannot be fed by the {:?} vertex stage",
                kernel, vertex
            ),
        });
    }

    Ok(Program {
        vertex,
        kernel,
        uniforms: HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders;

    #[test]
    fn defines_land_right_after_version_line() {
        let src = "#version 330\nvoid main() {}\n";
        let out = inject_defines(src, &["HORIZONTAL", "FAST"]);
        assert_eq!(
            out,
            "#version 330\n#define HORIZONTAL\n#define FAST\nvoid main() {}\n"
        );
    }

    #[test]
    fn defines_go_first_without_version() {
        let out = inject_defines("void main() {}", &["X"]);
        assert_eq!(out, "#define X\nvoid main() {}");
    }

    #[test]
    fn no_defines_leaves_source_untouched() {
        let src = "\n    #version 330\n";
        assert_eq!(inject_defines(src, &[]), src);
    }

    #[test]
    fn blur_direction_selects_kernel() {
        let h = build_program(shaders::FULLSCREEN_VS, shaders::BLUR_FS, &["HORIZONTAL"]).unwrap();
        let v = build_program(shaders::FULLSCREEN_VS, shaders::BLUR_FS, &["VERTICAL"]).unwrap();
        assert_eq!(h.kernel, Kernel::BlurHorizontal);
        assert_eq!(v.kernel, Kernel::BlurVertical);
    }

    #[test]
    fn blur_without_direction_hits_error_directive() {
        let err = build_program(shaders::FULLSCREEN_VS, shaders::BLUR_FS, &[]).unwrap_err();
        match err {
            ProgramError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("#error"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn mismatched_stages_fail_to_link() {
        let err = build_program(shaders::GLYPH_VS, shaders::TONEMAP_FS, &[]).unwrap_err();
        assert!(matches!(err, ProgramError::Link { .. }));
    }

    #[test]
    fn missing_version_is_a_compile_error() {
        let err = build_program("#pragma vertex fullscreen\n", shaders::COPY_FS, &[]).unwrap_err();
        assert!(matches!(
            err,
            ProgramError::Compile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
    }

    #[test]
    fn nested_conditionals_follow_active_branch() {
        let src = "#version 330\n#pragma vertex fullscreen\n#if defined(A)\n#if defined(B)\n#error nope\n#endif\n#else\n#error outer\n#endif\n";
        assert!(preprocess(&inject_defines(src, &["A"])).is_ok());
        assert!(preprocess(&inject_defines(src, &["A", "B"])).is_err());
        assert!(preprocess(src).is_err());
    }

    fn declares_uniform(source: &str, name: &str) -> bool {
        source
            .lines()
            .map(str::trim)
            .any(|l| l.starts_with("uniform ") && l.ends_with(&format!(" {};", name)))
    }

    #[test]
    fn every_shader_pair_resolves_to_its_kernel() {
        let table: &[(&str, &str, &[&str], Kernel, &[&str])] = &[
            (shaders::GLYPH_VS, shaders::GLYPH_FS, &[], Kernel::Glyph, &["uFont"]),
            (shaders::FULLSCREEN_VS, shaders::COPY_FS, &[], Kernel::Copy, &["uTexture"]),
            (
                shaders::FULLSCREEN_VS,
                shaders::BLUR_FS,
                &["HORIZONTAL"],
                Kernel::BlurHorizontal,
                &["uTexture", "uStrength"],
            ),
            (
                shaders::FULLSCREEN_VS,
                shaders::BLUR_FS,
                &["VERTICAL"],
                Kernel::BlurVertical,
                &["uTexture", "uStrength"],
            ),
            (
                shaders::FULLSCREEN_VS,
                shaders::BLOOM_PREFILTER_FS,
                &[],
                Kernel::BloomPrefilter,
                &["uSource", "uThreshold", "uKnee"],
            ),
            (
                shaders::FULLSCREEN_VS,
                shaders::BLOOM_DOWNSAMPLE_FS,
                &[],
                Kernel::BloomDownsample,
                &["uSource"],
            ),
            (
                shaders::FULLSCREEN_VS,
                shaders::BLOOM_UPSAMPLE_FS,
                &[],
                Kernel::BloomUpsample,
                &["uPrevious", "uDownsample"],
            ),
            (
                shaders::FULLSCREEN_VS,
                shaders::TONEMAP_FS,
                &[],
                Kernel::ToneMap,
                &["uBase", "uBloom", "uExposure", "uBloomIntensity"],
            ),
        ];

        for &(vs, fs, defines, kernel, uniforms) in table {
            let p = build_program(vs, fs, defines).unwrap();
            assert_eq!(p.kernel, kernel);
            assert_eq!(p.vertex, kernel.vertex_stage());
            for name in uniforms {
                assert!(declares_uniform(fs, name), "{:?} lacks {}", kernel, name);
            }
        }
        assert!(declares_uniform(shaders::GLYPH_VS, "uScreenWidth"));
        assert!(declares_uniform(shaders::GLYPH_VS, "uScreenHeight"));
    }

    #[test]
    fn unset_uniforms_read_as_zero() {
        let p = build_program(shaders::FULLSCREEN_VS, shaders::COPY_FS, &[]).unwrap();
        assert_eq!(p.f32("uStrength"), 0.0);
        assert_eq!(p.i32("uTexture"), 0);
    }
}
