//! GPU fractal renderer using glow (OpenGL).
//!
//! egui repaints the whole window on every input event, but the fractal only
//! needs re-rendering when the viewport changed. The fractal pass therefore
//! renders into an offscreen framebuffer, and every egui frame just blits that
//! cached texture inside an [`egui::PaintCallback`]. A skipped redraw leaves
//! the previous image on screen.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};

use glow::HasContext as _;
use thiserror::Error;

use crate::rendering::scheduler::FrameConsumer;
use crate::rendering::viewport::FractalUniforms;

// ─── Shader sources ─────────────────────────────────────────────────────

const VERT_SRC: &str = r#"#version 140

in vec2 a_pos;
out vec2 v_uv;

void main() {
    // Map [-1, 1] NDC to [0, 1] UV with y=0 at screen top
    v_uv = vec2(a_pos.x * 0.5 + 0.5, 0.5 - a_pos.y * 0.5);
    gl_Position = vec4(a_pos, 0.0, 1.0);
}
"#;

const FRACTAL_FRAG_SRC: &str = r#"#version 140

in vec2 v_uv;
out vec4 frag_color;

uniform float windowWidth;
uniform float windowHeight;
uniform float realAxisOffset;
uniform float imaginaryAxisOffset;
uniform float zoom;

const int MAX_ITERATIONS = 512;

void main() {
    // v_uv is (px / width, py / height); same law as screen_to_complex
    float aspect = windowWidth / windowHeight;
    vec2 c = vec2(
        realAxisOffset + 2.0 * aspect * (v_uv.x - 0.5) / zoom,
        imaginaryAxisOffset - 2.0 * (v_uv.y - 0.5) / zoom
    );

    vec2 z = vec2(0.0);
    int i = 0;
    for (; i < MAX_ITERATIONS; ++i) {
        z = vec2(z.x * z.x - z.y * z.y, 2.0 * z.x * z.y) + c;
        if (dot(z, z) > 256.0) {
            break;
        }
    }

    if (i == MAX_ITERATIONS) {
        frag_color = vec4(0.0, 0.0, 0.0, 1.0);
        return;
    }

    // Fractional escape count, removes colour banding
    float smooth_i = float(i) + 1.0 - log2(0.5 * log2(dot(z, z)));
    vec3 rgb = 0.5 + 0.5 * cos(3.0 + smooth_i * 0.15 + vec3(0.0, 0.6, 1.0));
    frag_color = vec4(rgb, 1.0);
}
"#;

const PRESENT_FRAG_SRC: &str = r#"#version 140

in vec2 v_uv;
out vec4 frag_color;

uniform sampler2D u_frame;

void main() {
    // Texture rows run bottom-up
    frag_color = texture(u_frame, vec2(v_uv.x, 1.0 - v_uv.y));
}
"#;

/// Both programs bind `a_pos` here so they can share one VAO.
const A_POS_LOCATION: u32 = 0;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("no OpenGL context; eframe must run with the glow renderer")]
    NoGlContext,
    #[error("GL: failed to create {what}: {reason}")]
    Create { what: &'static str, reason: String },
    #[error("GL: {stage} shader failed to compile:\n{log}")]
    Compile { stage: &'static str, log: String },
    #[error("GL: program link failed:\n{0}")]
    Link(String),
    #[error("GL: framebuffer incomplete (status {0:#x})")]
    IncompleteFramebuffer(u32),
}

// ─── GL resource bundle ─────────────────────────────────────────────────

struct FractalProgram {
    program: glow::Program,
    loc_window_width: Option<glow::UniformLocation>,
    loc_window_height: Option<glow::UniformLocation>,
    loc_real_axis_offset: Option<glow::UniformLocation>,
    loc_imaginary_axis_offset: Option<glow::UniformLocation>,
    loc_zoom: Option<glow::UniformLocation>,
}

struct PresentProgram {
    program: glow::Program,
    loc_frame: Option<glow::UniformLocation>,
}

/// Created in field order, destroyed in reverse.
struct GlResources {
    vbo: glow::Buffer,
    vao: glow::VertexArray,
    fractal: FractalProgram,
    present: PresentProgram,
}

/// Offscreen colour buffer holding the last rendered fractal.
struct RenderTarget {
    texture: glow::Texture,
    framebuffer: glow::Framebuffer,
    width: i32,
    height: i32,
}

// ─── Public shared state ────────────────────────────────────────────────

/// Shared state for the fractal renderer.
///
/// Wrap in `Arc<Mutex<GlFractalState>>` and share between the app logic
/// (which drives it as a [`FrameConsumer`]) and the [`egui::PaintCallback`]
/// (which issues the GL calls).
pub struct GlFractalState {
    resources: Option<GlResources>,
    target: Option<RenderTarget>,
    uniforms: Option<FractalUniforms>,
    redraw_pending: bool,
    clear_color: [f32; 4],
}

impl GlFractalState {
    /// Compile shaders and upload the fullscreen quad. Needs a current GL context.
    pub fn new(gl: &glow::Context, clear_color: [f32; 4]) -> Result<Self, RendererError> {
        let resources = init_resources(gl)?;
        log::info!("fractal shaders compiled and linked");
        Ok(Self {
            resources: Some(resources),
            target: None,
            uniforms: None,
            redraw_pending: false,
            clear_color,
        })
    }

    /// Release GL resources in reverse creation order. Must be called with a
    /// current GL context.
    pub fn destroy(&mut self, gl: &glow::Context) {
        if let Some(target) = self.target.take() {
            target.destroy(gl);
        }
        if let Some(res) = self.resources.take() {
            unsafe {
                gl.delete_program(res.present.program);
                gl.delete_program(res.fractal.program);
                gl.delete_vertex_array(res.vao);
                gl.delete_buffer(res.vbo);
            }
            log::debug!("fractal GL resources released");
        }
    }

    fn paint(&mut self, gl: &glow::Context, info: &egui::PaintCallbackInfo) {
        let Self {
            resources,
            target,
            uniforms,
            redraw_pending,
            clear_color,
        } = self;
        let Some(res) = resources.as_ref() else {
            return;
        };

        let vp = info.viewport_in_pixels();
        let (width, height) = (vp.width_px as i32, vp.height_px as i32);
        if width <= 0 || height <= 0 {
            return;
        }

        // ── (re)allocate the offscreen target on size change ──
        let stale = target
            .as_ref()
            .map_or(true, |t| t.width != width || t.height != height);
        if stale {
            if let Some(old) = target.take() {
                old.destroy(gl);
            }
            match RenderTarget::new(gl, width, height) {
                Ok(created) => {
                    log::debug!("fractal render target {width}x{height}");
                    *target = Some(created);
                    *redraw_pending = true;
                }
                Err(error) => {
                    log::error!("{error}");
                    return;
                }
            }
        }
        let Some(frame) = target.as_ref() else {
            return;
        };

        unsafe {
            gl.disable(glow::SCISSOR_TEST);
            gl.disable(glow::BLEND);
        }

        // ── fractal pass, only when owed ──
        if *redraw_pending {
            render_fractal(gl, res, frame, uniforms.as_ref(), *clear_color);
            unsafe {
                gl.viewport(vp.left_px as i32, vp.from_bottom_px as i32, width, height);
            }
            *redraw_pending = false;
        }

        // ── present cached frame ──
        unsafe {
            gl.use_program(Some(res.present.program));
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(frame.texture));
            gl.uniform_1_i32(res.present.loc_frame.as_ref(), 0);

            gl.bind_vertex_array(Some(res.vao));
            gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
            gl.bind_vertex_array(None);

            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.use_program(None);
        }
    }
}

impl FrameConsumer for GlFractalState {
    fn upload_uniforms(&mut self, uniforms: &FractalUniforms) {
        self.uniforms = Some(*uniforms);
    }

    /// The GL work itself happens in the next paint callback.
    fn redraw(&mut self) {
        self.redraw_pending = true;
    }
}

// ─── GL helpers ─────────────────────────────────────────────────────────

fn compile_shader(
    gl: &glow::Context,
    kind: u32,
    stage: &'static str,
    source: &str,
) -> Result<glow::Shader, RendererError> {
    unsafe {
        let shader = gl.create_shader(kind).map_err(|reason| RendererError::Create {
            what: "shader",
            reason,
        })?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(RendererError::Compile { stage, log });
        }
        Ok(shader)
    }
}

fn link_program(
    gl: &glow::Context,
    vert_src: &str,
    frag_src: &str,
) -> Result<glow::Program, RendererError> {
    unsafe {
        let vert = compile_shader(gl, glow::VERTEX_SHADER, "vertex", vert_src)?;
        let frag = match compile_shader(gl, glow::FRAGMENT_SHADER, "fragment", frag_src) {
            Ok(frag) => frag,
            Err(error) => {
                gl.delete_shader(vert);
                return Err(error);
            }
        };

        let program = gl.create_program().map_err(|reason| RendererError::Create {
            what: "program",
            reason,
        })?;
        gl.attach_shader(program, vert);
        gl.attach_shader(program, frag);
        gl.bind_attrib_location(program, A_POS_LOCATION, "a_pos");
        gl.link_program(program);
        let linked = gl.get_program_link_status(program);
        gl.detach_shader(program, vert);
        gl.detach_shader(program, frag);
        gl.delete_shader(vert);
        gl.delete_shader(frag);

        if !linked {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(RendererError::Link(log));
        }
        Ok(program)
    }
}

fn init_resources(gl: &glow::Context) -> Result<GlResources, RendererError> {
    unsafe {
        // ── fullscreen quad (triangle strip) ──
        let vertices: [f32; 8] = [
            -1.0, -1.0,
             1.0, -1.0,
            -1.0,  1.0,
             1.0,  1.0,
        ];
        let vbo = gl.create_buffer().map_err(|reason| RendererError::Create {
            what: "vertex buffer",
            reason,
        })?;
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        let vertex_bytes: &[u8] = core::slice::from_raw_parts(
            vertices.as_ptr() as *const u8,
            core::mem::size_of_val(&vertices),
        );
        gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, vertex_bytes, glow::STATIC_DRAW);

        let vao = gl.create_vertex_array().map_err(|reason| RendererError::Create {
            what: "vertex array",
            reason,
        })?;
        gl.bind_vertex_array(Some(vao));
        gl.enable_vertex_attrib_array(A_POS_LOCATION);
        gl.vertex_attrib_pointer_f32(A_POS_LOCATION, 2, glow::FLOAT, false, 8, 0);
        gl.bind_vertex_array(None);
        gl.bind_buffer(glow::ARRAY_BUFFER, None);

        // ── programs ──
        let fractal = link_program(gl, VERT_SRC, FRACTAL_FRAG_SRC)?;
        let present = match link_program(gl, VERT_SRC, PRESENT_FRAG_SRC) {
            Ok(present) => present,
            Err(error) => {
                gl.delete_program(fractal);
                return Err(error);
            }
        };

        // ── uniform locations ──
        let loc = |program: glow::Program, name: &str| gl.get_uniform_location(program, name);

        Ok(GlResources {
            vbo,
            vao,
            fractal: FractalProgram {
                program: fractal,
                loc_window_width: loc(fractal, "windowWidth"),
                loc_window_height: loc(fractal, "windowHeight"),
                loc_real_axis_offset: loc(fractal, "realAxisOffset"),
                loc_imaginary_axis_offset: loc(fractal, "imaginaryAxisOffset"),
                loc_zoom: loc(fractal, "zoom"),
            },
            present: PresentProgram {
                program: present,
                loc_frame: loc(present, "u_frame"),
            },
        })
    }
}

/// Framebuffer bound right now, so offscreen passes can put it back.
fn current_framebuffer(gl: &glow::Context) -> Option<glow::Framebuffer> {
    let id = unsafe { gl.get_parameter_i32(glow::FRAMEBUFFER_BINDING) };
    NonZeroU32::new(id as u32).map(glow::NativeFramebuffer)
}

impl RenderTarget {
    fn new(gl: &glow::Context, width: i32, height: i32) -> Result<Self, RendererError> {
        unsafe {
            let texture = gl.create_texture().map_err(|reason| RendererError::Create {
                what: "frame texture",
                reason,
            })?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                None,
            );
            gl.bind_texture(glow::TEXTURE_2D, None);

            let framebuffer = match gl.create_framebuffer() {
                Ok(fb) => fb,
                Err(reason) => {
                    gl.delete_texture(texture);
                    return Err(RendererError::Create {
                        what: "framebuffer",
                        reason,
                    });
                }
            };

            let previous = current_framebuffer(gl);
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, previous);

            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(framebuffer);
                gl.delete_texture(texture);
                return Err(RendererError::IncompleteFramebuffer(status));
            }

            Ok(Self {
                texture,
                framebuffer,
                width,
                height,
            })
        }
    }

    fn destroy(self, gl: &glow::Context) {
        unsafe {
            gl.delete_framebuffer(self.framebuffer);
            gl.delete_texture(self.texture);
        }
    }
}

/// Clear the offscreen target and draw the fractal into it. Leaves the GL
/// viewport at the target size; the caller restores its own.
fn render_fractal(
    gl: &glow::Context,
    res: &GlResources,
    target: &RenderTarget,
    uniforms: Option<&FractalUniforms>,
    clear_color: [f32; 4],
) {
    let previous = current_framebuffer(gl);
    unsafe {
        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(target.framebuffer));
        gl.viewport(0, 0, target.width, target.height);

        let [r, g, b, a] = clear_color;
        gl.clear_color(r, g, b, a);
        gl.clear(glow::COLOR_BUFFER_BIT);

        // Nothing uploaded yet: leave the target cleared.
        if let Some(u) = uniforms {
            let p = &res.fractal;
            gl.use_program(Some(p.program));
            gl.uniform_1_f32(p.loc_window_width.as_ref(), u.window_width);
            gl.uniform_1_f32(p.loc_window_height.as_ref(), u.window_height);
            gl.uniform_1_f32(p.loc_real_axis_offset.as_ref(), u.real_axis_offset);
            gl.uniform_1_f32(p.loc_imaginary_axis_offset.as_ref(), u.imaginary_axis_offset);
            gl.uniform_1_f32(p.loc_zoom.as_ref(), u.zoom);

            gl.bind_vertex_array(Some(res.vao));
            gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
            gl.bind_vertex_array(None);
            gl.use_program(None);
        }

        gl.bind_framebuffer(glow::FRAMEBUFFER, previous);
    }
}

// ─── Public API ─────────────────────────────────────────────────────────

/// Build the [`egui::PaintCallback`] that shows the fractal inside `rect`.
pub fn make_fractal_callback(
    state: Arc<Mutex<GlFractalState>>,
    rect: egui::Rect,
) -> egui::PaintCallback {
    let cb = egui_glow::CallbackFn::new(move |info, painter| {
        let mut st = state.lock().unwrap_or_else(PoisonError::into_inner);
        st.paint(painter.gl(), &info);
    });

    egui::PaintCallback {
        rect,
        callback: Arc::new(cb),
    }
}
