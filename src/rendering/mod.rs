pub mod gl_fractal;
pub mod scheduler;
pub mod viewport;
