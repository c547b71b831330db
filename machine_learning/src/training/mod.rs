mod builder;
mod compiled;

pub use builder::{ModelBuilder, generate_rng};
pub use compiled::{Compiled, CompiledModel};
