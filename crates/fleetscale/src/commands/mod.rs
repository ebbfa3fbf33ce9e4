pub mod apply;
pub mod output;
pub mod plan;
pub mod synth;
pub mod validate;
