//! Backend: MIPS emission

pub mod codegen;
pub mod emitter;

pub use codegen::CodeGenerator;
