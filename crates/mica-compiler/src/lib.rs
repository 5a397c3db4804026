pub mod compiler;
mod scope;

pub use compiler::Compiler;
pub use scope::VariableInfo;
