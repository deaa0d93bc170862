// Rendering: LaTeX source to PDF through an external typesetting engine.
// The engine runs as a child process; its output is streamed, never buffered whole.

pub mod compiler;
pub mod engine;
pub mod handlers;

pub use compiler::TypesetCompiler;
pub use engine::PdfLatexEngine;
