pub mod builtins;
pub mod compile;
pub mod frontend;
pub mod printer;
pub mod rename;
pub mod strings;
pub mod walk;

pub use compile::{check_structure, PythonUnitCompiler};
pub use frontend::{PythonFrontend, SourceUnit};
pub use printer::PythonPrinter;
pub use rename::{rename_identifiers, rename_suite, RenameOutput, RenamePolicy};
pub use strings::{wrap_string_literals, wrap_suite, WrapOutput};
