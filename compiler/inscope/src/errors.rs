//! Engine errors.

use inscope_ir::Name;
use inscope_vm::VmError;

/// Why a function could not be wrapped or a wrapped call failed.
///
/// Construction-time variants (`UnsupportedBody`, `CaptureLayout`,
/// `NotAFunction`) are never produced by a call; call-time variants never by
/// construction.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// Free variables with no binding at call time.
    #[error(
        "Undefined variables: {}.\nUse `bind` method to assign values for these names before calling.",
        quoted(names)
    )]
    UnresolvedName { names: Vec<Name> },

    #[error("cannot capture the scope of {function}: {kind} bodies are not supported")]
    UnsupportedBody { function: String, kind: &'static str },

    /// Transform method only: some returns cannot jump to the capture tail.
    #[error(
        "cannot rewrite {function}: {unreachable} of {total} return points are beyond the \
         capture tail's reach (farthest is {farthest} instructions away, reach is {reach}).\n\
         Use the trace method, or keep the returns of this function closer together."
    )]
    CaptureLayout {
        function: String,
        unreachable: usize,
        total: usize,
        farthest: usize,
        reach: usize,
    },

    /// A local assignment hides an outer name the body reads first.
    #[error(
        "{source}.\n\n\
         This probably means you assigned to a local variable with the same name as a variable \
         in an outer scope that you meant to use. Reads of a name resolve locally everywhere in \
         a body that assigns to it. Workarounds include:\n    \
         - Pass {name} in as an argument to the function.\n    \
         - Don't assign to {name}; use a different name for the local variable."
    )]
    ShadowedOuterName { name: Name, source: VmError },

    /// The body finished without producing a capture payload.
    #[error("{function} did not produce a scope; the capture was malformed")]
    MalformedCapture { function: String },

    #[error("expected a function to wrap, found '{found}'")]
    NotAFunction { found: &'static str },

    /// An error raised by the body itself.
    #[error(transparent)]
    Body(#[from] VmError),
}

impl ScopeError {
    /// Translate a guest error raised while running a wrapped body.
    pub(crate) fn from_body(err: VmError) -> Self {
        match err.unbound_name {
            Some(name) => ScopeError::ShadowedOuterName { name, source: err },
            None => ScopeError::Body(err),
        }
    }
}

fn quoted(names: &[Name]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
