use thiserror::Error;

/// Fatal errors `expand` can return.
///
/// Everything else the evaluator encounters (a bad `${...}` expression, a
/// malformed `$data` literal, an unresolved path) is swallowed internally and
/// surfaces only as pass-through text in the output — see the module docs on
/// [`crate::visitor`] for the swallow points.
#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("malformed data: {0}")]
    MalformedData(#[from] serde_json::Error),
}
