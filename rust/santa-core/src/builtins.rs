//! The built-in function table, shared by the resolver (name lookup) and the
//! runtime (dispatch and arity checks).

use serde::Serialize;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Every built-in function the runtime ships. The string form is the
/// identifier scripts use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum BuiltinId {
    Abs,
    Assoc,
    Chars,
    Contains,
    Cons,
    Cycle,
    Each,
    Filter,
    FilterMap,
    Find,
    First,
    FlatMap,
    Fold,
    FoldS,
    Get,
    Int,
    Ints,
    Iterate,
    Join,
    Keys,
    Last,
    Lines,
    Map,
    Max,
    Memoize,
    Min,
    Push,
    Puts,
    Read,
    Reduce,
    RegexMatch,
    RegexMatchAll,
    Repeat,
    Rest,
    Reverse,
    Second,
    Size,
    Skip,
    Sort,
    SortBy,
    Split,
    Sum,
    Take,
    Type,
    Update,
    Values,
    Zip,
}

impl BuiltinId {
    /// Declared parameter count; `-1` marks a variadic built-in.
    pub fn arity(self) -> i32 {
        use BuiltinId::*;
        match self {
            Puts => -1,
            Abs | Chars | Cycle | First | Int | Ints | Keys | Last | Lines | Max | Memoize
            | Min | Read | Repeat | Rest | Reverse | Second | Size | Sort | Sum | Type
            | Values => 1,
            Contains | Cons | Each | Filter | FilterMap | Find | FlatMap | Get | Iterate
            | Join | Map | Push | Reduce | RegexMatch | RegexMatchAll | Skip | SortBy | Split
            | Take | Zip => 2,
            Assoc | Fold | FoldS | Update => 3,
        }
    }

    /// Resolver-side lookup: is `name` a built-in?
    pub fn lookup(name: &str) -> Option<BuiltinId> {
        name.parse().ok()
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}
