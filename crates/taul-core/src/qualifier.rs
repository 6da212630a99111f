/// Modifies how a rule participates in lexing/parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Qualifier {
    /// No special behavior.
    None,
    /// Tokens of this LPR are produced by the lexer but suppressed from the
    /// parser's input stream when cut-skip is enabled.
    Skip,
    /// This rule is a subroutine only, invisible at the top level; reachable
    /// solely via `name`.
    Support,
    /// This PPR's alternatives are left-recursively ordered.
    Precedence,
}

impl Qualifier {
    pub fn to_byte(self) -> u8 {
        match self {
            Qualifier::None => 0,
            Qualifier::Skip => 1,
            Qualifier::Support => 2,
            Qualifier::Precedence => 3,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Qualifier::None),
            1 => Some(Qualifier::Skip),
            2 => Some(Qualifier::Support),
            3 => Some(Qualifier::Precedence),
            _ => None,
        }
    }
}

impl std::fmt::Display for Qualifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Qualifier::None => "none",
            Qualifier::Skip => "skip",
            Qualifier::Support => "support",
            Qualifier::Precedence => "precedence",
        };
        write!(f, "{s}")
    }
}
