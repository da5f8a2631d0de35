//! Macro for implementing Display and FromStr for wire-level status enums
//!
//! Backends rarely agree on vocabulary (`COMPLETE` vs `finished`, `POLLING` vs
//! `processing`), so each variant takes a canonical spelling used by
//! `Display` plus any number of accepted aliases. Parsing is
//! case-insensitive.
//!
//! # Example
//!
//! ```rust
//! use tether_domain::impl_wire_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum BuildState {
//!     Staging,
//!     Staged,
//! }
//!
//! impl_wire_status_conversions!(BuildState {
//!     Staging => "staging",
//!     Staged => "staged" | "complete",
//! });
//!
//! assert_eq!("COMPLETE".parse::<BuildState>().unwrap(), BuildState::Staged);
//! assert_eq!(BuildState::Staged.to_string(), "staged");
//! ```

/// Implements Display and FromStr traits for status enums
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str | $alias...` - Canonical lowercase spelling followed by
///   optional lowercase aliases
#[macro_export]
macro_rules! impl_wire_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, String> {
                match s.trim().to_lowercase().as_str() {
                    $($str $(| $alias)* => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestState {
        Waiting,
        Running,
        Done,
    }

    impl_wire_status_conversions!(TestState {
        Waiting => "waiting",
        Running => "running" | "polling" | "in_progress",
        Done => "done",
    });

    #[test]
    fn test_display_uses_canonical_spelling() {
        assert_eq!(TestState::Waiting.to_string(), "waiting");
        assert_eq!(TestState::Running.to_string(), "running");
        assert_eq!(TestState::Done.to_string(), "done");
    }

    #[test]
    fn test_fromstr_accepts_aliases_in_any_case() {
        assert_eq!(TestState::from_str("POLLING").unwrap(), TestState::Running);
        assert_eq!(TestState::from_str("In_Progress").unwrap(), TestState::Running);
        assert_eq!(TestState::from_str(" done ").unwrap(), TestState::Done);
    }

    #[test]
    fn test_fromstr_invalid() {
        let result = TestState::from_str("exploded");
        assert!(result.unwrap_err().contains("Invalid TestState: exploded"));
        assert!(TestState::from_str("").is_err());
    }
}
