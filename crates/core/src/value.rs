//! Value traits for stored entries
//!
//! `EnumValue` is the contract a type must meet to be deduplicated by the
//! store: a strict total order (the primary order) and a coarser folded order
//! used for case-insensitive grouping. Both must be pure functions of the
//! values, never of where they are stored, so that order survives relocation.
//!
//! The primary order must refine the folded order: if `a` is folded-less than
//! `b` then `a` is primary-less than `b`. This keeps every folded class
//! contiguous in dictionary order.

use std::cmp::Ordering;
use std::fmt;

/// A value that can be stored in the enum store
pub trait EnumValue: Clone + Send + Sync + fmt::Debug + 'static {
    /// Strict total order used for dictionary placement and deduplication
    fn cmp_primary(&self, other: &Self) -> Ordering;

    /// Coarser order whose equality classes are folded-equal values
    fn cmp_folded(&self, other: &Self) -> Ordering {
        self.cmp_primary(other)
    }

    /// Heap bytes owned by the value, on top of `size_of::<Self>()`
    fn heap_bytes(&self) -> usize {
        0
    }

    /// Why the value cannot be stored, `None` if it can
    ///
    /// Anything stored must be representable in the saved layout.
    fn unstorable_reason(&self) -> Option<&'static str> {
        None
    }
}

macro_rules! impl_enum_value_for_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl EnumValue for $t {
                #[inline]
                fn cmp_primary(&self, other: &Self) -> Ordering {
                    self.cmp(other)
                }
            }
        )*
    };
}

impl_enum_value_for_int!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! impl_enum_value_for_float {
    ($($t:ty),* $(,)?) => {
        $(
            impl EnumValue for $t {
                /// NaN sorts before every number and equals itself.
                #[inline]
                fn cmp_primary(&self, other: &Self) -> Ordering {
                    match (self.is_nan(), other.is_nan()) {
                        (true, true) => Ordering::Equal,
                        (true, false) => Ordering::Less,
                        (false, true) => Ordering::Greater,
                        (false, false) => self.partial_cmp(other).unwrap_or(Ordering::Equal),
                    }
                }
            }
        )*
    };
}

impl_enum_value_for_float!(f32, f64);

impl EnumValue for String {
    /// Case-folded order first, raw bytes as tie-break.
    fn cmp_primary(&self, other: &Self) -> Ordering {
        fold_cmp(self, other).then_with(|| self.as_str().cmp(other.as_str()))
    }

    fn cmp_folded(&self, other: &Self) -> Ordering {
        fold_cmp(self, other)
    }

    fn heap_bytes(&self) -> usize {
        // NUL terminator included, matching the saved layout
        self.len() + 1
    }

    fn unstorable_reason(&self) -> Option<&'static str> {
        self.contains('\0').then_some("string value contains NUL byte")
    }
}

fn fold_cmp(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}
