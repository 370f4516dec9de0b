//! Geometrical primitives.

mod abs;
mod color;
mod em;
mod point;
mod scalar;
mod sides;
mod size;

pub use self::abs::*;
pub use self::color::*;
pub use self::em::*;
pub use self::point::*;
pub use self::scalar::*;
pub use self::sides::*;
pub use self::size::*;

use std::cmp::Ordering;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::iter::Sum;
use std::ops::*;

use serde::{Deserialize, Serialize};

/// Derive `Sub` from `Neg` and `Add`.
macro_rules! sub_impl {
    ($a:ident - $b:ident -> $c:ident) => {
        impl Sub<$b> for $a {
            type Output = $c;

            #[inline]
            fn sub(self, other: $b) -> $c {
                self + -other
            }
        }
    };
}

/// Derive an assigning operator from its plain counterpart.
macro_rules! assign_impl {
    ($a:ident += $b:ident) => {
        impl AddAssign<$b> for $a {
            #[inline]
            fn add_assign(&mut self, other: $b) {
                *self = *self + other;
            }
        }
    };

    ($a:ident -= $b:ident) => {
        impl SubAssign<$b> for $a {
            #[inline]
            fn sub_assign(&mut self, other: $b) {
                *self = *self - other;
            }
        }
    };

    ($a:ident *= $b:ident) => {
        impl MulAssign<$b> for $a {
            #[inline]
            fn mul_assign(&mut self, other: $b) {
                *self = *self * other;
            }
        }
    };

    ($a:ident /= $b:ident) => {
        impl DivAssign<$b> for $a {
            #[inline]
            fn div_assign(&mut self, other: $b) {
                *self = *self / other;
            }
        }
    };
}

pub(crate) use {assign_impl, sub_impl};
