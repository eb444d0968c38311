use std::fmt;

use crate::constants::QOS_LEVEL_COUNT;

/// Delivery guarantee of a subscription or publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) enum QoS {
    /// Fire and forget.
    #[default]
    AtMostOnce = 0,

    /// Retried until acknowledged or the retry ceiling is reached.
    AtLeastOnce = 1,
}

impl QoS {
    pub fn from_bit(bit: bool) -> Self {
        if bit {
            Self::AtLeastOnce
        } else {
            Self::AtMostOnce
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn is_reliable(self) -> bool {
        matches!(self, Self::AtLeastOnce)
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QoS {}", self.to_u8())
    }
}

const _: () = assert!(QOS_LEVEL_COUNT == 2);
