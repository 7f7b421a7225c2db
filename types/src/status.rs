//! Status machines for transactions, outputs and signing scripts.
//!
//! Each status carries an explicit numeric flag. The flag doubles as a bit
//! in query filters and as the ordering rank for upgrade-only transitions;
//! callers compare through [`TxStatus::rank`] rather than relying on the
//! declaration order of the variants.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a signing script within an account bin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptStatus {
    /// Freshly derived, sitting in the bin's unused pool.
    Unused,
    /// Selected as a change destination by an outgoing transaction.
    Change,
    /// Handed out to a counterparty for receiving.
    Issued,
    /// Has appeared in a transaction output. Permanent.
    Used,
}

impl ScriptStatus {
    pub const ALL_FLAGS: u32 = 0b1111;

    pub fn flag(self) -> u32 {
        match self {
            Self::Unused => 1,
            Self::Change => 2,
            Self::Issued => 4,
            Self::Used => 8,
        }
    }

    /// Decode a bitset of flags into the matching statuses.
    pub fn from_flags(flags: u32) -> Vec<Self> {
        [Self::Unused, Self::Change, Self::Issued, Self::Used]
            .into_iter()
            .filter(|s| flags & s.flag() != 0)
            .collect()
    }

    /// Whether `next` is a legal monotonic transition from `self`.
    ///
    /// Unused may become Change, Issued or Used; Change and Issued may only
    /// become Used; Used is terminal.
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (a, b) if a == b => true,
            (Self::Unused, Self::Change | Self::Issued | Self::Used) => true,
            (Self::Change | Self::Issued, Self::Used) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ScriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unused => "unused",
            Self::Change => "change",
            Self::Issued => "issued",
            Self::Used => "used",
        };
        f.write_str(s)
    }
}

/// Lifecycle of a transaction known to the vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    /// Missing at least one required signature.
    Unsigned,
    /// Fully signed, not yet handed to the network.
    Unsent,
    /// Handed to the network.
    Sent,
    /// Seen propagating on the network.
    Propagated,
    /// Linked to a stored block header. Only the blockchain engine sets this.
    Confirmed,
    /// Double-spends an outpoint already spent by another stored transaction.
    Conflicting,
}

impl TxStatus {
    pub const ALL_FLAGS: u32 = 0b11_1111;

    pub fn flag(self) -> u32 {
        match self {
            Self::Unsigned => 1,
            Self::Unsent => 2,
            Self::Sent => 4,
            Self::Propagated => 8,
            Self::Confirmed => 16,
            Self::Conflicting => 32,
        }
    }

    /// Ordering rank for upgrade-only status updates.
    pub fn rank(self) -> u32 {
        self.flag()
    }

    /// Decode a bitset of flags into the matching statuses.
    pub fn from_flags(flags: u32) -> Vec<Self> {
        [
            Self::Unsigned,
            Self::Unsent,
            Self::Sent,
            Self::Propagated,
            Self::Confirmed,
            Self::Conflicting,
        ]
        .into_iter()
        .filter(|s| flags & s.flag() != 0)
        .collect()
    }

    /// Whether every required signature is present.
    pub fn is_signed(self) -> bool {
        self != Self::Unsigned
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unsigned => "unsigned",
            Self::Unsent => "unsent",
            Self::Sent => "sent",
            Self::Propagated => "propagated",
            Self::Confirmed => "confirmed",
            Self::Conflicting => "conflicting",
        };
        f.write_str(s)
    }
}

/// Spend state of a transaction output.
///
/// Mirrors the `spent_by` back-reference: an output is Spent exactly while
/// some stored input points at it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputStatus {
    Unspent,
    Spent,
}

impl OutputStatus {
    pub const ALL_FLAGS: u32 = 0b11;

    pub fn flag(self) -> u32 {
        match self {
            Self::Unspent => 1,
            Self::Spent => 2,
        }
    }

    pub fn from_flags(flags: u32) -> Vec<Self> {
        [Self::Unspent, Self::Spent]
            .into_iter()
            .filter(|s| flags & s.flag() != 0)
            .collect()
    }
}

impl fmt::Display for OutputStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unspent => "unspent",
            Self::Spent => "spent",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_status_transitions_are_monotonic() {
        use ScriptStatus::*;
        assert!(Unused.can_transition_to(Issued));
        assert!(Unused.can_transition_to(Change));
        assert!(Unused.can_transition_to(Used));
        assert!(Issued.can_transition_to(Used));
        assert!(Change.can_transition_to(Used));

        assert!(!Used.can_transition_to(Unused));
        assert!(!Used.can_transition_to(Issued));
        assert!(!Issued.can_transition_to(Unused));
        assert!(!Issued.can_transition_to(Change));
        assert!(!Change.can_transition_to(Issued));
    }

    #[test]
    fn tx_status_rank_orders_upgrades() {
        use TxStatus::*;
        assert!(Unsent.rank() > Unsigned.rank());
        assert!(Sent.rank() > Unsent.rank());
        assert!(Propagated.rank() > Sent.rank());
        assert!(Confirmed.rank() > Propagated.rank());
        assert!(Conflicting.rank() > Confirmed.rank());
    }

    #[test]
    fn tx_status_flag_decoding() {
        let statuses = TxStatus::from_flags(TxStatus::Sent.flag() | TxStatus::Confirmed.flag());
        assert_eq!(statuses, vec![TxStatus::Sent, TxStatus::Confirmed]);
        assert_eq!(TxStatus::from_flags(TxStatus::ALL_FLAGS).len(), 6);
        assert!(TxStatus::from_flags(0).is_empty());
    }
}
